pub mod error;
pub mod field;

pub use error::FieldError;
pub use field::{regular_axis, Footprint, PrecipField, Provenance, Unit};
