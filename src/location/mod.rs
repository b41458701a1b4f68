//! Basin/location resolution and masking.

pub mod catalogue;
pub mod error;
pub mod mask;
#[cfg(feature = "netcdf")]
pub mod netcdf_mask;
pub mod resolver;
pub mod spec;

pub use catalogue::{BasinCatalogue, BasinEntry, Extent};
pub use error::{LocationError, MaskLoadError};
pub use mask::{FileMaskStore, InMemoryMaskStore, MaskGrid, MaskRef, MaskStore};
pub use resolver::{apply_mask, crop, LocationResolver};
pub use spec::{LatLon, LocationSpec};
