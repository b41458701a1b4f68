//! Temporal normalization onto a canonical monthly axis.

pub mod error;
pub mod month;
pub mod normalizer;
pub mod raw_time;

pub use error::TimeError;
pub use month::Month;
pub use normalizer::{
    is_month_aligned, resample_monthly, slice_range, to_canonical_months,
    validate_month_alignment, Aggregation, CanonicalTimeAxis, TimeIndexed,
    AVERAGE_DAYS_PER_MONTH,
};
pub use raw_time::{EpochReference, EpochUnit, RawTime};
