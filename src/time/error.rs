use crate::time::month::Month;
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimeError {
    #[error("Timestamp {timestamp} at index {index} is not aligned to a month start")]
    Alignment {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("Raw sample count ({found}) does not match the synthesized month count ({expected})")]
    Cardinality { expected: usize, found: usize },

    #[error("Cannot build a time axis from an empty set of timestamps")]
    EmptyInput,

    #[error("Month range is inverted: {first} comes after {last}")]
    InvertedRange { first: Month, last: Month },

    #[error("Months are not evenly spaced: {previous} is followed by {next}")]
    UnevenSpacing { previous: Month, next: Month },

    #[error("Could not parse timestamp '{0}'")]
    UnparseableTimestamp(String),

    #[error("Unsupported CF time units '{0}'")]
    InvalidEpochUnits(String),

    #[error("Epoch offset {value} cannot be represented as a date")]
    EpochOutOfRange { value: f64 },
}
