use crate::time::Month;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    #[error("Expected {expected} values for the field shape, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("Time steps must be strictly increasing: {previous} is followed by {next}")]
    UnsortedTime { previous: Month, next: Month },

    #[error("Coordinate axis '{0}' must be strictly increasing")]
    UnsortedAxis(&'static str),

    #[error("Coordinate axis '{0}' is empty")]
    EmptyAxis(&'static str),

    #[error("Operation '{0}' needs a gridded field but got a point series")]
    PointFootprint(&'static str),

    #[error("Coordinate ({lat}, {lon}) lies outside the grid coverage")]
    OutsideCoverage { lat: f64, lon: f64 },

    #[error("Cannot combine fields with different spatial footprints")]
    FootprintMismatch,

    #[error("Cannot combine fields with different variables ('{0}' and '{1}')")]
    VariableMismatch(String, String),

    #[error("Fields overlap in time at {0}")]
    OverlappingTime(Month),

    #[error("Nothing to merge")]
    NothingToMerge,
}
