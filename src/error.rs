use crate::collectors::error::CollectError;
use crate::fetch::error::FetchError;
use crate::fields::error::FieldError;
use crate::location::error::LocationError;
use crate::tables::error::TableError;
use crate::time::error::TimeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrecipError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Time(#[from] TimeError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine data directory")]
    DataDirResolution(#[source] std::io::Error),
}
