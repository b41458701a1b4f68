use crate::fields::FieldError;
use crate::time::TimeError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Data file '{0}' does not exist")]
    FileNotFound(PathBuf),

    #[error("Unsupported table format for '{0}' (expected .parquet, .csv or .txt)")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to read table '{0}'")]
    Read(PathBuf, #[source] PolarsError),

    #[error("I/O error writing table '{0}'")]
    WriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing table '{0}'")]
    Write(PathBuf, #[source] PolarsError),

    #[error("None of the columns {0:?} found in table")]
    MissingColumn(Vec<String>),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error(transparent)]
    Time(#[from] TimeError),

    #[error(transparent)]
    Field(#[from] FieldError),
}
