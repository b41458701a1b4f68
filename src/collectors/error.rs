use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Data file for {dataset} not found at '{path}'")]
    MissingDataFile { dataset: &'static str, path: PathBuf },

    #[error("Station '{station}' not found in {dataset} metadata")]
    UnknownStation {
        dataset: &'static str,
        station: String,
    },

    #[error("No {dataset} data in the requested range for {location}")]
    NoData {
        dataset: &'static str,
        location: String,
    },

    #[error("Failed to list directory '{0}'")]
    ListDirectory(PathBuf, #[source] std::io::Error),
}
