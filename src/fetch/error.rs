use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error while writing archive file '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to move downloaded archive into place at '{0}'")]
    Persist(PathBuf, #[source] std::io::Error),

    #[error("No remote archive configured for dataset '{0}'")]
    NotConfigured(String),

    #[error("Giving up after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Errors that will not go away by asking again.
    pub fn is_permanent(&self) -> bool {
        match self {
            FetchError::NotConfigured(_) => true,
            FetchError::HttpStatus { status, .. } => status.is_client_error(),
            _ => false,
        }
    }
}
