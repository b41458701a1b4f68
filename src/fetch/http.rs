use crate::fetch::error::FetchError;
use crate::fetch::{ArchiveFetcher, ArchiveQuery};
use log::{info, warn};
use reqwest::blocking::Client;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Downloads prepared archive files from a mirror: `GET {base_url}/{target file name}`.
///
/// The body is streamed into a temporary file next to the target and moved
/// into place once complete.
#[derive(Debug, Clone)]
pub struct HttpArchiveFetcher {
    base_url: String,
    client: Client,
}

impl HttpArchiveFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, query: &ArchiveQuery) -> String {
        let file_name = query
            .target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| query.dataset.clone());
        format!("{}/{}", self.base_url, file_name)
    }
}

impl ArchiveFetcher for HttpArchiveFetcher {
    fn fetch(&self, query: &ArchiveQuery) -> Result<PathBuf, FetchError> {
        let url = self.url_for(query);
        info!("Downloading {} archive for {} from {}", query.dataset, query.area_name, url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?;

        let mut response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    FetchError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    FetchError::NetworkRequest(url, e)
                });
            }
        };

        let target = query.target.clone();
        let parent = target
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent).map_err(|e| FetchError::Io(parent.clone(), e))?;

        let mut temp_file =
            NamedTempFile::new_in(&parent).map_err(|e| FetchError::Io(parent.clone(), e))?;
        let bytes = response
            .copy_to(&mut temp_file)
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?;
        temp_file
            .flush()
            .map_err(|e| FetchError::Io(target.clone(), e))?;
        temp_file
            .persist(&target)
            .map_err(|e| FetchError::Persist(target.clone(), e.error))?;

        info!("Stored {} bytes from {} at {:?}", bytes, url, target);
        Ok(target)
    }
}
