//! Retrieval of remote reanalysis archives as local files.
//!
//! The remote protocol itself is opaque: an [`ArchiveFetcher`] receives an
//! [`ArchiveQuery`] and returns the path of a local table. Fetchers compose,
//! e.g. `CachedFetcher::new(RetryingFetcher::new(HttpArchiveFetcher::new(url)))`.

pub mod error;
pub mod http;
pub mod retry;

use crate::location::catalogue::Extent;
use crate::time::Month;
pub use error::FetchError;
pub use http::HttpArchiveFetcher;
use log::info;
pub use retry::{RetryPolicy, RetryingFetcher};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to retrieve and where to put it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveQuery {
    pub dataset: String,
    pub product_type: String,
    pub variables: Vec<String>,
    /// Catalogue basin group the request is made for.
    pub area_name: String,
    pub area: Extent,
    pub years: Vec<i32>,
    pub months: Vec<u32>,
    /// Local destination of the archive file.
    pub target: PathBuf,
}

impl ArchiveQuery {
    /// Conventional archive file name, `{dataset}_{product_type}_{area}_{MM-YYYY}.parquet`,
    /// stamped with the month the request is made in.
    pub fn file_name(dataset: &str, product_type: &str, area_name: &str, issued: Month) -> String {
        format!(
            "{}_{}_{}_{:02}-{:04}.parquet",
            dataset,
            product_type,
            area_name,
            issued.month(),
            issued.year()
        )
    }
}

/// Turns an [`ArchiveQuery`] into a local file.
pub trait ArchiveFetcher {
    fn fetch(&self, query: &ArchiveQuery) -> Result<PathBuf, FetchError>;
}

impl<F: ArchiveFetcher + ?Sized> ArchiveFetcher for Box<F> {
    fn fetch(&self, query: &ArchiveQuery) -> Result<PathBuf, FetchError> {
        (**self).fetch(query)
    }
}

/// Skips the inner fetcher when the query target already exists locally.
#[derive(Debug, Clone)]
pub struct CachedFetcher<F> {
    inner: F,
}

impl<F: ArchiveFetcher> CachedFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F: ArchiveFetcher> ArchiveFetcher for CachedFetcher<F> {
    fn fetch(&self, query: &ArchiveQuery) -> Result<PathBuf, FetchError> {
        if query.target.exists() {
            info!(
                "Archive for {} ({}) already present at {:?}",
                query.dataset, query.area_name, query.target
            );
            return Ok(query.target.clone());
        }
        self.inner.fetch(query)
    }
}

/// Fetcher used when no remote archive is configured; every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl ArchiveFetcher for OfflineFetcher {
    fn fetch(&self, query: &ArchiveQuery) -> Result<PathBuf, FetchError> {
        Err(FetchError::NotConfigured(query.dataset.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    pub(crate) struct CountingFetcher {
        pub calls: Cell<u32>,
    }

    impl ArchiveFetcher for CountingFetcher {
        fn fetch(&self, query: &ArchiveQuery) -> Result<PathBuf, FetchError> {
            self.calls.set(self.calls.get() + 1);
            Ok(query.target.clone())
        }
    }

    fn query(target: PathBuf) -> ArchiveQuery {
        ArchiveQuery {
            dataset: "reanalysis-era5-single-levels-monthly-means".to_string(),
            product_type: "monthly_averaged_reanalysis".to_string(),
            variables: vec!["total_precipitation".to_string()],
            area_name: "indus".to_string(),
            area: Extent::new(40.0, 65.0, 25.0, 85.0).unwrap(),
            years: vec![2000],
            months: (1..=12).collect(),
            target,
        }
    }

    #[test]
    fn test_cached_fetcher_skips_existing_target() -> Result<(), FetchError> {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("archive.parquet");
        let fetcher = CachedFetcher::new(CountingFetcher {
            calls: Cell::new(0),
        });

        fetcher.fetch(&query(target.clone()))?;
        assert_eq!(fetcher.inner.calls.get(), 1);

        std::fs::write(&target, b"cached").unwrap();
        let path = fetcher.fetch(&query(target.clone()))?;
        assert_eq!(path, target);
        assert_eq!(fetcher.inner.calls.get(), 1, "Existing target must not be fetched again");
        Ok(())
    }

    #[test]
    fn test_offline_fetcher() {
        let result = OfflineFetcher.fetch(&query(PathBuf::from("nowhere.parquet")));
        assert!(matches!(result, Err(FetchError::NotConfigured(_))));
    }

    #[test]
    fn test_file_name() {
        let name = ArchiveQuery::file_name(
            "reanalysis-era5-single-levels-monthly-means",
            "monthly_averaged_reanalysis",
            "indus",
            Month::new(3, 2024),
        );
        assert_eq!(
            name,
            "reanalysis-era5-single-levels-monthly-means_monthly_averaged_reanalysis_indus_03-2024.parquet"
        );
    }
}
