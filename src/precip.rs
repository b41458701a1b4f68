//! The main entry point: a data directory, a location resolver and an
//! archive fetcher, shared by one client per dataset.

use crate::collectors::aphrodite::AphroditeClient;
use crate::collectors::cordex::CordexClient;
use crate::collectors::cru::CruClient;
use crate::collectors::era5::Era5Client;
use crate::collectors::gauges::GaugeClient;
use crate::collectors::value::ValueClient;
use crate::collectors::wrf::WrfClient;
use crate::error::PrecipError;
use crate::fetch::{
    ArchiveFetcher, CachedFetcher, HttpArchiveFetcher, OfflineFetcher, RetryPolicy,
    RetryingFetcher,
};
use crate::location::{BasinCatalogue, FileMaskStore, LocationResolver, MaskStore};
use crate::utils::{ensure_data_dir_exists, get_data_dir, ARCHIVE_URL_ENV};
use bon::bon;
use log::info;
use std::path::{Path, PathBuf};

/// Loads precipitation datasets onto a common monthly representation.
///
/// All dataset files are looked up relative to the data directory. Create an
/// instance with [`PrecipLoader::new()`] (data directory from the
/// environment), [`PrecipLoader::with_data_dir()`], or
/// [`PrecipLoader::custom()`] to replace individual components.
///
/// # Examples
///
/// ```no_run
/// # use precip_loader::{LocationSpec, PrecipError, PrecipLoader};
/// # fn main() -> Result<(), PrecipError> {
/// let loader = PrecipLoader::new()?;
/// let cru = loader
///     .cru()
///     .location(&LocationSpec::from("indus"))
///     .min_year(1990.0)
///     .max_year(2000.0)
///     .call()?;
/// println!("{:?}", cru.shape());
/// # Ok(())
/// # }
/// ```
pub struct PrecipLoader {
    data_dir: PathBuf,
    resolver: LocationResolver,
    fetcher: Box<dyn ArchiveFetcher + Send + Sync>,
}

#[bon]
impl PrecipLoader {
    /// Creates a loader over `data_dir` with the built-in basin catalogue,
    /// masks read from the data directory and the default fetcher.
    ///
    /// The default fetcher downloads from the mirror named by
    /// `$PRECIP_ARCHIVE_URL` (cached, with retries); without it every
    /// archive request fails with [`crate::FetchError::NotConfigured`].
    ///
    /// # Errors
    ///
    /// Returns [`PrecipError::DataDirCreation`] if the directory cannot be created.
    pub fn with_data_dir(data_dir: PathBuf) -> Result<Self, PrecipError> {
        Self::custom().data_dir(data_dir).call()
    }

    /// Creates a loader using `$PRECIP_DATA_DIR`, or the platform data
    /// directory joined with `precip_loader`.
    ///
    /// # Errors
    ///
    /// Returns [`PrecipError::DataDirResolution`] if no data directory can be determined.
    pub fn new() -> Result<Self, PrecipError> {
        Self::custom().call()
    }

    /// Creates a loader with any component replaced.
    ///
    /// # Example
    ///
    /// ```
    /// # use precip_loader::{BasinCatalogue, InMemoryMaskStore, OfflineFetcher, PrecipError, PrecipLoader};
    /// # fn main() -> Result<(), PrecipError> {
    /// let dir = tempfile::tempdir().unwrap();
    /// let loader = PrecipLoader::custom()
    ///     .data_dir(dir.path().to_path_buf())
    ///     .catalogue(BasinCatalogue::builtin())
    ///     .mask_store(Box::new(InMemoryMaskStore::new()))
    ///     .fetcher(Box::new(OfflineFetcher))
    ///     .call()?;
    /// assert_eq!(loader.data_dir(), dir.path());
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub fn custom(
        data_dir: Option<PathBuf>,
        catalogue: Option<BasinCatalogue>,
        mask_store: Option<Box<dyn MaskStore + Send + Sync>>,
        fetcher: Option<Box<dyn ArchiveFetcher + Send + Sync>>,
        retry_policy: Option<RetryPolicy>,
    ) -> Result<Self, PrecipError> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => get_data_dir().map_err(PrecipError::DataDirResolution)?,
        };
        ensure_data_dir_exists(&data_dir)
            .map_err(|e| PrecipError::DataDirCreation(data_dir.clone(), e))?;

        let mask_store =
            mask_store.unwrap_or_else(|| Box::new(FileMaskStore::new(&data_dir)));
        let catalogue = catalogue.unwrap_or_else(BasinCatalogue::builtin);
        let resolver = LocationResolver::with_boxed_store(catalogue, mask_store);
        let fetcher =
            fetcher.unwrap_or_else(|| default_fetcher(retry_policy.unwrap_or_default()));

        Ok(Self {
            data_dir,
            resolver,
            fetcher,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    pub fn fetcher(&self) -> &(dyn ArchiveFetcher + Send + Sync) {
        self.fetcher.as_ref()
    }

    /// APHRODITE gauge-interpolated precipitation.
    pub fn aphrodite(&self) -> AphroditeClient<'_> {
        AphroditeClient::new(self)
    }

    /// CRU TS, interpolated onto the 0.25 degree grid.
    pub fn cru(&self) -> CruClient<'_> {
        CruClient::new(self)
    }

    /// CORDEX East Asia MOHC-HadRM3P evaluation run.
    pub fn cordex(&self) -> CordexClient<'_> {
        CordexClient::new(self)
    }

    /// ERA5 monthly means, fetched and cached per basin group.
    pub fn era5(&self) -> Era5Client<'_> {
        Era5Client::new(self)
    }

    /// Raw and bias-corrected WRF runs.
    pub fn wrf(&self) -> WrfClient<'_> {
        WrfClient::new(self)
    }

    /// Beas and Sutlej rain gauges.
    pub fn gauges(&self) -> GaugeClient<'_> {
        GaugeClient::new(self)
    }

    /// VALUE ECA&D European stations.
    pub fn value(&self) -> ValueClient<'_> {
        ValueClient::new(self)
    }
}

fn default_fetcher(policy: RetryPolicy) -> Box<dyn ArchiveFetcher + Send + Sync> {
    match std::env::var(ARCHIVE_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => {
            info!("Fetching archives from {}", url);
            Box::new(CachedFetcher::new(RetryingFetcher::with_policy(
                HttpArchiveFetcher::new(url),
                policy,
            )))
        }
        _ => Box::new(OfflineFetcher),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{InMemoryMaskStore, LocationSpec};

    #[test]
    fn test_with_data_dir_creates_directory() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("precip");
        let loader = PrecipLoader::with_data_dir(data_dir.clone())?;
        assert!(data_dir.is_dir());
        assert_eq!(loader.data_dir(), data_dir.as_path());
        assert!(loader.resolver().catalogue().get("indus").is_some());
        Ok(())
    }

    #[test]
    fn test_custom_catalogue() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        let catalogue = BasinCatalogue::from_json_str(
            r#"{ "nile": { "basin_group": "nile", "extent": [32, 24, -4, 40] } }"#,
        )?;
        let loader = PrecipLoader::custom()
            .data_dir(dir.path().to_path_buf())
            .catalogue(catalogue)
            .mask_store(Box::new(InMemoryMaskStore::new()))
            .call()?;
        let extent = loader
            .resolver()
            .resolve_extent(&LocationSpec::from("nile"))?;
        assert_eq!(extent.as_array(), [32.0, 24.0, -4.0, 40.0]);
        assert!(loader
            .resolver()
            .resolve_extent(&LocationSpec::from("indus"))
            .is_err());
        Ok(())
    }

    #[test]
    fn test_data_dir_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            PrecipLoader::with_data_dir(file),
            Err(PrecipError::DataDirCreation(..))
        ));
    }
}
