//! ERA5 monthly-mean reanalysis, cached per basin group.
//!
//! Each basin group has at most one live cache table,
//! `ERA5/combi_data_{group}_{YYYY-MM}.parquet`, stamped with the month it was
//! built in. On a cache miss the monthly-means archive for the whole group
//! extent is fetched through the loader's [`crate::ArchiveFetcher`], converted
//! to mm/day and written as the new cache table.

use crate::collectors::error::CollectError;
use crate::collectors::{finish, read_window, StationSeries, StationSite};
use crate::fetch::ArchiveQuery;
use crate::fields::{PrecipField, Provenance, Unit};
use crate::location::LocationSpec;
use crate::tables::columns::TP;
use crate::tables::{field_from_frame, field_to_frame, read_table, read_table_in_extent, write_parquet, TableLayout};
use crate::time::Month;
use crate::{PrecipError, PrecipLoader};
use bon::bon;
use chrono::{NaiveDate, Utc};
use log::{info, warn};
use std::path::{Path, PathBuf};

pub const ERA5_LABEL: &str = "ERA5";
pub const ARCHIVE_DATASET: &str = "reanalysis-era5-single-levels-monthly-means";
pub const ARCHIVE_PRODUCT: &str = "monthly_averaged_reanalysis";
const ARCHIVE_VARIABLE: &str = "total_precipitation";
const FIRST_ARCHIVE_YEAR: i32 = 1970;
const ERA5_DIR: &str = "ERA5";
const CACHE_PREFIX: &str = "combi_data";
/// Archive precipitation is in metres per day.
const METRES_TO_MM: f64 = 1000.0;

/// Client for ERA5, obtained via [`PrecipLoader::era5()`].
pub struct Era5Client<'a> {
    client: &'a PrecipLoader,
}

#[bon]
impl<'a> Era5Client<'a> {
    pub(crate) fn new(client: &'a PrecipLoader) -> Self {
        Self { client }
    }

    /// Monthly ERA5 precipitation (mm/day) for `location` over `[min_year, max_year)`.
    ///
    /// Named locations use the cache of their basin group; coordinates use
    /// the smallest group whose extent contains them. Set `.refresh(true)` to
    /// rebuild the cache even when one exists.
    ///
    /// # Errors
    ///
    /// * [`crate::FetchError`] when the cache is missing and the archive cannot be fetched.
    /// * [`crate::LocationError::NoBasinContains`] for coordinates outside every group.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use precip_loader::{LatLon, LocationSpec, PrecipError, PrecipLoader};
    /// # fn main() -> Result<(), PrecipError> {
    /// let loader = PrecipLoader::new()?;
    /// let series = loader
    ///     .era5()
    ///     .location(&LocationSpec::Coordinate(LatLon(31.65, 77.34)))
    ///     .min_year(2000.0)
    ///     .max_year(2010.0)
    ///     .call()?;
    /// assert!(series.is_point());
    /// # Ok(())
    /// # }
    /// ```
    #[builder(start_fn = location)]
    #[doc(hidden)]
    pub fn build_location(
        &self,
        #[builder(start_fn)] location: &LocationSpec,
        min_year: f64,
        max_year: f64,
        refresh: Option<bool>,
    ) -> Result<PrecipField, PrecipError> {
        let group = self.basin_group(location)?;
        let table = self.cached_table(&group, refresh.unwrap_or(false))?;
        let window = read_window(self.client, location)?;
        let df = read_table_in_extent(&table, &window)?;
        let field = field_from_frame(&df, &TableLayout::new(TP, "tp"))?;
        finish(
            self.client,
            field,
            location,
            min_year,
            max_year,
            Provenance::new(ERA5_LABEL, Unit::MmPerDay),
        )
    }

    /// ERA5 series at each station's coordinate, nearest grid cell.
    ///
    /// The returned series keep the station metadata, elevation included, so
    /// they can be compared with gauge records directly.
    #[builder(start_fn = at_stations)]
    #[doc(hidden)]
    pub fn build_at_stations(
        &self,
        #[builder(start_fn)] stations: &[StationSite],
        min_year: f64,
        max_year: f64,
        refresh: Option<bool>,
    ) -> Result<Vec<StationSeries>, PrecipError> {
        let mut refresh = refresh.unwrap_or(false);
        let mut series = Vec::with_capacity(stations.len());
        for site in stations {
            let field = self.build_location(
                &LocationSpec::Coordinate(site.location),
                min_year,
                max_year,
                Some(refresh),
            )?;
            // One refresh per call is enough.
            refresh = false;
            series.push(StationSeries {
                site: site.clone(),
                field,
            });
        }
        Ok(series)
    }

    /// Latest cache table of `group`, if any.
    pub fn find_cached(&self, group: &str) -> Result<Option<PathBuf>, PrecipError> {
        let dir = self.cache_dir();
        if !dir.is_dir() {
            return Ok(None);
        }
        let entries =
            std::fs::read_dir(&dir).map_err(|e| CollectError::ListDirectory(dir.clone(), e))?;
        let prefix = format!("{}_{}_", CACHE_PREFIX, group);
        let mut latest: Option<(String, PathBuf)> = None;
        for entry in entries {
            let entry = entry.map_err(|e| CollectError::ListDirectory(dir.clone(), e))?;
            let path = entry.path();
            if !is_cache_table(&path, &prefix) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if latest.as_ref().map_or(true, |(best, _)| name > *best) {
                latest = Some((name, path));
            }
        }
        Ok(latest.map(|(_, path)| path))
    }

    fn cache_dir(&self) -> PathBuf {
        self.client.data_dir().join(ERA5_DIR)
    }

    fn basin_group(&self, location: &LocationSpec) -> Result<String, PrecipError> {
        let resolver = self.client.resolver();
        Ok(match location {
            LocationSpec::Named(_) => resolver.basin_group(location)?,
            LocationSpec::Coordinate(point) => {
                resolver.catalogue().group_containing(*point)?.to_string()
            }
        })
    }

    fn cached_table(&self, group: &str, refresh: bool) -> Result<PathBuf, PrecipError> {
        if !refresh {
            if let Some(path) = self.find_cached(group)? {
                info!("Using cached ERA5 table {:?}", path);
                return Ok(path);
            }
            warn!("No cached ERA5 table for basin group '{}', fetching archive", group);
        }

        let issued = Month::from_date(Utc::now().date_naive());
        let area = self.client.resolver().catalogue().lookup(group)?.extent;
        let query = ArchiveQuery {
            dataset: ARCHIVE_DATASET.to_string(),
            product_type: ARCHIVE_PRODUCT.to_string(),
            variables: vec![ARCHIVE_VARIABLE.to_string()],
            area_name: group.to_string(),
            area,
            years: (FIRST_ARCHIVE_YEAR..=issued.year()).collect(),
            months: (1..=12).collect(),
            target: self.cache_dir().join(ArchiveQuery::file_name(
                ARCHIVE_DATASET,
                ARCHIVE_PRODUCT,
                group,
                issued,
            )),
        };
        let archive = self.client.fetcher().fetch(&query)?;

        let df = read_table(&archive)?;
        let field = field_from_frame(&df, &TableLayout::new(TP, "tp"))?
            .map_values(|metres| metres * METRES_TO_MM);
        let target = self
            .cache_dir()
            .join(format!("{}_{}_{}.parquet", CACHE_PREFIX, group, issued));
        write_parquet(&mut field_to_frame(&field)?, &target)?;
        info!(
            "Cached ERA5 table for '{}' ({} months) at {:?}",
            group,
            field.time().len(),
            target
        );
        Ok(target)
    }
}

/// `{prefix}YYYY-MM.parquet` or `.csv`.
fn is_cache_table(path: &Path, prefix: &str) -> bool {
    let (Some(stem), Some(ext)) = (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) else {
        return false;
    };
    if ext != "parquet" && ext != "csv" {
        return false;
    }
    stem.strip_prefix(prefix)
        .is_some_and(|stamp| NaiveDate::parse_from_str(&format!("{}-01", stamp), "%Y-%m-%d").is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::test_support::{assert_collector_output, indus_grid, loader, write_field};
    use crate::fetch::{ArchiveFetcher, FetchError};
    use crate::location::{BasinCatalogue, InMemoryMaskStore};
    use crate::tables::write_csv;
    use crate::LatLon;
    use polars::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Serves a tiny archive in metres with CDS column names.
    struct ArchiveStub {
        calls: Arc<AtomicU32>,
    }

    impl ArchiveFetcher for ArchiveStub {
        fn fetch(&self, query: &ArchiveQuery) -> Result<PathBuf, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(query.dataset, ARCHIVE_DATASET);
            assert_eq!(query.area_name, "indus");
            assert_eq!(query.years.first(), Some(&FIRST_ARCHIVE_YEAR));
            let mut df = df!(
                "time" => &["2000-01-01", "2000-01-01", "2000-02-01", "2000-02-01"],
                "latitude" => &[31.0, 31.0, 31.0, 31.0],
                "longitude" => &[77.0, 77.25, 77.0, 77.25],
                "tp_0001" => &[Some(0.001), Some(0.002), Some(0.003), None],
            )
            .unwrap();
            write_csv(&mut df, &query.target.with_extension("csv")).unwrap();
            Ok(query.target.with_extension("csv"))
        }
    }

    fn fetching_loader(dir: &Path) -> (PrecipLoader, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let loader = PrecipLoader::custom()
            .data_dir(dir.to_path_buf())
            .catalogue(BasinCatalogue::builtin())
            .mask_store(Box::new(InMemoryMaskStore::new()))
            .fetcher(Box::new(ArchiveStub {
                calls: Arc::clone(&calls),
            }))
            .call()
            .unwrap();
        (loader, calls)
    }

    #[test]
    fn test_cache_hit_does_not_fetch() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path())?;
        write_field(
            &indus_grid("tp"),
            &dir.path().join("ERA5/combi_data_indus_2024-05.parquet"),
        );

        let field = loader
            .era5()
            .location(&LocationSpec::from("indus"))
            .min_year(1996.0)
            .max_year(1998.0)
            .call()?;
        assert_collector_output(&field);
        assert_eq!(field.time().len(), 24);
        assert_eq!(field.provenance().map(|p| p.label.as_str()), Some(ERA5_LABEL));
        Ok(())
    }

    #[test]
    fn test_latest_cache_table_wins() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path())?;
        let old = indus_grid("tp").map_values(|_| 1.0);
        let new = indus_grid("tp").map_values(|_| 2.0);
        write_field(&old, &dir.path().join("ERA5/combi_data_indus_2020-01.parquet"));
        write_field(&new, &dir.path().join("ERA5/combi_data_indus_2021-06.parquet"));
        write_field(&old, &dir.path().join("ERA5/combi_data_indus_extra_2030-01.parquet"));

        let cached = loader.era5().find_cached("indus")?;
        assert_eq!(
            cached,
            Some(dir.path().join("ERA5/combi_data_indus_2021-06.parquet"))
        );

        let field = loader
            .era5()
            .location(&LocationSpec::Coordinate(LatLon(30.1, 75.1)))
            .min_year(1995.0)
            .max_year(1996.0)
            .call()?;
        assert!(field.values().iter().all(|v| *v == Some(2.0)));
        Ok(())
    }

    #[test]
    fn test_cache_miss_fetches_converts_and_caches() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        let (loader, calls) = fetching_loader(dir.path());

        let field = loader
            .era5()
            .location(&LocationSpec::from("indus"))
            .min_year(2000.0)
            .max_year(2001.0)
            .call()?;
        assert_collector_output(&field);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(field.time(), &[Month::new(1, 2000), Month::new(2, 2000)]);
        assert!((field.value(0, 0, 0).unwrap() - 1.0).abs() < 1e-9);
        assert!((field.value(0, 0, 1).unwrap() - 2.0).abs() < 1e-9);
        assert!((field.value(1, 0, 0).unwrap() - 3.0).abs() < 1e-9);
        assert_eq!(field.value(1, 0, 1), None);
        assert!(loader.era5().find_cached("indus")?.is_some());

        loader
            .era5()
            .location(&LocationSpec::from("indus"))
            .min_year(2000.0)
            .max_year(2001.0)
            .call()?;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "Second call is served from cache");

        loader
            .era5()
            .location(&LocationSpec::from("indus"))
            .min_year(2000.0)
            .max_year(2001.0)
            .refresh(true)
            .call()?;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn test_offline_cache_miss_is_an_error() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path())?;
        let result = loader
            .era5()
            .location(&LocationSpec::from("indus"))
            .min_year(2000.0)
            .max_year(2001.0)
            .call();
        assert!(matches!(
            result,
            Err(PrecipError::Fetch(FetchError::NotConfigured(_)))
        ));
        Ok(())
    }

    #[test]
    fn test_at_stations_keeps_elevation() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path())?;
        write_field(
            &indus_grid("tp"),
            &dir.path().join("ERA5/combi_data_indus_2024-05.parquet"),
        );
        let sites = vec![
            StationSite {
                name: "Bhakra".to_string(),
                location: LatLon(30.0, 75.0),
                elevation: Some(518.0),
            },
            StationSite {
                name: "Kasol".to_string(),
                location: LatLon(30.25, 75.25),
                elevation: None,
            },
        ];
        let series = loader
            .era5()
            .at_stations(&sites)
            .min_year(1995.0)
            .max_year(1996.0)
            .call()?;
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].site.elevation, Some(518.0));
        assert!(series[1].field.is_point());
        assert_eq!(series[1].field.lat(), &[30.25]);
        assert_eq!(series[1].field.values().len(), 12);
        Ok(())
    }
}
