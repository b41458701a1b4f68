//! Daily rain gauge records from the Beas and Sutlej valleys.
//!
//! `bs_gauges/gauge_info.csv` lists the stations (`station,lat,lon,elv`);
//! each station has a `bs_gauges/{station}.csv` file with `Date` and `tp`
//! (mm per day) columns.

use crate::collectors::error::CollectError;
use crate::collectors::{months_in_range, require_file, StationSeries, StationSite};
use crate::fields::{PrecipField, Provenance, Unit};
use crate::location::LatLon;
use crate::tables::columns::{float_values, get_column, string_values, time_values, LAT, LON, TIME, TP};
use crate::tables::read_table;
use crate::time::{resample_monthly, slice_range, Aggregation, Month};
use crate::{PrecipError, PrecipLoader};
use bon::bon;
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const GAUGE_LABEL: &str = "Gauge data";
const DATASET: &str = "gauges";
const GAUGE_DIR: &str = "bs_gauges";
const GAUGE_INFO: &str = "gauge_info.csv";
const STATION: &[&str] = &["station", "name"];
const ELEVATION: &[&str] = &["elv", "elevation", "altitude"];

/// Client for the gauge records, obtained via [`PrecipLoader::gauges()`].
pub struct GaugeClient<'a> {
    client: &'a PrecipLoader,
}

#[bon]
impl<'a> GaugeClient<'a> {
    pub(crate) fn new(client: &'a PrecipLoader) -> Self {
        Self { client }
    }

    /// All stations listed in `gauge_info.csv`.
    pub fn sites(&self) -> Result<Vec<StationSite>, PrecipError> {
        let path = self.gauge_dir().join(GAUGE_INFO);
        require_file(DATASET, &path)?;
        let df = read_table(&path)?;
        let names = string_values(get_column(&df, STATION)?)?;
        let lat = float_values(get_column(&df, LAT)?)?;
        let lon = float_values(get_column(&df, LON)?)?;
        let elevation = match get_column(&df, ELEVATION) {
            Ok(column) => float_values(column)?,
            Err(_) => vec![None; df.height()],
        };

        let mut sites = Vec::with_capacity(df.height());
        for (((name, lat), lon), elevation) in names.into_iter().zip(lat).zip(lon).zip(elevation) {
            match (name, lat, lon) {
                (Some(name), Some(lat), Some(lon)) => sites.push(StationSite {
                    name: name.trim().to_string(),
                    location: LatLon(lat, lon),
                    elevation,
                }),
                (name, _, _) => warn!("Skipping gauge {:?} without coordinates", name),
            }
        }
        Ok(sites)
    }

    /// Monthly series (mm/day) of one gauge over `[min_year, max_year)`.
    ///
    /// Daily values are summed per month and divided by the average month
    /// length. Months where every day is missing are `None`.
    ///
    /// # Errors
    ///
    /// * [`CollectError::UnknownStation`] if the station is not in `gauge_info.csv`.
    /// * [`CollectError::MissingDataFile`] if the station has no record file.
    #[builder(start_fn = station)]
    #[doc(hidden)]
    pub fn build_station(
        &self,
        #[builder(start_fn)] station: &str,
        min_year: f64,
        max_year: f64,
    ) -> Result<PrecipField, PrecipError> {
        let site = self
            .sites()?
            .into_iter()
            .find(|site| site.name == station)
            .ok_or_else(|| CollectError::UnknownStation {
                dataset: DATASET,
                station: station.to_string(),
            })?;
        let records = self.daily_records(&site.name)?;
        let (months, values): (Vec<Month>, Vec<Option<f64>>) =
            resample_monthly(records, Aggregation::SumPerAverageMonth)
                .into_iter()
                .unzip();
        let field = PrecipField::point("tp", months, site.location, values)?;
        Ok(slice_range(&field, min_year, max_year)
            .with_provenance(Provenance::new(GAUGE_LABEL, Unit::MmPerDay)))
    }

    /// Monthly series of every station over `[min_year, max_year)` on a shared time axis.
    ///
    /// With a `threshold`, stations with fewer valid daily values than that
    /// inside the range are dropped. Stations without a record file are
    /// skipped.
    #[builder(start_fn = all_stations)]
    #[doc(hidden)]
    pub fn build_all_stations(
        &self,
        min_year: f64,
        max_year: f64,
        threshold: Option<usize>,
    ) -> Result<Vec<StationSeries>, PrecipError> {
        let months = months_in_range(min_year, max_year)?;
        let (Some(first), Some(last)) = (months.first().copied(), months.last().copied()) else {
            return Ok(Vec::new());
        };

        let mut series = Vec::new();
        for site in self.sites()? {
            if !self.record_path(&site.name).exists() {
                warn!("No record file for gauge '{}', skipping", site.name);
                continue;
            }
            let records: Vec<(NaiveDateTime, Option<f64>)> = self
                .daily_records(&site.name)?
                .into_iter()
                .filter(|(date, _)| (first..=last).contains(&Month::from_date(*date)))
                .collect();
            let valid = records.iter().filter(|(_, v)| v.is_some()).count();
            if let Some(threshold) = threshold {
                if valid < threshold {
                    warn!(
                        "Dropping gauge '{}': {} valid days, {} required",
                        site.name, valid, threshold
                    );
                    continue;
                }
            }

            let monthly: BTreeMap<Month, Option<f64>> =
                resample_monthly(records, Aggregation::SumPerAverageMonth)
                    .into_iter()
                    .collect();
            let values = months
                .iter()
                .map(|m| monthly.get(m).copied().flatten())
                .collect();
            let field = PrecipField::point("tp", months.clone(), site.location, values)?
                .with_provenance(Provenance::new(GAUGE_LABEL, Unit::MmPerDay));
            series.push(StationSeries { site, field });
        }
        info!(
            "Collected {} gauge series between {} and {}",
            series.len(),
            first,
            last
        );
        Ok(series)
    }

    fn gauge_dir(&self) -> PathBuf {
        self.client.data_dir().join(GAUGE_DIR)
    }

    fn record_path(&self, station: &str) -> PathBuf {
        self.gauge_dir().join(format!("{}.csv", station))
    }

    fn daily_records(&self, station: &str) -> Result<Vec<(NaiveDateTime, Option<f64>)>, PrecipError> {
        let path = self.record_path(station);
        require_file(DATASET, &path)?;
        let df = read_table(&path)?;
        let times = time_values(get_column(&df, TIME)?, None)?;
        let values = float_values(get_column(&df, TP)?)?;

        let mut records = Vec::with_capacity(df.height());
        for (time, value) in times.into_iter().zip(values) {
            if let Some(time) = time {
                records.push((time.to_datetime()?, value));
            }
        }
        debug!("Read {} daily values for gauge '{}'", records.len(), station);
        Ok(records)
    }
}
