//! VALUE ECA&D station precipitation over Europe (86 stations).
//!
//! `VALUE_ECA_86_v2/precip.txt` holds daily values with one column per
//! station id next to a `YYYYMMDD` date column. `stations.txt` is tab
//! separated and its header names carry a leading space.

use crate::collectors::error::CollectError;
use crate::collectors::{months_in_range, require_file, StationSeries, StationSite};
use crate::fields::{PrecipField, Provenance, Unit};
use crate::location::LatLon;
use crate::tables::columns::{get_column, string_values, time_values, LAT, LON, TIME};
use crate::tables::{read_table_as, TableError, TableFormat};
use crate::time::{resample_monthly, slice_range, Aggregation, Month};
use crate::{PrecipError, PrecipLoader};
use bon::bon;
use chrono::NaiveDateTime;
use log::{debug, info};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const VALUE_LABEL: &str = "VALUE";
const DATASET: &str = "VALUE";
const VALUE_DIR: &str = "VALUE_ECA_86_v2";
const PRECIP_FILE: &str = "precip.txt";
const STATIONS_FILE: &str = "stations.txt";
const STATION_ID: &[&str] = &["station_id"];
const NAME: &[&str] = &["name"];
const ALTITUDE: &[&str] = &["altitude", "alt"];

#[derive(Debug, Clone)]
struct ValueStation {
    id: String,
    site: StationSite,
}

/// Client for the VALUE station data, obtained via [`PrecipLoader::value()`].
pub struct ValueClient<'a> {
    client: &'a PrecipLoader,
}

#[bon]
impl<'a> ValueClient<'a> {
    pub(crate) fn new(client: &'a PrecipLoader) -> Self {
        Self { client }
    }

    /// Station metadata from `stations.txt`.
    pub fn sites(&self) -> Result<Vec<StationSite>, PrecipError> {
        Ok(self.stations()?.into_iter().map(|s| s.site).collect())
    }

    /// Monthly mean of the daily values of one station (mm/day) over `[min_year, max_year)`.
    ///
    /// Station names are matched case-insensitively, e.g. `"ZUGSPITZE"`.
    #[builder(start_fn = station)]
    #[doc(hidden)]
    pub fn build_station(
        &self,
        #[builder(start_fn)] station: &str,
        min_year: f64,
        max_year: f64,
    ) -> Result<PrecipField, PrecipError> {
        let wanted = station.trim();
        let station = self
            .stations()?
            .into_iter()
            .find(|s| s.site.name.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CollectError::UnknownStation {
                dataset: DATASET,
                station: wanted.to_string(),
            })?;
        let table = self.daily_table()?;
        let Some(records) = table.get(&station.id) else {
            return Err(CollectError::NoData {
                dataset: DATASET,
                location: station.site.name,
            }
            .into());
        };

        let (months, values): (Vec<Month>, Vec<Option<f64>>) =
            resample_monthly(records.iter().copied(), Aggregation::Mean)
                .into_iter()
                .unzip();
        let field = PrecipField::point("tp", months, station.site.location, values)?;
        Ok(slice_range(&field, min_year, max_year)
            .with_provenance(Provenance::new(VALUE_LABEL, Unit::MmPerDay)))
    }

    /// Monthly series of every station with data, on the shared axis of `[min_year, max_year)`.
    #[builder(start_fn = all_stations)]
    #[doc(hidden)]
    pub fn build_all_stations(
        &self,
        min_year: f64,
        max_year: f64,
    ) -> Result<Vec<StationSeries>, PrecipError> {
        let months = months_in_range(min_year, max_year)?;
        if months.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.daily_table()?;

        let mut series = Vec::new();
        for station in self.stations()? {
            let Some(records) = table.get(&station.id) else {
                debug!("No VALUE column for station {} ({})", station.id, station.site.name);
                continue;
            };
            let monthly: BTreeMap<Month, Option<f64>> =
                resample_monthly(records.iter().copied(), Aggregation::Mean)
                    .into_iter()
                    .collect();
            let values = months
                .iter()
                .map(|m| monthly.get(m).copied().flatten())
                .collect();
            let field = PrecipField::point("tp", months.clone(), station.site.location, values)?
                .with_provenance(Provenance::new(VALUE_LABEL, Unit::MmPerDay));
            series.push(StationSeries {
                site: station.site,
                field,
            });
        }
        info!("Collected {} VALUE station series", series.len());
        Ok(series)
    }

    fn value_dir(&self) -> PathBuf {
        self.client.data_dir().join(VALUE_DIR)
    }

    fn stations(&self) -> Result<Vec<ValueStation>, PrecipError> {
        let path = self.value_dir().join(STATIONS_FILE);
        require_file(DATASET, &path)?;
        let mut df = read_table_as(&path, TableFormat::Delimited { separator: b'\t' })?;
        trim_column_names(&mut df)?;

        let ids = trimmed_strings(get_column(&df, STATION_ID)?)?;
        let names = trimmed_strings(get_column(&df, NAME)?)?;
        let lat = trimmed_floats(get_column(&df, LAT)?)?;
        let lon = trimmed_floats(get_column(&df, LON)?)?;
        let altitude = match get_column(&df, ALTITUDE) {
            Ok(column) => trimmed_floats(column)?,
            Err(_) => vec![None; df.height()],
        };

        let mut stations = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            if let (Some(id), Some(name), Some(lat), Some(lon)) =
                (&ids[i], &names[i], lat[i], lon[i])
            {
                stations.push(ValueStation {
                    id: id.clone(),
                    site: StationSite {
                        name: name.clone(),
                        location: LatLon(lat, lon),
                        elevation: altitude[i],
                    },
                });
            }
        }
        Ok(stations)
    }

    /// Daily records keyed by station id.
    fn daily_table(&self) -> Result<BTreeMap<String, Vec<(NaiveDateTime, Option<f64>)>>, PrecipError> {
        let path = self.value_dir().join(PRECIP_FILE);
        require_file(DATASET, &path)?;
        let mut df = read_table_as(&path, TableFormat::Delimited { separator: b',' })?;
        trim_column_names(&mut df)?;

        let time_column = get_column(&df, TIME)?;
        let time_name = time_column.name().to_string();
        let mut dates = Vec::with_capacity(df.height());
        for time in time_values(time_column, None)? {
            dates.push(match time {
                Some(time) => Some(time.to_datetime()?),
                None => None,
            });
        }

        let mut table = BTreeMap::new();
        for column in df.get_columns() {
            if column.name().as_str() == time_name {
                continue;
            }
            let values = trimmed_floats(column)?;
            let records = dates
                .iter()
                .zip(values)
                .filter_map(|(date, value)| date.map(|d| (d, value)))
                .collect();
            table.insert(column.name().to_string(), records);
        }
        debug!("Read {} VALUE station columns from {:?}", table.len(), path);
        Ok(table)
    }
}

fn trim_column_names(df: &mut DataFrame) -> Result<(), TableError> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    df.set_column_names(names)?;
    Ok(())
}

fn trimmed_strings(column: &Column) -> Result<Vec<Option<String>>, TableError> {
    Ok(string_values(column)?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect())
}

/// Numbers that may be stored as space-padded text.
fn trimmed_floats(column: &Column) -> Result<Vec<Option<f64>>, TableError> {
    Ok(trimmed_strings(column)?
        .into_iter()
        .map(|v| v.and_then(|s| s.parse::<f64>().ok()).filter(|x| !x.is_nan()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::test_support::loader;
    use std::fs;
    use std::path::Path;

    fn write_value(dir: &Path) {
        let value = dir.join(VALUE_DIR);
        fs::create_dir_all(&value).unwrap();
        fs::write(
            value.join(STATIONS_FILE),
            "station_id\t name\t longitude\t latitude\t altitude\t source\n\
             1\t GRAZ\t 15.45\t 47.08\t 366\t ECA\n\
             2\t ZUGSPITZE\t 10.98\t 47.42\t 2960\t ECA\n\
             3\t NODATA\t 5.0\t 50.0\t 10\t ECA\n",
        )
        .unwrap();
        fs::write(
            value.join(PRECIP_FILE),
            "YYYYMMDD, 1, 2\n\
             19610101,1.0,4.0\n\
             19610102,3.0,6.0\n\
             19610201,2.0,\n\
             19620101,5.0,5.0\n",
        )
        .unwrap();
    }

    #[test]
    fn test_station_monthly_mean() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        write_value(dir.path());
        let loader = loader(dir.path())?;

        let field = loader
            .value()
            .station("zugspitze")
            .min_year(1961.0)
            .max_year(1962.0)
            .call()?;
        assert!(field.is_point());
        assert_eq!(field.variable(), "tp");
        assert_eq!(field.lat(), &[47.42]);
        assert_eq!(field.lon(), &[10.98]);
        assert_eq!(field.time().len(), 12);
        assert_eq!(field.values()[0], Some(5.0));
        assert_eq!(field.values()[1], None);
        assert_eq!(field.provenance().map(|p| p.label.as_str()), Some(VALUE_LABEL));
        Ok(())
    }

    #[test]
    fn test_station_errors() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        write_value(dir.path());
        let loader = loader(dir.path())?;

        let unknown = loader.value().station("WIEN").min_year(1961.0).max_year(1962.0).call();
        assert!(matches!(
            unknown,
            Err(PrecipError::Collect(CollectError::UnknownStation { .. }))
        ));
        let no_data = loader.value().station("NODATA").min_year(1961.0).max_year(1962.0).call();
        assert!(matches!(
            no_data,
            Err(PrecipError::Collect(CollectError::NoData { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_all_stations() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        write_value(dir.path());
        let loader = loader(dir.path())?;

        let sites = loader.value().sites()?;
        assert_eq!(sites.len(), 3);
        assert_eq!(sites[0].name, "GRAZ");
        assert_eq!(sites[1].elevation, Some(2960.0));

        let series = loader
            .value()
            .all_stations()
            .min_year(1961.0)
            .max_year(1963.0)
            .call()?;
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].site.name, "GRAZ");
        assert_eq!(series[0].field.time().len(), 24);
        assert_eq!(series[0].field.values()[0], Some(2.0));
        assert_eq!(series[0].field.values()[1], Some(2.0));
        assert_eq!(series[0].field.values()[12], Some(5.0));
        assert_eq!(series[1].field.values()[12], Some(5.0));
        Ok(())
    }
}
