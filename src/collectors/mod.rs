//! One client per dataset. Every client reads its backing table from the
//! loader's data directory, restricts it to the requested location and
//! returns a monthly [`PrecipField`] in mm/day.

pub mod aphrodite;
pub mod cordex;
pub mod cru;
pub mod era5;
pub mod error;
pub mod gauges;
pub mod value;
pub mod wrf;

use crate::collectors::error::CollectError;
use crate::fields::{regular_axis, PrecipField, Provenance};
use crate::location::{Extent, LatLon, LocationSpec};
use crate::time::{slice_range, Month, RawTime, TimeError};
use crate::{PrecipError, PrecipLoader};
use std::path::Path;

/// Half-width in degrees of the window read around a coordinate.
const POINT_WINDOW_DEG: f64 = 2.0;

/// Common 0.25 degree grid of prepared tables, `[start, stop, step)` in degrees.
pub const TARGET_LAT: (f64, f64, f64) = (25.0, 35.0, 0.25);
pub const TARGET_LON: (f64, f64, f64) = (70.0, 85.0, 0.25);

/// Latitude and longitude axes of the common prepared grid.
pub fn target_grid() -> (Vec<f64>, Vec<f64>) {
    (
        regular_axis(TARGET_LAT.0, TARGET_LAT.1, TARGET_LAT.2),
        regular_axis(TARGET_LON.0, TARGET_LON.1, TARGET_LON.2),
    )
}

/// A measurement site with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSite {
    pub name: String,
    pub location: LatLon,
    pub elevation: Option<f64>,
}

/// Monthly series of one station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSeries {
    pub site: StationSite,
    pub field: PrecipField,
}

pub(crate) fn require_file(dataset: &'static str, path: &Path) -> Result<(), CollectError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CollectError::MissingDataFile {
            dataset,
            path: path.to_path_buf(),
        })
    }
}

/// Area of a source table worth reading for `location`.
pub(crate) fn read_window(
    loader: &PrecipLoader,
    location: &LocationSpec,
) -> Result<Extent, PrecipError> {
    match location {
        LocationSpec::Named(_) => Ok(loader.resolver().resolve_extent(location)?),
        LocationSpec::Coordinate(point) => Ok(Extent::new(
            point.lat() + POINT_WINDOW_DEG,
            point.lon() - POINT_WINDOW_DEG,
            point.lat() - POINT_WINDOW_DEG,
            point.lon() + POINT_WINDOW_DEG,
        )?),
    }
}

/// Months whose start lies in `[min_year, max_year)`, the axis [`slice_range`] keeps.
pub(crate) fn months_in_range(min_year: f64, max_year: f64) -> Result<Vec<Month>, TimeError> {
    let mut month = RawTime::FractionalYear(min_year).month()?;
    if month.start_year_fraction() < min_year {
        month = month.succ();
    }
    let mut months = Vec::new();
    while month.start_year_fraction() < max_year {
        months.push(month);
        month = month.succ();
    }
    Ok(months)
}

/// Crop, select and slice a freshly loaded field, then label it.
pub(crate) fn finish(
    loader: &PrecipLoader,
    field: PrecipField,
    location: &LocationSpec,
    min_year: f64,
    max_year: f64,
    provenance: Provenance,
) -> Result<PrecipField, PrecipError> {
    let resolver = loader.resolver();
    let field = match location {
        LocationSpec::Named(_) => {
            let extent = resolver.resolve_extent(location)?;
            resolver.crop(&field, &extent)?
        }
        LocationSpec::Coordinate(_) => field,
    };
    let field = resolver.select(&field, location)?;
    Ok(slice_range(&field, min_year, max_year).with_provenance(provenance))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::fetch::OfflineFetcher;
    use crate::fields::PrecipField;
    use crate::location::{BasinCatalogue, InMemoryMaskStore};
    use crate::tables::{field_to_frame, write_parquet};
    use crate::time::Month;
    use crate::{PrecipError, PrecipLoader};
    use std::path::Path;

    /// Offline loader over `dir` with the built-in catalogue and no masks.
    pub fn loader(dir: &Path) -> Result<PrecipLoader, PrecipError> {
        PrecipLoader::custom()
            .data_dir(dir.to_path_buf())
            .catalogue(BasinCatalogue::builtin())
            .mask_store(Box::new(InMemoryMaskStore::new()))
            .fetcher(Box::new(OfflineFetcher))
            .call()
    }

    /// Monthly grid over 1995..1999 on a 2x2 grid inside the Indus extent,
    /// value `1 + t` in every cell.
    pub fn indus_grid(variable: &str) -> PrecipField {
        let months: Vec<Month> = (0..48).map(|k| Month::from_index(1995 * 12 + k)).collect();
        let values = (0..48)
            .flat_map(|t| std::iter::repeat(Some(1.0 + t as f64)).take(4))
            .collect();
        PrecipField::grid(variable, months, vec![30.0, 30.25], vec![75.0, 75.25], values)
            .unwrap()
    }

    pub fn write_field(field: &PrecipField, path: &Path) {
        write_parquet(&mut field_to_frame(field).unwrap(), path).unwrap();
    }

    #[test]
    fn test_months_in_range_is_half_open() -> Result<(), crate::time::TimeError> {
        let months = super::months_in_range(1996.0, 1998.0)?;
        assert_eq!(months.len(), 24);
        assert_eq!(months[0], Month::new(1, 1996));
        assert_eq!(months[23], Month::new(12, 1997));

        let months = super::months_in_range(1996.3, 1996.5)?;
        assert_eq!(months, vec![Month::new(5, 1996), Month::new(6, 1996)]);
        assert!(super::months_in_range(2000.0, 2000.0)?.is_empty());
        Ok(())
    }

    /// Acceptance checks every collector output must pass.
    pub fn assert_collector_output(field: &PrecipField) {
        assert_eq!(field.variable(), "tp");
        assert!(!field.lat().is_empty());
        assert!(!field.lon().is_empty());
        let starts: Vec<_> = field.time().iter().map(|m| m.start().unwrap()).collect();
        assert!(crate::time::is_month_aligned(&starts));
    }
}
