//! APHRODITE gauge-based gridded precipitation over High Mountain Asia.

use crate::collectors::{finish, read_window, require_file};
use crate::fields::{PrecipField, Provenance, Unit};
use crate::location::LocationSpec;
use crate::tables::{field_from_frame, field_to_frame, read_table_in_extent, write_parquet, TableLayout};
use crate::{PrecipError, PrecipLoader};
use bon::bon;
use log::info;
use std::path::{Path, PathBuf};

pub const APHRODITE_LABEL: &str = "APHRODITE";
const DATASET: &str = "APHRODITE";
const MERGED_TABLE: &str = "APHRODITE/aphrodite_hma_1951_2016.parquet";
/// Raw files name the variable `precip`, the merged table `tp`.
const VALUE_COLUMNS: &[&str] = &["tp", "precip"];
/// Catalogue entry the merged table is cropped to.
const MERGE_AREA: &str = "hma";

/// Client for the merged APHRODITE table, obtained via [`PrecipLoader::aphrodite()`].
pub struct AphroditeClient<'a> {
    client: &'a PrecipLoader,
}

#[bon]
impl<'a> AphroditeClient<'a> {
    pub(crate) fn new(client: &'a PrecipLoader) -> Self {
        Self { client }
    }

    pub fn table_path(&self) -> PathBuf {
        self.client.data_dir().join(MERGED_TABLE)
    }

    /// Monthly APHRODITE precipitation (mm/day) for `location` over `[min_year, max_year)`.
    ///
    /// # Errors
    ///
    /// * [`crate::CollectError::MissingDataFile`] if the merged table has not been built,
    ///   see [`AphroditeClient::merge_raw`].
    /// * Location errors from resolving or selecting `location`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use precip_loader::{LocationSpec, PrecipError, PrecipLoader};
    /// # fn main() -> Result<(), PrecipError> {
    /// let loader = PrecipLoader::new()?;
    /// let field = loader
    ///     .aphrodite()
    ///     .location(&LocationSpec::from("beas"))
    ///     .min_year(1990.0)
    ///     .max_year(2005.0)
    ///     .call()?;
    /// println!("{} months", field.time().len());
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
    ) -> Result<PrecipField, PrecipError> {
        let path = self.table_path();
        require_file(DATASET, &path)?;
        let window = read_window(self.client, location)?;
        let df = read_table_in_extent(&path, &window)?;
        let field = field_from_frame(&df, &TableLayout::new(VALUE_COLUMNS, "tp"))?;
        finish(
            self.client,
            field,
            location,
            min_year,
            max_year,
            Provenance::new(APHRODITE_LABEL, Unit::MmPerDay),
        )
    }

    /// Builds the merged table from raw daily files.
    ///
    /// Each file is cropped to the High Mountain Asia extent and averaged per
    /// month; the monthly parts are then concatenated in time and written to
    /// the location [`AphroditeClient::table_path`] reads from.
    pub fn merge_raw<P: AsRef<Path>>(&self, files: &[P]) -> Result<PathBuf, PrecipError> {
        let area = self
            .client
            .resolver()
            .resolve_extent(&LocationSpec::from(MERGE_AREA))?;
        let layout = TableLayout::new(VALUE_COLUMNS, "tp");

        let mut parts = Vec::with_capacity(files.len());
        for file in files {
            let file = file.as_ref();
            info!("Reading raw APHRODITE file {:?}", file);
            let df = read_table_in_extent(file, &area)?;
            parts.push(field_from_frame(&df, &layout)?);
        }
        let merged = PrecipField::merge_time(parts)?;

        let target = self.table_path();
        write_parquet(&mut field_to_frame(&merged)?, &target)?;
        info!(
            "Wrote merged APHRODITE table with {} months to {:?}",
            merged.time().len(),
            target
        );
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::test_support::{assert_collector_output, indus_grid, loader, write_field};
    use crate::tables::write_csv;
    use crate::time::Month;
    use crate::LatLon;
    use polars::prelude::*;

    #[test]
    fn test_named_location_is_sliced_and_labelled() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path())?;
        write_field(&indus_grid("tp"), &loader.aphrodite().table_path());

        let field = loader
            .aphrodite()
            .location(&LocationSpec::from("indus"))
            .min_year(1996.0)
            .max_year(1998.0)
            .call()?;
        assert_collector_output(&field);
        assert_eq!(field.time().len(), 24);
        assert_eq!(field.time()[0], Month::new(1, 1996));
        assert_eq!(field.provenance().map(|p| p.label.as_str()), Some(APHRODITE_LABEL));
        Ok(())
    }

    #[test]
    fn test_coordinate_gives_point_series() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path())?;
        write_field(&indus_grid("tp"), &loader.aphrodite().table_path());

        let field = loader
            .aphrodite()
            .location(&LocationSpec::Coordinate(LatLon(30.2, 75.1)))
            .min_year(1995.0)
            .max_year(1996.0)
            .call()?;
        assert!(field.is_point());
        assert_eq!(field.values()[0], Some(1.0));
        assert_eq!(field.values().len(), 12);
        Ok(())
    }

    #[test]
    fn test_missing_table() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path())?;
        let result = loader
            .aphrodite()
            .location(&LocationSpec::from("indus"))
            .min_year(1996.0)
            .max_year(1998.0)
            .call();
        assert!(matches!(
            result,
            Err(PrecipError::Collect(crate::CollectError::MissingDataFile { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_merge_raw_daily_files() -> Result<(), PrecipError> {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path())?;

        let first = dir.path().join("raw_1990.csv");
        let mut df = df!(
            "time" => &["1990-01-01", "1990-01-02", "1990-02-01"],
            "latitude" => &[30.0, 30.0, 30.0],
            "longitude" => &[75.0, 75.0, 75.0],
            "precip" => &[2.0, 4.0, 1.0],
        )
        .unwrap();
        write_csv(&mut df, &first)?;
        let second = dir.path().join("raw_1991.csv");
        let mut df = df!(
            "time" => &["1991-01-05", "1991-01-06"],
            "latitude" => &[30.0, 30.0],
            "longitude" => &[75.0, 75.0],
            "precip" => &[1.0, 1.0],
        )
        .unwrap();
        write_csv(&mut df, &second)?;

        let target = loader.aphrodite().merge_raw(&[&second, &first])?;
        assert!(target.exists());

        let field = loader
            .aphrodite()
            .location(&LocationSpec::from("hma"))
            .min_year(1990.0)
            .max_year(1992.0)
            .call()?;
        assert_collector_output(&field);
        assert_eq!(field.time().len(), 13, "Months between the files are filled in");
        assert_eq!(field.time()[0], Month::new(1, 1990));
        assert_eq!(field.time()[12], Month::new(1, 1991));
        assert_eq!(field.values()[0], Some(3.0));
        assert_eq!(field.values()[1], Some(1.0));
        assert_eq!(field.values()[2], None);
        assert_eq!(field.values()[12], Some(1.0));
        Ok(())
    }
}
