//! CRU TS gridded precipitation, interpolated onto the 0.25 degree Indus grid.

use crate::collectors::{finish, read_window, require_file, target_grid};
use crate::fields::{PrecipField, Provenance, Unit};
use crate::location::LocationSpec;
use crate::tables::{field_from_frame, field_to_frame, read_table_in_extent, write_parquet, TableLayout};
use crate::time::AVERAGE_DAYS_PER_MONTH;
use crate::{PrecipError, PrecipLoader};
use bon::bon;
use log::info;
use std::path::{Path, PathBuf};

pub const CRU_LABEL: &str = "CRU";
const DATASET: &str = "CRU";
const INTERPOLATED_TABLE: &str = "CRU/interpolated_cru_1901-2019.parquet";
/// The raw CRU TS release names monthly totals `pre`.
const RAW_COLUMNS: &[&str] = &["pre"];
const TP_COLUMNS: &[&str] = &["tp"];
const PREPARE_AREA: &str = "indus";

/// Client for the interpolated CRU table, obtained via [`PrecipLoader::cru()`].
pub struct CruClient<'a> {
    client: &'a PrecipLoader,
}

#[bon]
impl<'a> CruClient<'a> {
    pub(crate) fn new(client: &'a PrecipLoader) -> Self {
        Self { client }
    }

    pub fn table_path(&self) -> PathBuf {
        self.client.data_dir().join(INTERPOLATED_TABLE)
    }

    /// Monthly CRU precipitation (mm/day) for `location` over `[min_year, max_year)`.
    ///
    /// Reads the table written by [`CruClient::prepare`].
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
        let field = field_from_frame(&df, &TableLayout::new(TP_COLUMNS, "tp"))?;
        finish(
            self.client,
            field,
            location,
            min_year,
            max_year,
            Provenance::new(CRU_LABEL, Unit::MmPerDay),
        )
    }

    /// Converts a raw CRU TS table (monthly totals in `pre`) into the interpolated table.
    ///
    /// The raw grid is cropped to the Indus extent, totals are divided by the
    /// number of days in their month, and the result is resampled by nearest
    /// neighbour onto the common quarter-degree grid, see [`target_grid`].
    pub fn prepare(&self, raw: &Path) -> Result<PathBuf, PrecipError> {
        let area = self
            .client
            .resolver()
            .resolve_extent(&LocationSpec::from(PREPARE_AREA))?;
        info!("Preparing CRU table from {:?}", raw);
        let df = read_table_in_extent(raw, &area)?;
        let monthly_totals = field_from_frame(&df, &TableLayout::new(RAW_COLUMNS, "tp"))?;

        let daily = monthly_totals.map_values_by_month(|month, total| {
            total / month.days().map(f64::from).unwrap_or(AVERAGE_DAYS_PER_MONTH)
        });
        let (lat, lon) = target_grid();
        let interpolated = daily.regrid_nearest(&lat, &lon)?;

        let target = self.table_path();
        write_parquet(&mut field_to_frame(&interpolated)?, &target)?;
        info!("Wrote interpolated CRU table to {:?}", target);
        Ok(target)
    }
}
