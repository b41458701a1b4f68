//! CORDEX East Asia evaluation run (ERA-Interim driven MOHC-HadRM3P).

use crate::collectors::{finish, read_window, require_file};
use crate::fields::{PrecipField, Provenance, Unit};
use crate::location::LocationSpec;
use crate::tables::{field_from_frame, read_table_in_extent, TableLayout};
use crate::{PrecipError, PrecipLoader};
use bon::bon;
use log::debug;
use std::path::PathBuf;

pub const CORDEX_LABEL: &str = "CORDEX EA - MOHC-HadRM3P historical";
const DATASET: &str = "CORDEX";
const CORDEX_DIR: &str = "cordex";
const FILE_STEM: &str = "pr_EAS-44i_ECMWF-ERAINT_evaluation_r1i1p1_MOHC-HadRM3P_v1_mon";
/// Periods covered by the individual files, in time order.
const PERIODS: [&str; 4] = ["199001-199012", "199101-200012", "200101-201012", "201101-201111"];
const PR_COLUMNS: &[&str] = &["pr"];
/// kg m-2 s-1 to mm/day.
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Client for the CORDEX monthly files, obtained via [`PrecipLoader::cordex()`].
pub struct CordexClient<'a> {
    client: &'a PrecipLoader,
}

#[bon]
impl<'a> CordexClient<'a> {
    pub(crate) fn new(client: &'a PrecipLoader) -> Self {
        Self { client }
    }

    /// Paths of the four period files, in time order.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        let dir = self.client.data_dir().join(CORDEX_DIR);
        PERIODS
            .iter()
            .map(|period| dir.join(format!("{}_{}.parquet", FILE_STEM, period)))
            .collect()
    }

    /// Monthly CORDEX precipitation (mm/day) for `location` over `[min_year, max_year)`.
    ///
    /// All period files must be present; they are concatenated before slicing.
    #[builder(start_fn = location)]
    #[doc(hidden)]
    pub fn build_location(
        &self,
        #[builder(start_fn)] location: &LocationSpec,
        min_year: f64,
        max_year: f64,
    ) -> Result<PrecipField, PrecipError> {
        let window = read_window(self.client, location)?;
        let layout = TableLayout::new(PR_COLUMNS, "tp");
        let mut parts = Vec::with_capacity(PERIODS.len());
        for path in self.file_paths() {
            require_file(DATASET, &path)?;
            debug!("Reading CORDEX file {:?}", path);
            let df = read_table_in_extent(&path, &window)?;
            parts.push(field_from_frame(&df, &layout)?);
        }
        let field = PrecipField::merge_time(parts)?.map_values(|flux| flux * SECONDS_PER_DAY);
        finish(
            self.client,
            field,
            location,
            min_year,
            max_year,
            Provenance::new(CORDEX_LABEL, Unit::MmPerDay),
        )
    }
}
