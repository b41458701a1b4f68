//! Raw and bias-corrected WRF runs over the Beas and Sutlej basins.

use crate::collectors::{finish, read_window, require_file, target_grid};
use crate::fields::{PrecipField, Provenance, Unit};
use crate::location::LocationSpec;
use crate::tables::columns::{float_values, get_column, time_values, TIME};
use crate::tables::{field_from_frame, field_to_frame, read_table, read_table_in_extent, write_parquet, TableLayout};
use crate::time::{Aggregation, CanonicalTimeAxis};
use crate::{PrecipError, PrecipLoader};
use bon::bon;
use log::{debug, info};
use ordered_float::OrderedFloat;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DATASET: &str = "WRF";
const RAW_TABLE: &str = "Bannister/Bannister_WRF_raw.parquet";
const CORRECTED_TABLE: &str = "Bannister/Bannister_WRF_corrected.parquet";
const TP_COLUMNS: &[&str] = &["tp"];
const MODEL_LAT: &[&str] = &["XLAT", "lat", "latitude"];
const MODEL_LON: &[&str] = &["XLONG", "lon", "longitude"];
const MODEL_PRECIP: &[&str] = &["model_precipitation"];
const CORRECTED_PRECIP: &[&str] = &["bias_corrected_precipitation"];

/// Which of the two WRF products to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrfRun {
    #[default]
    Raw,
    BiasCorrected,
}

impl WrfRun {
    pub fn label(self) -> &'static str {
        match self {
            WrfRun::Raw => "WRF",
            WrfRun::BiasCorrected => "Bias corrected WRF",
        }
    }

    fn table(self) -> &'static str {
        match self {
            WrfRun::Raw => RAW_TABLE,
            WrfRun::BiasCorrected => CORRECTED_TABLE,
        }
    }
}

/// A model grid point on the curvilinear WRF grid.
#[derive(Debug, Clone, Copy)]
struct ModelPoint {
    lat: f64,
    lon: f64,
    index: usize,
}

impl RTreeObject for ModelPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lon])
    }
}

impl PointDistance for ModelPoint {
    /// Squared Euclidean distance in degrees.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlon = self.lon - point[1];
        dlat * dlat + dlon * dlon
    }
}

/// Client for the reprojected WRF tables, obtained via [`PrecipLoader::wrf()`].
pub struct WrfClient<'a> {
    client: &'a PrecipLoader,
}

#[bon]
impl<'a> WrfClient<'a> {
    pub(crate) fn new(client: &'a PrecipLoader) -> Self {
        Self { client }
    }

    pub fn table_path(&self, run: WrfRun) -> PathBuf {
        self.client.data_dir().join(run.table())
    }

    /// Monthly WRF precipitation (mm/day) for `location` over `[min_year, max_year)`.
    ///
    /// `.run(WrfRun::BiasCorrected)` selects the bias-corrected product; the raw run is the default.
    #[builder(start_fn = location)]
    #[doc(hidden)]
    pub fn build_location(
        &self,
        #[builder(start_fn)] location: &LocationSpec,
        min_year: f64,
        max_year: f64,
        run: Option<WrfRun>,
    ) -> Result<PrecipField, PrecipError> {
        let run = run.unwrap_or_default();
        let path = self.table_path(run);
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
            Provenance::new(run.label(), Unit::MmPerDay),
        )
    }

    /// Reprojects the native model output onto the common quarter-degree grid.
    ///
    /// `raw` is a long-format table with `time`, `XLAT`, `XLONG`,
    /// `model_precipitation` and `bias_corrected_precipitation` columns. Both
    /// variables are averaged per month at each model point, then every
    /// target cell takes the value of its nearest model point. Returns the
    /// paths of the raw and the bias-corrected tables.
    pub fn reproject(&self, raw: &Path) -> Result<(PathBuf, PathBuf), PrecipError> {
        info!("Reprojecting WRF output from {:?}", raw);
        let df = read_table(raw)?;
        let lat = float_values(get_column(&df, MODEL_LAT)?)?;
        let lon = float_values(get_column(&df, MODEL_LON)?)?;
        let time = time_values(get_column(&df, TIME)?, None)?;
        let model = float_values(get_column(&df, MODEL_PRECIP)?)?;
        let corrected = float_values(get_column(&df, CORRECTED_PRECIP)?)?;

        let mut point_index: BTreeMap<(OrderedFloat<f64>, OrderedFloat<f64>), usize> =
            BTreeMap::new();
        let mut points = Vec::new();
        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let (Some(lat), Some(lon), Some(time)) = (lat[i], lon[i], time[i].as_ref()) else {
                continue;
            };
            let next = points.len();
            let index = *point_index
                .entry((OrderedFloat(lat), OrderedFloat(lon)))
                .or_insert(next);
            if index == next {
                points.push(ModelPoint { lat, lon, index });
            }
            rows.push((time.month()?, index, model[i], corrected[i]));
        }

        let months = match (
            rows.iter().map(|r| r.0).min(),
            rows.iter().map(|r| r.0).max(),
        ) {
            (Some(first), Some(last)) => CanonicalTimeAxis::spanning(first, last)?.into_months(),
            _ => Vec::new(),
        };
        let first_index = months.first().map(|m| m.index()).unwrap_or_default();

        let n_points = points.len();
        let mut model_acc = MonthlyAccumulator::new(months.len() * n_points);
        let mut corrected_acc = MonthlyAccumulator::new(months.len() * n_points);
        for (month, point, model, corrected) in rows {
            let k = (month.index() - first_index) as usize * n_points + point;
            model_acc.add(k, model);
            corrected_acc.add(k, corrected);
        }
        let model_means = model_acc.finish(Aggregation::Mean);
        let corrected_means = corrected_acc.finish(Aggregation::Mean);

        let (target_lat, target_lon) = target_grid();
        let tree = RTree::bulk_load(points);
        let mut nearest = Vec::with_capacity(target_lat.len() * target_lon.len());
        for &y in &target_lat {
            for &x in &target_lon {
                nearest.push(tree.nearest_neighbor(&[y, x]).map(|p| p.index));
            }
        }
        debug!(
            "Mapped {} model points onto {} target cells",
            n_points,
            nearest.len()
        );

        let regrid = |means: &[Option<f64>]| -> Result<PrecipField, PrecipError> {
            let mut values = Vec::with_capacity(months.len() * nearest.len());
            for t in 0..months.len() {
                values.extend(
                    nearest
                        .iter()
                        .map(|p| p.and_then(|p| means[t * n_points + p])),
                );
            }
            Ok(PrecipField::grid(
                "tp",
                months.clone(),
                target_lat.clone(),
                target_lon.clone(),
                values,
            )?)
        };

        let raw_target = self.table_path(WrfRun::Raw);
        write_parquet(&mut field_to_frame(&regrid(&model_means)?)?, &raw_target)?;
        let corrected_target = self.table_path(WrfRun::BiasCorrected);
        write_parquet(
            &mut field_to_frame(&regrid(&corrected_means)?)?,
            &corrected_target,
        )?;
        info!(
            "Wrote reprojected WRF tables ({} months) to {:?} and {:?}",
            months.len(),
            raw_target,
            corrected_target
        );
        Ok((raw_target, corrected_target))
    }
}

struct MonthlyAccumulator {
    sums: Vec<f64>,
    counts: Vec<usize>,
}

impl MonthlyAccumulator {
    fn new(len: usize) -> Self {
        Self {
            sums: vec![0.0; len],
            counts: vec![0; len],
        }
    }

    fn add(&mut self, k: usize, value: Option<f64>) {
        if let Some(value) = value {
            self.sums[k] += value;
            self.counts[k] += 1;
        }
    }

    fn finish(self, aggregation: Aggregation) -> Vec<Option<f64>> {
        self.sums
            .into_iter()
            .zip(self.counts)
            .map(|(sum, count)| aggregation.finish(sum, count))
            .collect()
    }
}
