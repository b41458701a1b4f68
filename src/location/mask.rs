//! Basin occupancy grids and where they are loaded from.

use crate::fields::field::exact_index;
use crate::location::error::MaskLoadError;
use crate::tables::columns::{float_values, get_column, LAT, LON};
use crate::tables::read_table;
use log::debug;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const OVERLAP: &[&str] = &["overlap"];
const MASK_EXTENSIONS: &[&str] = &["parquet", "csv", "nc"];

/// Path of a mask relative to the data directory, e.g. `Masks/Beas_mask`.
///
/// The extension may be left out, in which case the file store picks the
/// first existing `.parquet`, `.csv` or `.nc` file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskRef(pub PathBuf);

impl MaskRef {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl From<&str> for MaskRef {
    fn from(value: &str) -> Self {
        Self(PathBuf::from(value))
    }
}

impl From<PathBuf> for MaskRef {
    fn from(value: PathBuf) -> Self {
        Self(value)
    }
}

impl Display for MaskRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A 2-D occupancy grid over ascending `lat`/`lon` axes.
///
/// A cell belongs to the basin when its value is `> 0`; NaN counts as outside.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskGrid {
    lat: Vec<f64>,
    lon: Vec<f64>,
    values: Vec<f64>,
}

impl MaskGrid {
    /// `values` are row-major `[lat][lon]`; axes must be strictly ascending.
    pub fn new(lat: Vec<f64>, lon: Vec<f64>, values: Vec<f64>) -> Result<Self, MaskLoadError> {
        if values.len() != lat.len() * lon.len() {
            return Err(MaskLoadError::CellCount {
                expected: lat.len() * lon.len(),
                found: values.len(),
            });
        }
        if lat.windows(2).any(|p| p[1] <= p[0]) {
            return Err(MaskLoadError::UnsortedAxis("lat"));
        }
        if lon.windows(2).any(|p| p[1] <= p[0]) {
            return Err(MaskLoadError::UnsortedAxis("lon"));
        }
        Ok(Self { lat, lon, values })
    }

    /// Builds a grid from `(lat, lon, value)` cells in any order.
    ///
    /// Cells missing from the input are NaN, i.e. outside.
    pub fn from_cells(cells: impl IntoIterator<Item = (f64, f64, f64)>) -> Self {
        let cells: BTreeMap<(OrderedFloat<f64>, OrderedFloat<f64>), f64> = cells
            .into_iter()
            .map(|(lat, lon, value)| ((OrderedFloat(lat), OrderedFloat(lon)), value))
            .collect();
        let lat: Vec<f64> = cells
            .keys()
            .map(|k| k.0)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|v| v.0)
            .collect();
        let lon: Vec<f64> = cells
            .keys()
            .map(|k| k.1)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|v| v.0)
            .collect();
        let mut values = Vec::with_capacity(lat.len() * lon.len());
        for y in &lat {
            for x in &lon {
                values.push(
                    cells
                        .get(&(OrderedFloat(*y), OrderedFloat(*x)))
                        .copied()
                        .unwrap_or(f64::NAN),
                );
            }
        }
        Self { lat, lon, values }
    }

    pub fn lat(&self) -> &[f64] {
        &self.lat
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }

    pub fn is_inside(&self, i: usize, j: usize) -> bool {
        self.values
            .get(i * self.lon.len() + j)
            .is_some_and(|v| *v > 0.0)
    }

    /// Membership of the cell at exactly `(lat, lon)`, `None` if no such cell exists.
    pub fn inside_at(&self, lat: f64, lon: f64, tolerance: f64) -> Option<bool> {
        let i = exact_index(&self.lat, lat, tolerance)?;
        let j = exact_index(&self.lon, lon, tolerance)?;
        Some(self.is_inside(i, j))
    }

    pub fn inside_count(&self) -> usize {
        self.values.iter().filter(|v| **v > 0.0).count()
    }
}

/// Loads mask grids referenced by the catalogue.
pub trait MaskStore {
    fn load(&self, mask: &MaskRef) -> Result<MaskGrid, MaskLoadError>;
}

/// Reads masks from files under a root directory (normally the data directory).
///
/// Long-format tables (`.parquet`, `.csv`) need `lat`/`latitude`,
/// `lon`/`longitude` and `overlap` columns. NetCDF files with an
/// `overlap(latitude, longitude)` variable are read when the `netcdf`
/// feature is enabled.
#[derive(Debug, Clone)]
pub struct FileMaskStore {
    root: PathBuf,
}

impl FileMaskStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, mask: &MaskRef) -> Result<PathBuf, MaskLoadError> {
        let path = self.root.join(mask.path());
        if path.extension().is_some() {
            return if path.exists() {
                Ok(path)
            } else {
                Err(MaskLoadError::NotFound(path))
            };
        }
        MASK_EXTENSIONS
            .iter()
            .map(|ext| path.with_extension(ext))
            .find(|candidate| candidate.exists())
            .ok_or(MaskLoadError::NotFound(path))
    }
}

impl MaskStore for FileMaskStore {
    fn load(&self, mask: &MaskRef) -> Result<MaskGrid, MaskLoadError> {
        let path = self.locate(mask)?;
        debug!("Loading mask {} from {:?}", mask, path);
        match path.extension().and_then(|e| e.to_str()) {
            Some("parquet") | Some("csv") => read_mask_table(&path),
            #[cfg(feature = "netcdf")]
            Some("nc") => crate::location::netcdf_mask::read_netcdf_mask(&path),
            _ => Err(MaskLoadError::UnsupportedFormat(path)),
        }
    }
}

fn read_mask_table(path: &Path) -> Result<MaskGrid, MaskLoadError> {
    let table_error = |e| MaskLoadError::Table(path.to_path_buf(), e);
    let df = read_table(path).map_err(table_error)?;
    let lat = float_values(get_column(&df, LAT).map_err(table_error)?).map_err(table_error)?;
    let lon = float_values(get_column(&df, LON).map_err(table_error)?).map_err(table_error)?;
    let overlap =
        float_values(get_column(&df, OVERLAP).map_err(table_error)?).map_err(table_error)?;

    let cells = lat
        .into_iter()
        .zip(lon)
        .zip(overlap)
        .filter_map(|((lat, lon), value)| Some((lat?, lon?, value.unwrap_or(f64::NAN))));
    let grid = MaskGrid::from_cells(cells);
    if grid.lat().is_empty() || grid.lon().is_empty() {
        return Err(MaskLoadError::Malformed {
            path: path.to_path_buf(),
            message: "mask has no cells".to_string(),
        });
    }
    Ok(grid)
}

/// Masks registered programmatically.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMaskStore {
    masks: HashMap<MaskRef, MaskGrid>,
}

impl InMemoryMaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mask: impl Into<MaskRef>, grid: MaskGrid) {
        self.masks.insert(mask.into(), grid);
    }

    pub fn with_mask(mut self, mask: impl Into<MaskRef>, grid: MaskGrid) -> Self {
        self.insert(mask, grid);
        self
    }
}

impl MaskStore for InMemoryMaskStore {
    fn load(&self, mask: &MaskRef) -> Result<MaskGrid, MaskLoadError> {
        self.masks
            .get(mask)
            .cloned()
            .ok_or_else(|| MaskLoadError::NotRegistered(mask.path().to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::write_parquet;
    use polars::prelude::*;

    #[test]
    fn test_from_cells_sorts_and_fills() {
        let grid = MaskGrid::from_cells(vec![(31.0, 75.0, 1.0), (30.0, 76.0, 0.0), (30.0, 75.0, 2.0)]);
        assert_eq!(grid.lat(), &[30.0, 31.0]);
        assert_eq!(grid.lon(), &[75.0, 76.0]);
        assert!(grid.is_inside(0, 0));
        assert!(!grid.is_inside(0, 1));
        assert!(grid.is_inside(1, 0));
        assert!(!grid.is_inside(1, 1), "Missing cells are outside");
        assert_eq!(grid.inside_at(31.0, 75.0, 1e-6), Some(true));
        assert_eq!(grid.inside_at(31.5, 75.0, 1e-6), None);
    }

    #[test]
    fn test_new_checks_shape_and_order() {
        assert!(matches!(
            MaskGrid::new(vec![30.0, 31.0], vec![75.0], vec![1.0]),
            Err(MaskLoadError::CellCount {
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            MaskGrid::new(vec![30.0], vec![76.0, 75.0], vec![1.0, 1.0]),
            Err(MaskLoadError::UnsortedAxis("lon"))
        ));
        assert!(MaskGrid::new(vec![30.0], vec![75.0, 76.0], vec![1.0, 0.0]).is_ok());
    }

    #[test]
    fn test_file_store_finds_extension() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut df = df!(
            "latitude" => &[30.0, 30.0],
            "longitude" => &[75.0, 76.0],
            "overlap" => &[1.0, f64::NAN],
        )?;
        write_parquet(&mut df, &dir.path().join("Masks/Test_mask.parquet"))?;

        let store = FileMaskStore::new(dir.path());
        let grid = store.load(&MaskRef::from("Masks/Test_mask"))?;
        assert_eq!(grid.inside_count(), 1);

        let missing = store.load(&MaskRef::from("Masks/Other_mask"));
        assert!(matches!(missing, Err(MaskLoadError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryMaskStore::new().with_mask(
            "Masks/A",
            MaskGrid::new(vec![30.0], vec![75.0], vec![1.0]).unwrap(),
        );
        assert!(store.load(&MaskRef::from("Masks/A")).is_ok());
        assert!(matches!(
            store.load(&MaskRef::from("Masks/B")),
            Err(MaskLoadError::NotRegistered(_))
        ));
    }
}
