//! NetCDF basin masks: an `overlap(lat, lon)` variable over 1-D coordinate variables.

use crate::location::error::MaskLoadError;
use crate::location::mask::MaskGrid;
use std::path::Path;

const LAT_NAMES: &[&str] = &["latitude", "lat"];
const LON_NAMES: &[&str] = &["longitude", "lon"];

fn read_1d(file: &netcdf::File, aliases: &[&str], path: &Path) -> Result<Vec<f64>, MaskLoadError> {
    for &alias in aliases {
        if let Some(var) = file.variable(alias) {
            return var
                .get_values::<f64, _>(..)
                .map_err(|e| MaskLoadError::Netcdf(path.to_path_buf(), e));
        }
    }
    Err(MaskLoadError::Malformed {
        path: path.to_path_buf(),
        message: format!("none of the coordinate variables {:?} found", aliases),
    })
}

pub(crate) fn read_netcdf_mask(path: &Path) -> Result<MaskGrid, MaskLoadError> {
    let file = netcdf::open(path).map_err(|e| MaskLoadError::Netcdf(path.to_path_buf(), e))?;
    let lat = read_1d(&file, LAT_NAMES, path)?;
    let lon = read_1d(&file, LON_NAMES, path)?;

    let overlap = file
        .variable("overlap")
        .ok_or_else(|| MaskLoadError::Malformed {
            path: path.to_path_buf(),
            message: "missing 'overlap' variable".to_string(),
        })?;
    let dims = overlap.dimensions();
    if dims.len() != 2 || dims[0].len() != lat.len() || dims[1].len() != lon.len() {
        return Err(MaskLoadError::Malformed {
            path: path.to_path_buf(),
            message: format!(
                "'overlap' must be shaped (lat={}, lon={})",
                lat.len(),
                lon.len()
            ),
        });
    }
    let values = overlap
        .get_values::<f64, _>(..)
        .map_err(|e| MaskLoadError::Netcdf(path.to_path_buf(), e))?;

    // Axes may be stored descending; from_cells re-sorts them.
    let cells = lat.iter().enumerate().flat_map(|(i, y)| {
        let values = &values;
        let n_lon = lon.len();
        lon.iter()
            .enumerate()
            .map(move |(j, x)| (*y, *x, values[i * n_lon + j]))
    });
    Ok(MaskGrid::from_cells(cells))
}
