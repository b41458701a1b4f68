//! Resolves [`LocationSpec`]s to extents, masks and archive partitions, and
//! restricts fields to them.

use crate::fields::field::exact_index;
use crate::fields::{FieldError, Footprint, PrecipField};
use crate::location::catalogue::{BasinCatalogue, Extent};
use crate::location::error::LocationError;
use crate::location::mask::{MaskGrid, MaskRef, MaskStore};
use crate::location::spec::LocationSpec;
use log::debug;

const GRID_TOLERANCE: f64 = 1e-6;

/// Maps location identifiers to basin metadata using a [`BasinCatalogue`] and a [`MaskStore`].
///
/// # Examples
///
/// ```
/// use precip_loader::{BasinCatalogue, InMemoryMaskStore, LocationResolver, LocationSpec};
///
/// let resolver = LocationResolver::new(BasinCatalogue::builtin(), InMemoryMaskStore::new());
/// let extent = resolver.resolve_extent(&LocationSpec::from("indus")).unwrap();
/// assert_eq!(extent.as_array(), [40.0, 65.0, 25.0, 85.0]);
/// assert!(resolver.resolve_extent(&LocationSpec::from("nile")).is_err());
/// ```
pub struct LocationResolver {
    catalogue: BasinCatalogue,
    masks: Box<dyn MaskStore + Send + Sync>,
}

impl LocationResolver {
    pub fn new(catalogue: BasinCatalogue, masks: impl MaskStore + Send + Sync + 'static) -> Self {
        Self {
            catalogue,
            masks: Box::new(masks),
        }
    }

    pub fn with_boxed_store(
        catalogue: BasinCatalogue,
        masks: Box<dyn MaskStore + Send + Sync>,
    ) -> Self {
        Self { catalogue, masks }
    }

    pub fn catalogue(&self) -> &BasinCatalogue {
        &self.catalogue
    }

    /// Bounding box of a named basin.
    ///
    /// # Errors
    ///
    /// * [`LocationError::UnknownLocation`] if the name is not in the catalogue.
    /// * [`LocationError::UnsupportedLocationKind`] for coordinate input.
    pub fn resolve_extent(&self, location: &LocationSpec) -> Result<Extent, LocationError> {
        match location {
            LocationSpec::Named(name) => Ok(self.catalogue.lookup(name)?.extent),
            LocationSpec::Coordinate(point) => Err(LocationError::UnsupportedLocationKind {
                operation: "resolve_extent",
                location: *point,
            }),
        }
    }

    /// Mask reference of an irregular basin; `None` for extent-only basins and coordinates.
    ///
    /// This is a lookup only, the mask itself is loaded by [`LocationResolver::select`].
    pub fn resolve_mask(&self, location: &LocationSpec) -> Result<Option<MaskRef>, LocationError> {
        match location {
            LocationSpec::Named(name) => Ok(self.catalogue.lookup(name)?.mask.clone()),
            LocationSpec::Coordinate(_) => Ok(None),
        }
    }

    /// Archive partition key of a named basin, e.g. `"indus"` for `"beas"`.
    ///
    /// Coordinates have no partition and fail with [`LocationError::UnsupportedLocationKind`];
    /// use [`BasinCatalogue::group_containing`] to search by coordinate instead.
    pub fn basin_group(&self, location: &LocationSpec) -> Result<String, LocationError> {
        match location {
            LocationSpec::Named(name) => Ok(self.catalogue.lookup(name)?.basin_group.clone()),
            LocationSpec::Coordinate(point) => Err(LocationError::UnsupportedLocationKind {
                operation: "basin_group",
                location: *point,
            }),
        }
    }

    /// Restricts a field to a location.
    ///
    /// * A coordinate collapses the field to the nearest cell, keeping the
    ///   requested coordinate on the returned point footprint.
    /// * A named basin without mask returns the field unchanged.
    /// * A named basin with mask loads the mask and keeps only cells inside
    ///   it, dropping rows and columns that fall entirely outside. When the
    ///   field grid is not a subset of the mask grid, the field is first
    ///   resampled onto the mask grid by nearest neighbour.
    ///
    /// # Errors
    ///
    /// * [`LocationError::UnknownLocation`] for names missing from the catalogue.
    /// * [`LocationError::MaskLoad`] when the mask cannot be loaded. There is no
    ///   unmasked fallback.
    /// * [`LocationError::GridAlignment`] when field and mask (or the requested
    ///   coordinate) do not overlap.
    pub fn select(
        &self,
        field: &PrecipField,
        location: &LocationSpec,
    ) -> Result<PrecipField, LocationError> {
        match location {
            LocationSpec::Coordinate(point) => {
                debug!("Selecting nearest cell to {}", point);
                field.nearest_point(*point).map_err(|e| match e {
                    FieldError::OutsideCoverage { .. } => LocationError::GridAlignment(e.to_string()),
                    other => other.into(),
                })
            }
            LocationSpec::Named(name) => match self.catalogue.lookup(name)?.mask.as_ref() {
                None => {
                    debug!("Basin '{}' has no mask, field returned unchanged", name);
                    Ok(field.clone())
                }
                Some(mask_ref) => {
                    let mask = self.masks.load(mask_ref)?;
                    debug!("Applying mask {} for basin '{}'", mask_ref, name);
                    apply_mask(field, &mask)
                }
            },
        }
    }

    /// Keeps only grid cells inside `extent` (inclusive).
    pub fn crop(&self, field: &PrecipField, extent: &Extent) -> Result<PrecipField, LocationError> {
        crop(field, extent)
    }
}

/// Keeps only grid cells inside `extent` (inclusive). A point series is
/// returned unchanged when the point lies inside the extent.
pub fn crop(field: &PrecipField, extent: &Extent) -> Result<PrecipField, LocationError> {
    match field.footprint() {
        Footprint::Point { lat, lon } => {
            if extent.contains_lat(*lat) && extent.contains_lon(*lon) {
                Ok(field.clone())
            } else {
                Err(LocationError::GridAlignment(format!(
                    "point ({}, {}) lies outside extent {}",
                    lat, lon, extent
                )))
            }
        }
        Footprint::Grid { lat, lon } => {
            let lat_idx: Vec<usize> = (0..lat.len())
                .filter(|&i| extent.contains_lat(lat[i]))
                .collect();
            let lon_idx: Vec<usize> = (0..lon.len())
                .filter(|&j| extent.contains_lon(lon[j]))
                .collect();
            Ok(field.subset_cells(&lat_idx, &lon_idx)?)
        }
    }
}

/// Intersects a gridded field with a mask grid.
///
/// Cells failing the mask become `None`; rows and columns without any cell
/// inside the mask are dropped.
pub fn apply_mask(field: &PrecipField, mask: &MaskGrid) -> Result<PrecipField, LocationError> {
    let (field_lat, field_lon) = match field.footprint() {
        Footprint::Grid { lat, lon } => (lat, lon),
        Footprint::Point { .. } => {
            return Err(LocationError::GridAlignment(
                "a point series cannot be masked".to_string(),
            ))
        }
    };

    let on_mask_grid = field_lat
        .iter()
        .all(|y| exact_index(mask.lat(), *y, GRID_TOLERANCE).is_some())
        && field_lon
            .iter()
            .all(|x| exact_index(mask.lon(), *x, GRID_TOLERANCE).is_some());

    let (working, inside): (PrecipField, Vec<Vec<bool>>) = if on_mask_grid {
        let inside = field_lat
            .iter()
            .map(|y| {
                field_lon
                    .iter()
                    .map(|x| mask.inside_at(*y, *x, GRID_TOLERANCE).unwrap_or(false))
                    .collect()
            })
            .collect();
        (field.clone(), inside)
    } else {
        if !ranges_overlap(field_lat, mask.lat()) || !ranges_overlap(field_lon, mask.lon()) {
            return Err(LocationError::GridAlignment(
                "field and mask coordinate ranges are disjoint".to_string(),
            ));
        }
        debug!(
            "Field grid ({}x{}) is not on the mask grid, resampling onto mask ({}x{})",
            field_lat.len(),
            field_lon.len(),
            mask.lat().len(),
            mask.lon().len()
        );
        let regridded = field.regrid_nearest(mask.lat(), mask.lon())?;
        let inside = (0..mask.lat().len())
            .map(|i| (0..mask.lon().len()).map(|j| mask.is_inside(i, j)).collect())
            .collect();
        (regridded, inside)
    };

    let lat_idx: Vec<usize> = (0..inside.len())
        .filter(|&i| inside[i].iter().any(|v| *v))
        .collect();
    let lon_idx: Vec<usize> = (0..inside.first().map_or(0, |row| row.len()))
        .filter(|&j| inside.iter().any(|row| row[j]))
        .collect();
    if lat_idx.is_empty() || lon_idx.is_empty() {
        return Err(LocationError::GridAlignment(
            "no field cell lies inside the mask".to_string(),
        ));
    }

    let subset = working.subset_cells(&lat_idx, &lon_idx)?;
    Ok(subset.mask_cells(|i, j| inside[lat_idx[i]][lon_idx[j]]))
}

fn ranges_overlap(a: &[f64], b: &[f64]) -> bool {
    match (a.first(), a.last(), b.first(), b.last()) {
        (Some(a_min), Some(a_max), Some(b_min), Some(b_max)) => {
            a_min <= b_max && b_min <= a_max
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::mask::InMemoryMaskStore;
    use crate::location::spec::LatLon;
    use crate::time::Month;

    fn field(lat: Vec<f64>, lon: Vec<f64>) -> PrecipField {
        let n = 2 * lat.len() * lon.len();
        let values = (0..n).map(|v| Some(v as f64)).collect();
        PrecipField::grid("tp", vec![Month::new(1, 2000), Month::new(2, 2000)], lat, lon, values)
            .unwrap()
    }

    fn resolver_with(mask: MaskGrid) -> LocationResolver {
        let catalogue = BasinCatalogue::builtin();
        let mask_ref = catalogue.lookup("uib").unwrap().mask.clone().unwrap();
        LocationResolver::new(catalogue, InMemoryMaskStore::new().with_mask(mask_ref, mask))
    }

    #[test]
    fn test_resolve_extent() -> Result<(), LocationError> {
        let resolver = resolver_with(MaskGrid::new(vec![], vec![], vec![]).unwrap());
        let extent = resolver.resolve_extent(&"indus".into())?;
        assert_eq!(extent.as_array(), [40.0, 65.0, 25.0, 85.0]);
        assert!(matches!(
            resolver.resolve_extent(&"nile".into()),
            Err(LocationError::UnknownLocation(_))
        ));
        assert!(matches!(
            resolver.resolve_extent(&LatLon(34.5, 76.2).into()),
            Err(LocationError::UnsupportedLocationKind { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_resolve_mask_and_basin_group() -> Result<(), LocationError> {
        let resolver = resolver_with(MaskGrid::new(vec![], vec![], vec![]).unwrap());
        assert!(resolver.resolve_mask(&"beas".into())?.is_some());
        assert!(resolver.resolve_mask(&"indus".into())?.is_none());
        assert!(resolver.resolve_mask(&LatLon(31.0, 77.0).into())?.is_none());
        assert_eq!(resolver.basin_group(&"beas_sutlej".into())?, "indus");
        assert_eq!(resolver.basin_group(&"europe".into())?, "value");
        assert!(matches!(
            resolver.basin_group(&LatLon(31.0, 77.0).into()),
            Err(LocationError::UnsupportedLocationKind { operation: "basin_group", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_mask_keeps_only_inside_column() -> Result<(), LocationError> {
        let mask = MaskGrid::new(vec![30.0], vec![75.0, 76.0], vec![1.0, 0.0]).unwrap();
        let resolver = resolver_with(mask);
        let selected = resolver.select(&field(vec![30.0], vec![75.0, 76.0]), &"uib".into())?;
        assert_eq!(selected.lat(), &[30.0]);
        assert_eq!(selected.lon(), &[75.0], "The lon = 76 column is dropped");
        assert_eq!(selected.values(), &[Some(0.0), Some(2.0)]);
        Ok(())
    }

    #[test]
    fn test_mask_selection_is_idempotent() -> Result<(), LocationError> {
        let mask = MaskGrid::new(
            vec![30.0, 30.5, 31.0],
            vec![75.0, 75.5, 76.0],
            vec![0.0, 1.0, 0.0, 1.0, 1.0, f64::NAN, 0.0, 0.0, 0.0],
        )
        .unwrap();
        let resolver = resolver_with(mask);
        let location = LocationSpec::from("uib");
        let original = field(vec![30.0, 30.5, 31.0], vec![75.0, 75.5, 76.0]);
        let once = resolver.select(&original, &location)?;
        let twice = resolver.select(&once, &location)?;
        assert_eq!(once, twice);
        assert_eq!(once.lat(), &[30.0, 30.5]);
        assert_eq!(once.lon(), &[75.0, 75.5]);
        assert_eq!(once.value(0, 0, 0), None, "(30, 75) is outside the mask");
        Ok(())
    }

    #[test]
    fn test_off_grid_field_is_resampled_onto_mask() -> Result<(), LocationError> {
        let mask = MaskGrid::new(vec![30.1, 30.6], vec![75.1], vec![1.0, 1.0]).unwrap();
        let resolver = resolver_with(mask);
        let original = field(vec![30.0, 30.5], vec![75.0, 75.5]);
        let selected = resolver.select(&original, &"uib".into())?;
        assert_eq!(selected.lat(), &[30.1, 30.6]);
        assert_eq!(selected.lon(), &[75.1]);
        assert_eq!(selected.cell_series(1, 0), vec![Some(2.0), Some(6.0)]);
        Ok(())
    }

    #[test]
    fn test_disjoint_mask_is_grid_alignment_error() {
        let mask = MaskGrid::new(vec![50.0], vec![10.0], vec![1.0]).unwrap();
        let resolver = resolver_with(mask);
        let result = resolver.select(&field(vec![30.0], vec![75.0]), &"uib".into());
        assert!(matches!(result, Err(LocationError::GridAlignment(_))));
    }

    #[test]
    fn test_missing_mask_fails_without_fallback() {
        let resolver = LocationResolver::new(BasinCatalogue::builtin(), InMemoryMaskStore::new());
        let result = resolver.select(&field(vec![30.0], vec![75.0]), &"gilgit".into());
        assert!(matches!(result, Err(LocationError::MaskLoad(_))));
    }

    #[test]
    fn test_coordinate_gives_point_regardless_of_masks() -> Result<(), LocationError> {
        let resolver = LocationResolver::new(BasinCatalogue::builtin(), InMemoryMaskStore::new());
        let selected = resolver.select(
            &field(vec![34.0, 34.5, 35.0], vec![76.0, 76.5]),
            &LatLon(34.5, 76.2).into(),
        )?;
        assert_eq!(
            selected.footprint(),
            &Footprint::Point {
                lat: 34.5,
                lon: 76.2
            }
        );
        assert_eq!(selected.values(), &[Some(2.0), Some(8.0)]);
        Ok(())
    }

    #[test]
    fn test_coordinate_off_a_single_cell_grid_is_rejected() -> Result<(), LocationError> {
        let resolver = LocationResolver::new(BasinCatalogue::builtin(), InMemoryMaskStore::new());
        let single = field(vec![30.0], vec![75.0]);
        assert_eq!(resolver.select(&single, &LatLon(30.0, 75.0).into())?.values().len(), 2);

        let err = resolver
            .select(&single, &LatLon(-60.0, 150.0).into())
            .unwrap_err();
        assert!(matches!(err, LocationError::GridAlignment(_)));
        assert!(
            !err.to_string().contains("mask"),
            "Coordinate errors must not mention masks: {}",
            err
        );
        Ok(())
    }

    #[test]
    fn test_unmasked_basin_returns_field_unchanged() -> Result<(), LocationError> {
        let resolver = LocationResolver::new(BasinCatalogue::builtin(), InMemoryMaskStore::new());
        let original = field(vec![30.0], vec![75.0]);
        assert_eq!(resolver.select(&original, &"indus".into())?, original);
        Ok(())
    }

    #[test]
    fn test_crop_then_select_stays_within_extent() -> Result<(), LocationError> {
        let mask = MaskGrid::from_cells(
            [(24.75, 75.0, 1.0), (25.0, 75.0, 1.0), (25.0, 85.25, 1.0), (26.0, 80.0, 1.0)],
        );
        let resolver = resolver_with(mask);
        let location = LocationSpec::from("uib");
        let extent = resolver.resolve_extent(&location)?;
        let original = field(vec![24.75, 25.0, 26.0], vec![75.0, 80.0, 85.25]);
        let cropped = resolver.crop(&original, &extent)?;
        assert_eq!(cropped.lat(), &[25.0, 26.0]);
        assert_eq!(cropped.lon(), &[75.0, 80.0]);
        let selected = resolver.select(&cropped, &location)?;
        for &lat in selected.lat() {
            for &lon in selected.lon() {
                assert!(extent.contains(LatLon(lat, lon)), "({}, {}) escaped the extent", lat, lon);
            }
        }
        Ok(())
    }
}
