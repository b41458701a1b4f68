//! The gridded or point precipitation time series every collector returns.

use crate::fields::error::FieldError;
use crate::location::spec::LatLon;
use crate::time::{Month, TimeIndexed};
use haversine::{distance, Location as HaversineLocation, Units};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::Range;

const COORD_TOLERANCE: f64 = 1e-9;

/// Physical unit of the field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    MmPerDay,
    MmPerMonth,
}

impl Display for Unit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Unit::MmPerDay => write!(f, "mm/day"),
            Unit::MmPerMonth => write!(f, "mm/month"),
        }
    }
}

/// Where a field came from, e.g. `Provenance::new("CRU", Unit::MmPerDay)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub label: String,
    pub unit: Unit,
}

impl Provenance {
    pub fn new(label: impl Into<String>, unit: Unit) -> Self {
        Self {
            label: label.into(),
            unit,
        }
    }
}

/// Spatial support of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Footprint {
    /// A single location; the field is a 1-D time series.
    Point { lat: f64, lon: f64 },
    /// A regular lat/lon grid with ascending axes.
    Grid { lat: Vec<f64>, lon: Vec<f64> },
}

/// Values of one precipitation variable over months and a spatial footprint.
///
/// Values are stored row-major as `[time][lat][lon]`; a point footprint has
/// one value per time step. Missing values are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecipField {
    variable: String,
    time: Vec<Month>,
    footprint: Footprint,
    values: Vec<Option<f64>>,
    provenance: Option<Provenance>,
}

impl PrecipField {
    /// Creates a gridded field.
    ///
    /// # Errors
    ///
    /// * [`FieldError::ShapeMismatch`] if `values.len() != time.len() * lat.len() * lon.len()`.
    /// * [`FieldError::UnsortedTime`] / [`FieldError::UnsortedAxis`] if an axis is not
    ///   strictly increasing.
    pub fn grid(
        variable: impl Into<String>,
        time: Vec<Month>,
        lat: Vec<f64>,
        lon: Vec<f64>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, FieldError> {
        check_time(&time)?;
        check_axis("lat", &lat)?;
        check_axis("lon", &lon)?;
        let expected = time.len() * lat.len() * lon.len();
        if values.len() != expected {
            return Err(FieldError::ShapeMismatch {
                expected,
                found: values.len(),
            });
        }
        Ok(Self {
            variable: variable.into(),
            time,
            footprint: Footprint::Grid { lat, lon },
            values,
            provenance: None,
        })
    }

    /// Creates a point series at `location`.
    pub fn point(
        variable: impl Into<String>,
        time: Vec<Month>,
        location: LatLon,
        values: Vec<Option<f64>>,
    ) -> Result<Self, FieldError> {
        check_time(&time)?;
        if values.len() != time.len() {
            return Err(FieldError::ShapeMismatch {
                expected: time.len(),
                found: values.len(),
            });
        }
        Ok(Self {
            variable: variable.into(),
            time,
            footprint: Footprint::Point {
                lat: location.0,
                lon: location.1,
            },
            values,
            provenance: None,
        })
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn time(&self) -> &[Month] {
        &self.time
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn is_point(&self) -> bool {
        matches!(self.footprint, Footprint::Point { .. })
    }

    /// Latitude coordinates; a single element for a point series.
    pub fn lat(&self) -> &[f64] {
        match &self.footprint {
            Footprint::Point { lat, .. } => std::slice::from_ref(lat),
            Footprint::Grid { lat, .. } => lat,
        }
    }

    /// Longitude coordinates; a single element for a point series.
    pub fn lon(&self) -> &[f64] {
        match &self.footprint {
            Footprint::Point { lon, .. } => std::slice::from_ref(lon),
            Footprint::Grid { lon, .. } => lon,
        }
    }

    /// `(time, lat, lon)` lengths. A point series reports `(time, 1, 1)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.time.len(), self.lat().len(), self.lon().len())
    }

    pub fn value(&self, t: usize, i: usize, j: usize) -> Option<f64> {
        let (_, n_lat, n_lon) = self.shape();
        if i >= n_lat || j >= n_lon {
            return None;
        }
        self.values
            .get(t * n_lat * n_lon + i * n_lon + j)
            .copied()
            .flatten()
    }

    /// Time series of a single grid cell.
    pub fn cell_series(&self, i: usize, j: usize) -> Vec<Option<f64>> {
        (0..self.time.len()).map(|t| self.value(t, i, j)).collect()
    }

    /// Mid-month fractional years, the reported time coordinate.
    pub fn fractional_years(&self) -> Vec<f64> {
        self.time.iter().map(|m| m.mid_month_year()).collect()
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }

    /// Applies `f` to every present value, e.g. a unit conversion factor.
    pub fn map_values(mut self, f: impl Fn(f64) -> f64) -> Self {
        for value in self.values.iter_mut() {
            *value = value.map(&f);
        }
        self
    }

    /// Like [`PrecipField::map_values`], but `f` also receives the month of the value.
    pub fn map_values_by_month(mut self, f: impl Fn(Month, f64) -> f64) -> Self {
        let block = self.values.len() / self.time.len().max(1);
        for (t, month) in self.time.iter().enumerate() {
            for value in &mut self.values[t * block..(t + 1) * block] {
                *value = value.map(|v| f(*month, v));
            }
        }
        self
    }

    /// Keeps the grid cells at the given row and column indices, in that order.
    pub fn subset_cells(&self, lat_idx: &[usize], lon_idx: &[usize]) -> Result<Self, FieldError> {
        let Footprint::Grid { lat, lon } = &self.footprint else {
            return Err(FieldError::PointFootprint("subset_cells"));
        };
        let new_lat: Vec<f64> = lat_idx.iter().map(|&i| lat[i]).collect();
        let new_lon: Vec<f64> = lon_idx.iter().map(|&j| lon[j]).collect();
        let mut values = Vec::with_capacity(self.time.len() * new_lat.len() * new_lon.len());
        for t in 0..self.time.len() {
            for &i in lat_idx {
                for &j in lon_idx {
                    values.push(self.value(t, i, j));
                }
            }
        }
        Self::grid(self.variable.clone(), self.time.clone(), new_lat, new_lon, values)
            .map(|f| self.carry_provenance(f))
    }

    /// Sets every cell for which `keep(row, column)` is false to `None`.
    pub fn mask_cells(mut self, keep: impl Fn(usize, usize) -> bool) -> Self {
        let (_, n_lat, n_lon) = self.shape();
        for (index, value) in self.values.iter_mut().enumerate() {
            let cell = index % (n_lat * n_lon).max(1);
            if !keep(cell / n_lon.max(1), cell % n_lon.max(1)) {
                *value = None;
            }
        }
        self
    }

    /// Nearest-neighbour resampling onto the target axes.
    ///
    /// A target coordinate more than half a grid step outside the source axis
    /// gets `None` for every time step.
    pub fn regrid_nearest(&self, lat: &[f64], lon: &[f64]) -> Result<Self, FieldError> {
        let Footprint::Grid {
            lat: src_lat,
            lon: src_lon,
        } = &self.footprint
        else {
            return Err(FieldError::PointFootprint("regrid_nearest"));
        };
        let lat_map: Vec<Option<usize>> = lat.iter().map(|&y| nearest_index(src_lat, y)).collect();
        let lon_map: Vec<Option<usize>> = lon.iter().map(|&x| nearest_index(src_lon, x)).collect();

        let mut values = Vec::with_capacity(self.time.len() * lat.len() * lon.len());
        for t in 0..self.time.len() {
            for i in &lat_map {
                for j in &lon_map {
                    values.push(match (i, j) {
                        (Some(i), Some(j)) => self.value(t, *i, *j),
                        _ => None,
                    });
                }
            }
        }
        Self::grid(
            self.variable.clone(),
            self.time.clone(),
            lat.to_vec(),
            lon.to_vec(),
            values,
        )
        .map(|f| self.carry_provenance(f))
    }

    /// Collapses the grid to the series of the cell nearest to `at`.
    ///
    /// The returned footprint carries the requested coordinate, not the cell centre.
    /// A point series is its own nearest cell.
    pub fn nearest_point(&self, at: LatLon) -> Result<Self, FieldError> {
        let (i, j) = match &self.footprint {
            Footprint::Point { .. } => (0, 0),
            Footprint::Grid { lat, lon } => {
                if lat.is_empty() {
                    return Err(FieldError::EmptyAxis("lat"));
                }
                if lon.is_empty() {
                    return Err(FieldError::EmptyAxis("lon"));
                }
                match (nearest_index(lat, at.0), nearest_index(lon, at.1)) {
                    (Some(i), Some(j)) => {
                        let km = distance(
                            HaversineLocation {
                                latitude: at.0,
                                longitude: at.1,
                            },
                            HaversineLocation {
                                latitude: lat[i],
                                longitude: lon[j],
                            },
                            Units::Kilometers,
                        );
                        debug!(
                            "Nearest cell to {} is ({}, {}), {:.1} km away",
                            at, lat[i], lon[j], km
                        );
                        (i, j)
                    }
                    _ => {
                        return Err(FieldError::OutsideCoverage {
                            lat: at.0,
                            lon: at.1,
                        })
                    }
                }
            }
        };
        let values = self.cell_series(i, j);
        Self::point(self.variable.clone(), self.time.clone(), at, values)
            .map(|f| self.carry_provenance(f))
    }

    /// Concatenates fields along time. All parts must share variable and footprint.
    pub fn merge_time(mut parts: Vec<PrecipField>) -> Result<Self, FieldError> {
        parts.sort_by_key(|p| p.time.first().copied());
        let mut iter = parts.into_iter();
        let Some(mut merged) = iter.next() else {
            return Err(FieldError::NothingToMerge);
        };
        for part in iter {
            if part.footprint != merged.footprint {
                return Err(FieldError::FootprintMismatch);
            }
            if part.variable != merged.variable {
                return Err(FieldError::VariableMismatch(merged.variable, part.variable));
            }
            if let (Some(last), Some(first)) = (merged.time.last(), part.time.first()) {
                if first <= last {
                    return Err(FieldError::OverlappingTime(*first));
                }
            }
            merged.time.extend(part.time);
            merged.values.extend(part.values);
        }
        Ok(merged)
    }

    fn carry_provenance(&self, field: Self) -> Self {
        match &self.provenance {
            Some(provenance) => field.with_provenance(provenance.clone()),
            None => field,
        }
    }
}

impl TimeIndexed for PrecipField {
    fn time_months(&self) -> &[Month] {
        &self.time
    }

    fn select_time(&self, range: Range<usize>) -> Self {
        let (_, n_lat, n_lon) = self.shape();
        let block = n_lat * n_lon;
        Self {
            variable: self.variable.clone(),
            time: self.time[range.clone()].to_vec(),
            footprint: self.footprint.clone(),
            values: self.values[range.start * block..range.end * block].to_vec(),
            provenance: self.provenance.clone(),
        }
    }
}

/// Evenly spaced values in `[start, stop)`, like a numeric range with a float step.
pub fn regular_axis(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || stop <= start {
        return Vec::new();
    }
    let n = ((stop - start) / step - COORD_TOLERANCE).ceil() as usize;
    (0..n).map(|i| start + i as f64 * step).collect()
}

/// Index of the axis value closest to `x`, or `None` when `x` is more than
/// half a step beyond either end. A single-value axis has no step and only
/// matches its own value.
pub(crate) fn nearest_index(axis: &[f64], x: f64) -> Option<usize> {
    let n = axis.len();
    match n {
        0 => return None,
        1 => return ((x - axis[0]).abs() <= COORD_TOLERANCE).then_some(0),
        _ => {}
    }
    let low = axis[0] - (axis[1] - axis[0]) / 2.0 - COORD_TOLERANCE;
    let high = axis[n - 1] + (axis[n - 1] - axis[n - 2]) / 2.0 + COORD_TOLERANCE;
    if !(low..=high).contains(&x) {
        return None;
    }
    let upper = axis.partition_point(|&a| a < x);
    if upper == 0 {
        return Some(0);
    }
    if upper == n {
        return Some(n - 1);
    }
    if (x - axis[upper - 1]) <= (axis[upper] - x) {
        Some(upper - 1)
    } else {
        Some(upper)
    }
}

/// Index of the axis value equal to `x` within a small tolerance.
pub(crate) fn exact_index(axis: &[f64], x: f64, tolerance: f64) -> Option<usize> {
    let upper = axis.partition_point(|&a| a < x - tolerance);
    axis.get(upper)
        .filter(|&&a| (a - x).abs() <= tolerance)
        .map(|_| upper)
}

fn check_time(time: &[Month]) -> Result<(), FieldError> {
    for pair in time.windows(2) {
        if pair[1] <= pair[0] {
            return Err(FieldError::UnsortedTime {
                previous: pair[0],
                next: pair[1],
            });
        }
    }
    Ok(())
}

fn check_axis(name: &'static str, axis: &[f64]) -> Result<(), FieldError> {
    if axis.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(FieldError::UnsortedAxis(name));
    }
    Ok(())
}
