//! Conversion between long-format tables (`time`, `lat`, `lon`, value) and [`PrecipField`]s.

use crate::fields::PrecipField;
use crate::tables::columns::{float_values, get_column, time_values, LAT, LON, TIME};
use crate::tables::error::TableError;
use crate::time::{Aggregation, CanonicalTimeAxis, EpochReference, Month, TimeError};
use ordered_float::OrderedFloat;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// How to read a gridded long-format table.
#[derive(Debug, Clone)]
pub struct TableLayout {
    /// Accepted names of the value column, first match wins.
    pub value_aliases: &'static [&'static str],
    /// Name given to the variable of the resulting field.
    pub variable: &'static str,
    /// Reduction for rows that share a month and cell (e.g. daily rows).
    pub aggregation: Aggregation,
    /// Units of a numeric epoch time column; `None` for dates and strings.
    pub time_units: Option<EpochReference>,
}

impl TableLayout {
    pub fn new(value_aliases: &'static [&'static str], variable: &'static str) -> Self {
        Self {
            value_aliases,
            variable,
            aggregation: Aggregation::Mean,
            time_units: None,
        }
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_time_units(mut self, time_units: EpochReference) -> Self {
        self.time_units = Some(time_units);
        self
    }
}

/// Builds a gridded field from a long-format table.
///
/// The lat/lon axes are the sorted distinct coordinates of the table, the
/// time axis covers every month between the first and the last row without
/// gaps. Rows that fall in the same month and cell are combined with the
/// layout's aggregation; cells without rows are `None`.
pub fn field_from_frame(df: &DataFrame, layout: &TableLayout) -> Result<PrecipField, TableError> {
    let lat = float_values(get_column(df, LAT)?)?;
    let lon = float_values(get_column(df, LON)?)?;
    let time = time_values(get_column(df, TIME)?, layout.time_units)?;
    let values = float_values(get_column(df, layout.value_aliases)?)?;

    let mut rows = Vec::with_capacity(df.height());
    for (((lat, lon), time), value) in lat.into_iter().zip(lon).zip(time).zip(values) {
        let (Some(lat), Some(lon), Some(time)) = (lat, lon, time) else {
            continue;
        };
        rows.push((time.month()?, lat, lon, value));
    }

    let lat_axis: Vec<f64> = rows
        .iter()
        .map(|r| OrderedFloat(r.1))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|v| v.0)
        .collect();
    let lon_axis: Vec<f64> = rows
        .iter()
        .map(|r| OrderedFloat(r.2))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|v| v.0)
        .collect();
    let lat_index: BTreeMap<OrderedFloat<f64>, usize> = lat_axis
        .iter()
        .enumerate()
        .map(|(i, v)| (OrderedFloat(*v), i))
        .collect();
    let lon_index: BTreeMap<OrderedFloat<f64>, usize> = lon_axis
        .iter()
        .enumerate()
        .map(|(i, v)| (OrderedFloat(*v), i))
        .collect();

    let months = match (
        rows.iter().map(|r| r.0).min(),
        rows.iter().map(|r| r.0).max(),
    ) {
        (Some(first), Some(last)) => CanonicalTimeAxis::spanning(first, last)?.into_months(),
        _ => Vec::new(),
    };
    let first_index = months.first().map(|m| m.index()).unwrap_or_default();

    let cells = lat_axis.len() * lon_axis.len();
    let mut sums = vec![0.0; months.len() * cells];
    let mut counts = vec![0usize; months.len() * cells];
    for (month, lat, lon, value) in rows {
        let Some(value) = value else { continue };
        let t = (month.index() - first_index) as usize;
        let (Some(i), Some(j)) = (
            lat_index.get(&OrderedFloat(lat)),
            lon_index.get(&OrderedFloat(lon)),
        ) else {
            continue;
        };
        let k = t * cells + i * lon_axis.len() + j;
        sums[k] += value;
        counts[k] += 1;
    }
    let values = sums
        .into_iter()
        .zip(counts)
        .map(|(sum, count)| layout.aggregation.finish(sum, count))
        .collect();

    Ok(PrecipField::grid(
        layout.variable,
        months,
        lat_axis,
        lon_axis,
        values,
    )?)
}

/// Flattens a field into a long-format table with a month-start `time` column.
///
/// Point fields produce one row per month with constant `lat`/`lon`.
pub fn field_to_frame(field: &PrecipField) -> Result<DataFrame, TableError> {
    let (n_time, n_lat, n_lon) = field.shape();
    let mut time = Vec::with_capacity(field.values().len());
    let mut lat = Vec::with_capacity(field.values().len());
    let mut lon = Vec::with_capacity(field.values().len());
    for month in field.time() {
        let stamp = month_start_string(*month)?;
        for i in 0..n_lat {
            for j in 0..n_lon {
                time.push(stamp.clone());
                lat.push(field.lat()[i]);
                lon.push(field.lon()[j]);
            }
        }
    }
    debug_assert_eq!(time.len(), n_time * n_lat * n_lon);

    let df = DataFrame::new(vec![
        Column::new("time".into(), time),
        Column::new("lat".into(), lat),
        Column::new("lon".into(), lon),
        Column::new(field.variable().into(), field.values().to_vec()),
    ])?;
    Ok(df)
}

fn month_start_string(month: Month) -> Result<String, TimeError> {
    month
        .start()
        .map(|start| start.format("%Y-%m-%d").to_string())
        .ok_or_else(|| TimeError::UnparseableTimestamp(month.to_string()))
}
