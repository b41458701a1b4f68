use crate::tables::error::TableError;
use crate::time::{EpochReference, RawTime};
use polars::prelude::*;

pub const LAT: &[&str] = &["lat", "latitude"];
pub const LON: &[&str] = &["lon", "longitude"];
pub const TIME: &[&str] = &["time", "date", "Date", "YYYYMMDD"];
pub const TP: &[&str] = &["tp", "tp_0001"];

/// First alias for which `exists` holds.
pub(crate) fn resolve_name(
    exists: impl Fn(&str) -> bool,
    aliases: &[&'static str],
) -> Result<&'static str, TableError> {
    aliases
        .iter()
        .copied()
        .find(|name| exists(name))
        .ok_or_else(|| TableError::MissingColumn(aliases.iter().map(|a| a.to_string()).collect()))
}

/// Retrieves the first column present under any of `aliases`.
pub fn get_column<'a>(df: &'a DataFrame, aliases: &[&'static str]) -> Result<&'a Column, TableError> {
    let name = resolve_name(|name| df.get_column_index(name).is_some(), aliases)?;
    Ok(df.column(name)?)
}

/// Column values as floats; non-numeric entries become `None`, as do NaNs.
pub fn float_values(column: &Column) -> Result<Vec<Option<f64>>, TableError> {
    let casted = column.cast(&DataType::Float64)?;
    Ok(casted
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

pub fn string_values(column: &Column) -> Result<Vec<Option<String>>, TableError> {
    let casted = column.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Time column values as raw timestamps.
///
/// With `units` the column is read as a numeric epoch counter; otherwise
/// values are taken from their text form, which covers date, datetime,
/// `YYYYMMDD` integer and fractional-year columns alike.
pub fn time_values(
    column: &Column,
    units: Option<EpochReference>,
) -> Result<Vec<Option<RawTime>>, TableError> {
    match units {
        Some(reference) => Ok(float_values(column)?
            .into_iter()
            .map(|v| v.map(|value| RawTime::Epoch { value, reference }))
            .collect()),
        None => Ok(string_values(column)?
            .into_iter()
            .map(|v| v.map(RawTime::Text))
            .collect()),
    }
}
