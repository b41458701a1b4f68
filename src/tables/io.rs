use crate::location::catalogue::Extent;
use crate::tables::columns::{resolve_name, LAT, LON};
use crate::tables::error::TableError;
use log::debug;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// On-disk encoding of a source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Parquet,
    Delimited { separator: u8 },
}

impl TableFormat {
    /// Picks the format from the file extension: `.parquet`, or `.csv`/`.txt` (comma separated).
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("parquet") => Ok(TableFormat::Parquet),
            Some("csv") | Some("txt") => Ok(TableFormat::Delimited { separator: b',' }),
            _ => Err(TableError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Lazily scans a table, inferring the format from the extension.
pub fn scan_table(path: &Path) -> Result<LazyFrame, TableError> {
    scan_table_as(path, TableFormat::from_path(path)?)
}

pub fn scan_table_as(path: &Path, format: TableFormat) -> Result<LazyFrame, TableError> {
    if !path.exists() {
        return Err(TableError::FileNotFound(path.to_path_buf()));
    }
    match format {
        TableFormat::Parquet => LazyFrame::scan_parquet(path, Default::default())
            .map_err(|e| TableError::Read(path.to_path_buf(), e)),
        TableFormat::Delimited { separator } => LazyCsvReader::new(path)
            .with_has_header(true)
            .with_separator(separator)
            .with_infer_schema_length(Some(10_000))
            .finish()
            .map_err(|e| TableError::Read(path.to_path_buf(), e)),
    }
}

/// Reads a whole table into memory.
pub fn read_table(path: &Path) -> Result<DataFrame, TableError> {
    read_table_as(path, TableFormat::from_path(path)?)
}

pub fn read_table_as(path: &Path, format: TableFormat) -> Result<DataFrame, TableError> {
    if !path.exists() {
        return Err(TableError::FileNotFound(path.to_path_buf()));
    }
    match format {
        TableFormat::Parquet => scan_table_as(path, format)?
            .collect()
            .map_err(|e| TableError::Read(path.to_path_buf(), e)),
        TableFormat::Delimited { separator } => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10_000))
            .with_parse_options(CsvParseOptions::default().with_separator(separator))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(|e| TableError::Read(path.to_path_buf(), e))?
            .finish()
            .map_err(|e| TableError::Read(path.to_path_buf(), e)),
    }
}

/// Reads only the rows whose `lat`/`lon` fall inside `extent` (inclusive).
///
/// The bounds are pushed down into the scan so large gridded tables are
/// never fully materialized.
pub fn read_table_in_extent(path: &Path, extent: &Extent) -> Result<DataFrame, TableError> {
    let mut lf = scan_table(path)?;
    let schema = lf
        .collect_schema()
        .map_err(|e| TableError::Read(path.to_path_buf(), e))?;
    let lat = resolve_name(|name| schema.contains(name), LAT)?;
    let lon = resolve_name(|name| schema.contains(name), LON)?;
    debug!("Scanning {:?} within {}", path, extent);

    let predicate = col(lat)
        .cast(DataType::Float64)
        .gt_eq(lit(extent.south))
        .and(col(lat).cast(DataType::Float64).lt_eq(lit(extent.north)))
        .and(col(lon).cast(DataType::Float64).gt_eq(lit(extent.west)))
        .and(col(lon).cast(DataType::Float64).lt_eq(lit(extent.east)));
    lf.filter(predicate)
        .collect()
        .map_err(|e| TableError::Read(path.to_path_buf(), e))
}

/// Writes a DataFrame as Snappy-compressed Parquet, creating parent directories.
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), TableError> {
    let path_buf: PathBuf = path.to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TableError::WriteIo(path_buf.clone(), e))?;
    }
    let file = File::create(&path_buf).map_err(|e| TableError::WriteIo(path_buf.clone(), e))?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(df)
        .map_err(|e| TableError::Write(path_buf, e))?;
    Ok(())
}

/// Writes a DataFrame as CSV with a header row, creating parent directories.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), TableError> {
    let path_buf: PathBuf = path.to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TableError::WriteIo(path_buf.clone(), e))?;
    }
    let mut file =
        File::create(&path_buf).map_err(|e| TableError::WriteIo(path_buf.clone(), e))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| TableError::Write(path_buf, e))?;
    Ok(())
}
