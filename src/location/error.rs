use crate::fields::FieldError;
use crate::location::spec::LatLon;
use crate::tables::TableError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location '{0}' is not in the basin catalogue")]
    UnknownLocation(String),

    #[error("Operation '{operation}' does not accept coordinate location {location}")]
    UnsupportedLocationKind {
        operation: &'static str,
        location: LatLon,
    },

    #[error("Failed to load basin mask")]
    MaskLoad(#[from] MaskLoadError),

    #[error("Field grid cannot be aligned with the requested location: {0}")]
    GridAlignment(String),

    #[error("Invalid extent [{north}, {west}, {south}, {east}]: north must exceed south and east must exceed west")]
    InvalidExtent {
        north: f64,
        west: f64,
        south: f64,
        east: f64,
    },

    #[error("No catalogue basin group contains {0}")]
    NoBasinContains(LatLon),

    #[error("Failed to read basin catalogue '{0}'")]
    CatalogueRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse basin catalogue")]
    CatalogueParse(#[from] serde_json::Error),

    #[error(transparent)]
    Field(#[from] FieldError),
}

#[derive(Debug, Error)]
pub enum MaskLoadError {
    #[error("Mask file '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("Failed to read mask table '{0}'")]
    Table(PathBuf, #[source] TableError),

    #[cfg(feature = "netcdf")]
    #[error("Failed to read NetCDF mask '{0}'")]
    Netcdf(PathBuf, #[source] netcdf::Error),

    #[error("Mask '{path}' is malformed: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Mask grid has {found} cells, expected {expected}")]
    CellCount { expected: usize, found: usize },

    #[error("Mask {0} axis must be strictly ascending")]
    UnsortedAxis(&'static str),

    #[error("Unsupported mask format for '{0}'")]
    UnsupportedFormat(PathBuf),

    #[error("No mask registered under '{0}'")]
    NotRegistered(PathBuf),
}
