pub mod collectors;
mod error;
pub mod fetch;
pub mod fields;
pub mod location;
mod precip;
pub mod tables;
pub mod time;
mod utils;

pub use error::PrecipError;
pub use precip::*;

pub use collectors::aphrodite::AphroditeClient;
pub use collectors::cordex::CordexClient;
pub use collectors::cru::CruClient;
pub use collectors::era5::Era5Client;
pub use collectors::gauges::GaugeClient;
pub use collectors::value::ValueClient;
pub use collectors::wrf::{WrfClient, WrfRun};
pub use collectors::{StationSeries, StationSite};

pub use fetch::{
    ArchiveFetcher, ArchiveQuery, CachedFetcher, HttpArchiveFetcher, OfflineFetcher,
    RetryPolicy, RetryingFetcher,
};
pub use fields::{Footprint, PrecipField, Provenance, Unit};
pub use location::{
    BasinCatalogue, BasinEntry, Extent, FileMaskStore, InMemoryMaskStore, LatLon,
    LocationResolver, LocationSpec, MaskGrid, MaskRef, MaskStore,
};
pub use time::{CanonicalTimeAxis, Month, RawTime};

pub use collectors::error::CollectError;
pub use fetch::error::FetchError;
pub use fields::error::FieldError;
pub use location::error::{LocationError, MaskLoadError};
pub use tables::error::TableError;
pub use time::error::TimeError;
