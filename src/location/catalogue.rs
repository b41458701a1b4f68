//! The basin catalogue: named locations, their archive partition, bounding box and optional mask.

use crate::location::error::LocationError;
use crate::location::mask::MaskRef;
use crate::location::spec::LatLon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// A rectangular lat/lon box in degrees, ordered `[north, west, south, east]`.
///
/// Invariant: `north > south` and `east > west`. Boxes crossing the
/// antimeridian are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    pub north: f64,
    pub west: f64,
    pub south: f64,
    pub east: f64,
}

impl Extent {
    pub fn new(north: f64, west: f64, south: f64, east: f64) -> Result<Self, LocationError> {
        if !(north > south && east > west) {
            return Err(LocationError::InvalidExtent {
                north,
                west,
                south,
                east,
            });
        }
        Ok(Self {
            north,
            west,
            south,
            east,
        })
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, point: LatLon) -> bool {
        (self.south..=self.north).contains(&point.0) && (self.west..=self.east).contains(&point.1)
    }

    pub fn contains_lat(&self, lat: f64) -> bool {
        (self.south..=self.north).contains(&lat)
    }

    pub fn contains_lon(&self, lon: f64) -> bool {
        (self.west..=self.east).contains(&lon)
    }

    pub fn area(&self) -> f64 {
        (self.north - self.south) * (self.east - self.west)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.north, self.west, self.south, self.east]
    }
}

impl TryFrom<[f64; 4]> for Extent {
    type Error = LocationError;

    fn try_from(value: [f64; 4]) -> Result<Self, Self::Error> {
        Extent::new(value[0], value[1], value[2], value[3])
    }
}

impl From<Extent> for [f64; 4] {
    fn from(value: Extent) -> Self {
        value.as_array()
    }
}

impl Display for Extent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.north, self.west, self.south, self.east
        )
    }
}

/// One catalogue row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasinEntry {
    /// Archive partition key used to pick cached/remote reanalysis files.
    pub basin_group: String,
    pub extent: Extent,
    #[serde(default)]
    pub mask: Option<MaskRef>,
}

// name, group, [north, west, south, east], mask stem (relative to the data directory)
const INDUS: [f64; 4] = [40.0, 65.0, 25.0, 85.0];
const HMA: [f64; 4] = [42.0, 60.0, 20.0, 110.0];
const FRANCE: [f64; 4] = [48.0, -2.0, 41.0, 10.0];
const KOREA: [f64; 4] = [39.0, 124.0, 33.0, 131.0];
const VALUE: [f64; 4] = [71.0, -10.0, 36.0, 32.0];

const BUILTIN: &[(&str, &str, [f64; 4], Option<&str>)] = &[
    ("indus", "indus", INDUS, None),
    ("uib", "indus", INDUS, Some("Masks/ERA5_Upper_Indus_mask")),
    ("sutlej", "indus", INDUS, Some("Masks/Sutlej_mask")),
    ("beas", "indus", INDUS, Some("Masks/Beas_mask")),
    ("beas_sutlej", "indus", INDUS, Some("Masks/Beas_Sutlej_mask")),
    ("khyber", "indus", INDUS, Some("Masks/Khyber_mask")),
    ("ngari", "indus", INDUS, Some("Masks/Ngari_mask")),
    ("gilgit", "indus", INDUS, Some("Masks/Gilgit_mask")),
    ("hma", "hma", HMA, None),
    ("france", "france", FRANCE, None),
    ("korea", "korea", KOREA, None),
    ("value", "value", VALUE, None),
    ("europe", "value", VALUE, None),
];

/// Named basins and sub-basins known to the resolver.
///
/// The built-in table covers the Indus sub-basins, High Mountain Asia,
/// France, Korea and the VALUE European domain. Further basins can be
/// loaded from JSON:
///
/// ```
/// use precip_loader::BasinCatalogue;
///
/// let catalogue = BasinCatalogue::from_json_str(r#"{
///     "nile": { "basin_group": "nile", "extent": [32, 24, -4, 40] }
/// }"#).unwrap();
/// assert_eq!(catalogue.get("nile").unwrap().extent.north, 32.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasinCatalogue {
    entries: BTreeMap<String, BasinEntry>,
}

impl BasinCatalogue {
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(name, group, extent, mask)| {
                let [north, west, south, east] = *extent;
                (
                    name.to_string(),
                    BasinEntry {
                        basin_group: group.to_string(),
                        extent: Extent {
                            north,
                            west,
                            south,
                            east,
                        },
                        mask: mask.map(MaskRef::from),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn from_json_str(json: &str) -> Result<Self, LocationError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, LocationError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| LocationError::CatalogueRead(path.to_path_buf(), e))?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String, LocationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get(&self, name: &str) -> Option<&BasinEntry> {
        self.entries.get(name)
    }

    /// Like [`BasinCatalogue::get`] but failing with [`LocationError::UnknownLocation`].
    pub fn lookup(&self, name: &str) -> Result<&BasinEntry, LocationError> {
        self.entries
            .get(name)
            .ok_or_else(|| LocationError::UnknownLocation(name.to_string()))
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, name: impl Into<String>, entry: BasinEntry) -> Option<BasinEntry> {
        self.entries.insert(name.into(), entry)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The basin group whose own entry contains `point`, preferring the smallest extent.
    pub fn group_containing(&self, point: LatLon) -> Result<&str, LocationError> {
        self.entries
            .iter()
            .filter(|(name, entry)| **name == entry.basin_group && entry.extent.contains(point))
            .min_by(|a, b| a.1.extent.area().total_cmp(&b.1.extent.area()))
            .map(|(_, entry)| entry.basin_group.as_str())
            .ok_or(LocationError::NoBasinContains(point))
    }
}
