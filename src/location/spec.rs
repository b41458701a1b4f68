use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
/// Both values are in decimal degrees.
///
/// # Examples
///
/// ```
/// use precip_loader::LatLon;
///
/// let leh = LatLon(34.16, 77.58);
/// assert_eq!(leh.0, 34.16); // Latitude
/// assert_eq!(leh.1, 77.58); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    pub fn lat(self) -> f64 {
        self.0
    }
    pub fn lon(self) -> f64 {
        self.1
    }
}

impl Display for LatLon {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// Where data should be collected: a named basin from the catalogue or a single coordinate.
///
/// Convert from a `&str`/`String` for named basins and from [`LatLon`] for
/// coordinates, so the kind of location is fixed at the call site.
///
/// # Examples
///
/// ```
/// use precip_loader::{LatLon, LocationSpec};
///
/// let basin = LocationSpec::from("beas");
/// assert_eq!(basin, LocationSpec::Named("beas".to_string()));
///
/// let point: LocationSpec = LatLon(31.65, 77.34).into();
/// assert!(matches!(point, LocationSpec::Coordinate(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocationSpec {
    Named(String),
    Coordinate(LatLon),
}

impl LocationSpec {
    pub fn name(&self) -> Option<&str> {
        match self {
            LocationSpec::Named(name) => Some(name),
            LocationSpec::Coordinate(_) => None,
        }
    }

    pub fn coordinate(&self) -> Option<LatLon> {
        match self {
            LocationSpec::Named(_) => None,
            LocationSpec::Coordinate(coordinate) => Some(*coordinate),
        }
    }
}

impl Display for LocationSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LocationSpec::Named(name) => write!(f, "{}", name),
            LocationSpec::Coordinate(coordinate) => write!(f, "{}", coordinate),
        }
    }
}

impl From<&str> for LocationSpec {
    fn from(value: &str) -> Self {
        Self::Named(value.to_string())
    }
}

impl From<String> for LocationSpec {
    fn from(value: String) -> Self {
        Self::Named(value)
    }
}

impl From<LatLon> for LocationSpec {
    fn from(value: LatLon) -> Self {
        Self::Coordinate(value)
    }
}

impl From<&LocationSpec> for LocationSpec {
    fn from(value: &LocationSpec) -> Self {
        value.clone()
    }
}
