//! Raw source timestamps and their conversion to calendar-exact fractional years.
//!
//! Source tables encode time in several ways: CF-style epoch counters
//! (`"days since 1900-01-01"`), date strings, calendar dates or already
//! fractional years. [`RawTime`] captures all of them so the normalizer can
//! treat a column of timestamps uniformly.

use crate::time::error::TimeError;
use crate::time::month::Month;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Unit of a CF epoch counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl EpochUnit {
    fn parse(unit: &str) -> Option<Self> {
        match unit.trim().to_ascii_lowercase().as_str() {
            "ns" | "nanosecond" | "nanoseconds" => Some(Self::Nanoseconds),
            "us" | "microsecond" | "microseconds" => Some(Self::Microseconds),
            "ms" | "millisecond" | "milliseconds" => Some(Self::Milliseconds),
            "s" | "sec" | "secs" | "second" | "seconds" => Some(Self::Seconds),
            "min" | "mins" | "minute" | "minutes" => Some(Self::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(Self::Hours),
            "d" | "day" | "days" => Some(Self::Days),
            _ => None,
        }
    }

    fn milliseconds(self) -> f64 {
        match self {
            Self::Nanoseconds => 1e-6,
            Self::Microseconds => 1e-3,
            Self::Milliseconds => 1.0,
            Self::Seconds => 1e3,
            Self::Minutes => 60e3,
            Self::Hours => 3_600e3,
            Self::Days => SECONDS_PER_DAY * 1e3,
        }
    }
}

/// Unit and reference date of an epoch counter, e.g. `"hours since 1900-01-01 00:00:00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochReference {
    pub unit: EpochUnit,
    pub since: NaiveDateTime,
}

impl EpochReference {
    pub fn new(unit: EpochUnit, since: NaiveDateTime) -> Self {
        Self { unit, since }
    }

    /// Counter relative to 1970-01-01, the convention of polars datetime columns.
    pub fn unix(unit: EpochUnit) -> Self {
        Self {
            unit,
            since: NaiveDateTime::UNIX_EPOCH,
        }
    }

    /// Parses a CF `units` attribute such as `"days since 1900-01-01"`.
    pub fn parse_cf(units: &str) -> Result<Self, TimeError> {
        let invalid = || TimeError::InvalidEpochUnits(units.to_string());
        let (unit, since) = units.split_once(" since ").ok_or_else(invalid)?;
        let unit = EpochUnit::parse(unit).ok_or_else(invalid)?;
        let since = since
            .trim()
            .trim_end_matches(" UTC")
            .trim_end_matches('Z')
            .trim_end_matches(" +00:00");
        let since = parse_datetime(since).ok_or_else(invalid)?;
        Ok(Self { unit, since })
    }

    pub fn to_datetime(&self, value: f64) -> Result<NaiveDateTime, TimeError> {
        let millis = value * self.unit.milliseconds();
        if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
            return Err(TimeError::EpochOutOfRange { value });
        }
        TimeDelta::try_milliseconds(millis.round() as i64)
            .and_then(|delta| self.since.checked_add_signed(delta))
            .ok_or(TimeError::EpochOutOfRange { value })
    }
}

/// A timestamp as found in a source table, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTime {
    Epoch {
        value: f64,
        reference: EpochReference,
    },
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    FractionalYear(f64),
}

impl From<NaiveDate> for RawTime {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for RawTime {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<f64> for RawTime {
    fn from(value: f64) -> Self {
        Self::FractionalYear(value)
    }
}

impl From<&str> for RawTime {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawTime {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl RawTime {
    /// Resolves the timestamp to a calendar date-time.
    ///
    /// Text that is not a recognised date format but parses as a number is
    /// interpreted as a fractional year.
    pub fn to_datetime(&self) -> Result<NaiveDateTime, TimeError> {
        match self {
            RawTime::Epoch { value, reference } => reference.to_datetime(*value),
            RawTime::Date(date) => Ok(date.and_time(NaiveTime::MIN)),
            RawTime::DateTime(datetime) => Ok(*datetime),
            RawTime::FractionalYear(value) => datetime_from_fractional_year(*value),
            RawTime::Text(text) => match parse_timestamp(text) {
                Some(datetime) => Ok(datetime),
                None => {
                    let value: f64 = text
                        .trim()
                        .parse()
                        .map_err(|_| TimeError::UnparseableTimestamp(text.clone()))?;
                    datetime_from_fractional_year(value)
                }
            },
        }
    }

    /// Calendar-exact fractional year: the elapsed share of the actual year length.
    pub fn to_fractional_year(&self) -> Result<f64, TimeError> {
        match self {
            RawTime::FractionalYear(value) => checked_fractional_year(*value),
            _ => Ok(fractional_year(self.to_datetime()?)),
        }
    }

    /// The calendar month this timestamp falls in.
    ///
    /// Fractional years are read on the uniform 1/12 grid, so both the month
    /// start and the mid-month value of a month map to that month.
    pub fn month(&self) -> Result<Month, TimeError> {
        match self {
            RawTime::FractionalYear(value) => month_of_fractional_year(*value),
            _ => Ok(Month::from_date(self.to_datetime()?)),
        }
    }
}

pub fn fractional_year(datetime: NaiveDateTime) -> f64 {
    let year = datetime.year();
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .map(|d| d.and_time(NaiveTime::MIN))
        .unwrap_or(datetime);
    let elapsed = (datetime - start).num_milliseconds() as f64 / 1e3;
    year as f64 + elapsed / (days_in_year(year) as f64 * SECONDS_PER_DAY)
}

fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}

/// Finite and with a year that fits an `i32`.
fn checked_fractional_year(value: f64) -> Result<f64, TimeError> {
    if !value.is_finite() || value.abs() > i32::MAX as f64 {
        return Err(TimeError::EpochOutOfRange { value });
    }
    Ok(value)
}

fn datetime_from_fractional_year(value: f64) -> Result<NaiveDateTime, TimeError> {
    let out_of_range = TimeError::EpochOutOfRange { value };
    checked_fractional_year(value)?;
    let year = value.floor() as i32;
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or(out_of_range.clone())?
        .and_time(NaiveTime::MIN);
    let seconds = (value - year as f64) * days_in_year(year) as f64 * SECONDS_PER_DAY;
    TimeDelta::try_milliseconds((seconds * 1e3).round() as i64)
        .and_then(|delta| start.checked_add_signed(delta))
        .ok_or(out_of_range)
}

fn month_of_fractional_year(value: f64) -> Result<Month, TimeError> {
    let value = checked_fractional_year(value)?;
    let year = value.floor();
    let month = (((value - year) * 12.0) + 1e-6).floor().clamp(0.0, 11.0) as u32 + 1;
    Ok(Month::new(month, year as i32))
}

/// Parses the date formats found in the source tables.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.f]`, the ISO `T` form,
/// compact `YYYYMMDD` and `YYYY-MM`.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        let year = text[0..4].parse().ok()?;
        let month = text[4..6].parse().ok()?;
        let day = text[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).map(|d| d.and_time(NaiveTime::MIN));
    }
    if let Some(datetime) = parse_datetime(text) {
        return Some(datetime);
    }
    // YYYY-MM
    let (year, month) = text.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
        .map(|d| d.and_time(NaiveTime::MIN))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}
