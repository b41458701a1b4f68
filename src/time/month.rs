use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

/// A calendar month, stored as `(year, month)` with `month` in `1..=12`.
///
/// Months are the unit of the canonical time axis. Internally a month is
/// anchored at its first day (`YYYY-MM-01 00:00:00`); the mid-month
/// fractional year is only a reporting view (see [`Month::mid_month_year`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Month(pub i32, pub u32);

impl Month {
    pub fn year(self) -> i32 {
        self.0
    }
    pub fn month(self) -> u32 {
        self.1
    }
    pub fn new(month: u32, year: i32) -> Self {
        Self(year, month)
    }

    pub fn from_date(date: impl Datelike) -> Self {
        Self(date.year(), date.month())
    }

    /// Continuous month counter (`year * 12 + month - 1`), convenient for spacing checks.
    pub fn index(self) -> i64 {
        self.0 as i64 * 12 + self.1 as i64 - 1
    }

    pub fn from_index(index: i64) -> Self {
        Self(index.div_euclid(12) as i32, index.rem_euclid(12) as u32 + 1)
    }

    pub fn succ(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, self.1, 1)
    }

    pub fn start(self) -> Option<NaiveDateTime> {
        self.first_day()?.and_hms_opt(0, 0, 0)
    }

    pub fn days(self) -> Option<u32> {
        days_in_month(self.0, self.1)
    }

    /// Fractional year of the month start on the uniform 1/12 grid, e.g. `1998.0` for 1998-01.
    pub fn start_year_fraction(self) -> f64 {
        self.0 as f64 + (self.1 as f64 - 1.0) / 12.0
    }

    /// Mid-month fractional year, e.g. `1996 + 1/24` for 1996-01.
    pub fn mid_month_year(self) -> f64 {
        self.start_year_fraction() + 1.0 / 24.0
    }
}

impl Display for Month {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.0, self.1)
    }
}

pub(crate) fn days_in_month(year: i32, month: u32) -> Option<u32> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let (next_month_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    let first_day_of_next_month = NaiveDate::from_ymd_opt(next_month_year, next_month, 1)?;
    let last_day_of_current_month = first_day_of_next_month - Duration::days(1);
    Some(last_day_of_current_month.day())
}
