//! Canonical monthly time axis, month-alignment validation, half-open year
//! slicing and monthly aggregation.

use crate::time::error::TimeError;
use crate::time::month::Month;
use crate::time::raw_time::RawTime;
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::collections::BTreeMap;
use std::ops::Range;

/// Days in an average Gregorian month, used to express gauge monthly totals as mm/day.
pub const AVERAGE_DAYS_PER_MONTH: f64 = 30.436875;

/// An ordered run of consecutive months without gaps or duplicates.
///
/// Times are held as month starts. [`CanonicalTimeAxis::fractional_years`]
/// gives the mid-month reporting view (`year + (month - 1) / 12 + 1 / 24`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanonicalTimeAxis {
    months: Vec<Month>,
}

impl CanonicalTimeAxis {
    /// Every month from `first` to `last`, both inclusive.
    pub fn spanning(first: Month, last: Month) -> Result<Self, TimeError> {
        if first > last {
            return Err(TimeError::InvertedRange { first, last });
        }
        let months = (first.index()..=last.index())
            .map(Month::from_index)
            .collect();
        Ok(Self { months })
    }

    /// Wraps an existing month sequence, checking that it is evenly spaced.
    pub fn from_months(months: Vec<Month>) -> Result<Self, TimeError> {
        for pair in months.windows(2) {
            if pair[1].index() != pair[0].index() + 1 {
                return Err(TimeError::UnevenSpacing {
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }
        Ok(Self { months })
    }

    pub fn months(&self) -> &[Month] {
        &self.months
    }

    pub fn into_months(self) -> Vec<Month> {
        self.months
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn first(&self) -> Option<Month> {
        self.months.first().copied()
    }

    pub fn last(&self) -> Option<Month> {
        self.months.last().copied()
    }

    /// Mid-month fractional years, the externally reported time values.
    pub fn fractional_years(&self) -> Vec<f64> {
        self.months.iter().map(|m| m.mid_month_year()).collect()
    }

    /// Month starts (`YYYY-MM-01 00:00:00`), the internal representation.
    pub fn month_starts(&self) -> Vec<NaiveDateTime> {
        self.months.iter().filter_map(|m| m.start()).collect()
    }
}

/// Synthesizes the canonical monthly axis covering a set of raw timestamps.
///
/// The axis runs from January of `floor(min)` up to, but excluding, January
/// of `ceil(max)`, so a sample lying exactly on January 1st of a year closes
/// the axis instead of opening a new year. Each raw timestamp must correspond
/// to exactly one month of that axis: the function does not aggregate, so a
/// sample count that differs from the axis length is a
/// [`TimeError::Cardinality`] error.
///
/// # Errors
///
/// * [`TimeError::EmptyInput`] for an empty slice.
/// * [`TimeError::UnparseableTimestamp`], [`TimeError::EpochOutOfRange`] when a
///   timestamp cannot be converted.
/// * [`TimeError::Cardinality`] when `raw_times.len()` differs from the axis length.
///
/// # Examples
///
/// ```
/// use precip_loader::time::{to_canonical_months, RawTime};
///
/// let raw: Vec<RawTime> = (0..24)
///     .map(|i| RawTime::from(format!("{}-{:02}-01", 1996 + i / 12, i % 12 + 1)))
///     .collect();
/// let axis = to_canonical_months(&raw).unwrap();
/// assert_eq!(axis.len(), 24);
/// assert!((axis.fractional_years()[0] - (1996.0 + 1.0 / 24.0)).abs() < 1e-12);
/// ```
pub fn to_canonical_months(raw_times: &[RawTime]) -> Result<CanonicalTimeAxis, TimeError> {
    if raw_times.is_empty() {
        return Err(TimeError::EmptyInput);
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for raw in raw_times {
        let value = raw.to_fractional_year()?;
        min = min.min(value);
        max = max.max(value);
    }

    // Year bounds fit an i32 after the range check in `to_fractional_year`.
    let first = Month::new(1, min.floor() as i32).index();
    let end = (max.ceil() as i64) * 12;
    let expected = usize::try_from(end - first).unwrap_or(0);
    if expected != raw_times.len() {
        return Err(TimeError::Cardinality {
            expected,
            found: raw_times.len(),
        });
    }
    let months = (first..end).map(Month::from_index).collect();
    Ok(CanonicalTimeAxis { months })
}

/// Checks that every timestamp is exactly a month start (day 1, 00:00:00).
///
/// Returns [`TimeError::Alignment`] naming the first offending index.
pub fn validate_month_alignment(times: &[NaiveDateTime]) -> Result<(), TimeError> {
    match times.iter().position(|t| !is_month_start(t)) {
        Some(index) => Err(TimeError::Alignment {
            index,
            timestamp: times[index],
        }),
        None => Ok(()),
    }
}

pub fn is_month_aligned(times: &[NaiveDateTime]) -> bool {
    times.iter().all(is_month_start)
}

fn is_month_start(time: &NaiveDateTime) -> bool {
    time.day() == 1 && time.num_seconds_from_midnight() == 0 && time.nanosecond() == 0
}

/// Anything indexed by an ordered monthly time axis.
pub trait TimeIndexed {
    fn time_months(&self) -> &[Month];

    /// A copy restricted to the time steps in `range`.
    fn select_time(&self, range: Range<usize>) -> Self
    where
        Self: Sized;
}

impl TimeIndexed for CanonicalTimeAxis {
    fn time_months(&self) -> &[Month] {
        &self.months
    }

    fn select_time(&self, range: Range<usize>) -> Self {
        Self {
            months: self.months[range].to_vec(),
        }
    }
}

/// Keeps the time steps with `min_year <= t < max_year`.
///
/// `t` is the month-start fractional year, so the point for January 1998 is
/// `1998.0` and is excluded by `max_year = 1998.0`.
pub fn slice_range<T: TimeIndexed>(series: &T, min_year: f64, max_year: f64) -> T {
    let months = series.time_months();
    let start = months.partition_point(|m| m.start_year_fraction() < min_year);
    let end = months
        .partition_point(|m| m.start_year_fraction() < max_year)
        .max(start);
    series.select_time(start..end)
}

/// How samples falling in the same calendar month are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
    Sum,
    /// Monthly total divided by [`AVERAGE_DAYS_PER_MONTH`].
    SumPerAverageMonth,
}

impl Aggregation {
    /// Reduces the present values; `None` when every value is missing.
    pub fn reduce<I>(self, values: I) -> Option<f64>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut sum = 0.0;
        let mut count = 0usize;
        for value in values.into_iter().flatten() {
            if value.is_nan() {
                continue;
            }
            sum += value;
            count += 1;
        }
        self.finish(sum, count)
    }

    /// Final value from a running sum over `count` present samples.
    pub fn finish(self, sum: f64, count: usize) -> Option<f64> {
        if count == 0 {
            return None;
        }
        Some(match self {
            Aggregation::Mean => sum / count as f64,
            Aggregation::Sum => sum,
            Aggregation::SumPerAverageMonth => sum / AVERAGE_DAYS_PER_MONTH,
        })
    }
}

/// Groups dated samples by calendar month and reduces each group.
///
/// The output is gap-free: months between the first and last sample that
/// have no samples at all are reported as `None`.
pub fn resample_monthly<I, D>(samples: I, aggregation: Aggregation) -> Vec<(Month, Option<f64>)>
where
    I: IntoIterator<Item = (D, Option<f64>)>,
    D: Datelike,
{
    let mut groups: BTreeMap<Month, Vec<Option<f64>>> = BTreeMap::new();
    for (date, value) in samples {
        groups.entry(Month::from_date(date)).or_default().push(value);
    }
    let (Some(first), Some(last)) = (
        groups.keys().next().copied(),
        groups.keys().next_back().copied(),
    ) else {
        return Vec::new();
    };

    (first.index()..=last.index())
        .map(Month::from_index)
        .map(|month| {
            let value = groups
                .remove(&month)
                .and_then(|values| aggregation.reduce(values));
            (month, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn monthly_raw(first_year: i32, count: usize) -> Vec<RawTime> {
        (0..count as i64)
            .map(|i| Month::from_index(Month::new(1, first_year).index() + i))
            .map(|m| RawTime::from(m.first_day().unwrap()))
            .collect()
    }

    #[test]
    fn test_two_years_of_monthly_samples() -> Result<(), TimeError> {
        let axis = to_canonical_months(&monthly_raw(1996, 24))?;
        assert_eq!(axis.len(), 24, "Expected one axis entry per month");
        let years = axis.fractional_years();
        assert!((years[0] - (1996.0 + 1.0 / 24.0)).abs() < 1e-12);
        for pair in years.windows(2) {
            assert!((pair[1] - pair[0] - 1.0 / 12.0).abs() < 1e-9, "Step must be 1/12");
        }
        assert!(is_month_aligned(&axis.month_starts()));
        Ok(())
    }

    #[test]
    fn test_axis_length_matches_whole_year_span() -> Result<(), TimeError> {
        for years in 1..5 {
            let axis = to_canonical_months(&monthly_raw(1980, years * 12))?;
            assert_eq!(axis.len(), years * 12);
        }
        Ok(())
    }

    #[test]
    fn test_epoch_counters_produce_the_same_axis() -> Result<(), TimeError> {
        let reference = crate::time::EpochReference::parse_cf("days since 1900-01-01")?;
        let origin = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        let raw: Vec<RawTime> = monthly_raw(2001, 12)
            .into_iter()
            .map(|r| match r {
                RawTime::Date(d) => RawTime::Epoch {
                    value: (d - origin).num_days() as f64,
                    reference,
                },
                other => other,
            })
            .collect();
        let axis = to_canonical_months(&raw)?;
        assert_eq!(axis.first(), Some(Month::new(1, 2001)));
        assert_eq!(axis.last(), Some(Month::new(12, 2001)));
        Ok(())
    }

    #[test]
    fn test_cardinality_mismatch() {
        let mut raw = monthly_raw(1996, 12);
        raw.pop();
        assert_eq!(
            to_canonical_months(&raw),
            Err(TimeError::Cardinality {
                expected: 12,
                found: 11
            })
        );
        let daily: Vec<RawTime> = (1..=31)
            .map(|d| RawTime::from(NaiveDate::from_ymd_opt(1996, 1, d).unwrap()))
            .collect();
        assert!(matches!(
            to_canonical_months(&daily),
            Err(TimeError::Cardinality { .. })
        ));
    }

    #[test]
    fn test_axis_end_is_ceiling_of_latest_sample() {
        // Jan 1996 ..= Jan 1997 gives 13 samples but the axis stops before 1997.
        assert_eq!(
            to_canonical_months(&monthly_raw(1996, 13)),
            Err(TimeError::Cardinality {
                expected: 12,
                found: 13
            })
        );
    }

    #[test]
    fn test_far_apart_years_fail_without_building_the_axis() {
        let raw = [RawTime::FractionalYear(0.0), RawTime::FractionalYear(1.0e8)];
        assert_eq!(
            to_canonical_months(&raw),
            Err(TimeError::Cardinality {
                expected: 1_200_000_000,
                found: 2
            })
        );
    }

    #[test]
    fn test_out_of_range_and_nan_years_are_rejected() {
        assert_eq!(
            to_canonical_months(&[RawTime::FractionalYear(3.0e9)]),
            Err(TimeError::EpochOutOfRange { value: 3.0e9 })
        );

        let mut raw = monthly_raw(1996, 11);
        raw.push(RawTime::FractionalYear(f64::NAN));
        assert!(matches!(
            to_canonical_months(&raw),
            Err(TimeError::EpochOutOfRange { .. })
        ));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(to_canonical_months(&[]), Err(TimeError::EmptyInput));
    }

    #[test]
    fn test_alignment() {
        let aligned = NaiveDate::from_ymd_opt(1996, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mid_month = NaiveDate::from_ymd_opt(1996, 2, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let late = NaiveDate::from_ymd_opt(1996, 3, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        assert!(validate_month_alignment(&[aligned]).is_ok());
        assert_eq!(
            validate_month_alignment(&[aligned, mid_month, late]),
            Err(TimeError::Alignment {
                index: 1,
                timestamp: mid_month
            })
        );
        assert!(!is_month_aligned(&[aligned, late]));
    }

    #[test]
    fn test_slice_range_is_half_open() -> Result<(), TimeError> {
        let axis = CanonicalTimeAxis::spanning(Month::new(1, 1995), Month::new(6, 1998))?;
        let sliced = slice_range(&axis, 1996.0, 1998.0);
        assert_eq!(sliced.first(), Some(Month::new(1, 1996)), "1996.0 is included");
        assert_eq!(sliced.last(), Some(Month::new(12, 1997)), "1998.0 is excluded");
        assert_eq!(sliced.len(), 24);

        let empty = slice_range(&axis, 2000.0, 2001.0);
        assert!(empty.is_empty());
        let inverted = slice_range(&axis, 1998.0, 1996.0);
        assert!(inverted.is_empty());
        Ok(())
    }

    #[test]
    fn test_spanning_and_spacing() {
        let axis = CanonicalTimeAxis::spanning(Month::new(11, 1999), Month::new(2, 2000)).unwrap();
        assert_eq!(
            axis.months(),
            &[
                Month::new(11, 1999),
                Month::new(12, 1999),
                Month::new(1, 2000),
                Month::new(2, 2000)
            ]
        );
        assert!(matches!(
            CanonicalTimeAxis::spanning(Month::new(2, 2000), Month::new(1, 2000)),
            Err(TimeError::InvertedRange { .. })
        ));
        assert!(matches!(
            CanonicalTimeAxis::from_months(vec![Month::new(1, 2000), Month::new(3, 2000)]),
            Err(TimeError::UnevenSpacing { .. })
        ));
    }

    #[test]
    fn test_resample_monthly() {
        let samples = vec![
            (NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), Some(2.0)),
            (NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(), Some(4.0)),
            (NaiveDate::from_ymd_opt(2000, 1, 3).unwrap(), None),
            (NaiveDate::from_ymd_opt(2000, 2, 1).unwrap(), None),
            (NaiveDate::from_ymd_opt(2000, 4, 1).unwrap(), Some(30.436875)),
        ];
        let mean = resample_monthly(samples.clone(), Aggregation::Mean);
        assert_eq!(
            mean,
            vec![
                (Month::new(1, 2000), Some(3.0)),
                (Month::new(2, 2000), None),
                (Month::new(3, 2000), None),
                (Month::new(4, 2000), Some(30.436875)),
            ]
        );
        let per_day = resample_monthly(samples, Aggregation::SumPerAverageMonth);
        assert_eq!(per_day[3], (Month::new(4, 2000), Some(1.0)));
        assert!((per_day[0].1.unwrap() - 6.0 / AVERAGE_DAYS_PER_MONTH).abs() < 1e-12);
    }
}
