use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::core::RowKey;
use crate::error::{ChartError, ChartResult};

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;
const MILLIS_PER_WEEK: i64 = 7 * MILLIS_PER_DAY;

/// 2000-01-01T00:00:00Z, the alignment base for fixed-length units.
const ALIGN_BASE: i64 = 946_684_800_000;
/// 2000-01-02T00:00:00Z, a Sunday, the alignment base for weeks.
const WEEK_ALIGN_BASE: i64 = 946_771_200_000;
const BASE_YEAR: i64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    ThirdOfMonth,
    Month,
    Quarter,
    Semester,
    Year,
}

/// Grouping interval: `count` units of `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub unit: IntervalUnit,
    pub count: u32,
}

impl Interval {
    pub fn new(unit: IntervalUnit, count: u32) -> ChartResult<Self> {
        if count == 0 {
            return Err(ChartError::InvalidParameter {
                name: "interval count",
                value: count.to_string(),
            });
        }
        Ok(Self { unit, count })
    }

    #[must_use]
    pub fn days(count: u32) -> Self {
        Self {
            unit: IntervalUnit::Day,
            count: count.max(1),
        }
    }

    /// Approximate interval length in milliseconds, used for ordering intervals.
    #[must_use]
    pub fn approximate_range(self) -> f64 {
        let year = 365.25 * MILLIS_PER_DAY as f64;
        let count = f64::from(self.count);
        match self.unit {
            IntervalUnit::Year => count * year,
            IntervalUnit::Semester => count * year / 2.0,
            IntervalUnit::Quarter => count * year / 4.0,
            IntervalUnit::Month => count * year / 12.0,
            IntervalUnit::ThirdOfMonth => count * year / 36.0,
            _ => count * self.fixed_length().unwrap_or(1) as f64,
        }
    }

    fn fixed_length(self) -> Option<i64> {
        let unit = match self.unit {
            IntervalUnit::Millisecond => 1,
            IntervalUnit::Second => MILLIS_PER_SECOND,
            IntervalUnit::Minute => MILLIS_PER_MINUTE,
            IntervalUnit::Hour => MILLIS_PER_HOUR,
            IntervalUnit::Day => MILLIS_PER_DAY,
            IntervalUnit::Week => MILLIS_PER_WEEK,
            _ => return None,
        };
        Some(unit * i64::from(self.count))
    }

    /// Months per step for month-based units.
    fn month_step(self) -> Option<i64> {
        let months = match self.unit {
            IntervalUnit::Month => 1,
            IntervalUnit::Quarter => 3,
            IntervalUnit::Semester => 6,
            IntervalUnit::Year => 12,
            _ => return None,
        };
        Some(months * i64::from(self.count))
    }
}

/// Walks calendar-aligned bucket boundaries of an [`Interval`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalGenerator {
    interval: Interval,
    current: RowKey,
}

impl IntervalGenerator {
    #[must_use]
    pub fn new(interval: Interval) -> Self {
        Self {
            interval,
            current: ALIGN_BASE,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Returns the start of the bucket containing `key`.
    #[must_use]
    pub fn align(&self, key: RowKey) -> RowKey {
        if let Some(length) = self.interval.fixed_length() {
            let base = if self.interval.unit == IntervalUnit::Week {
                WEEK_ALIGN_BASE
            } else {
                ALIGN_BASE
            };
            let offset = i128::from(key) - i128::from(base);
            let length = i128::from(length);
            let aligned = i128::from(base) + offset.div_euclid(length) * length;
            return RowKey::try_from(aligned).unwrap_or(RowKey::MIN);
        }
        if let Some(step) = self.interval.month_step() {
            return month_number(key).map_or(key, |months| {
                let base = BASE_YEAR * 12;
                let aligned = base + (months - base).div_euclid(step) * step;
                month_start(aligned).unwrap_or(key)
            });
        }
        decade_number(key).map_or(key, |decades| {
            let step = i64::from(self.interval.count);
            let base = BASE_YEAR * 36;
            let aligned = base + (decades - base).div_euclid(step) * step;
            decade_start(aligned).unwrap_or(key)
        })
    }

    /// Positions the generator on the bucket containing `key` and returns its start.
    pub fn set_start(&mut self, key: RowKey) -> RowKey {
        self.current = self.align(key);
        self.current
    }

    #[must_use]
    pub fn current(&self) -> RowKey {
        self.current
    }

    /// Moves to the next bucket boundary and returns it.
    pub fn advance(&mut self) -> RowKey {
        let next = if let Some(length) = self.interval.fixed_length() {
            self.current.checked_add(length)
        } else if let Some(step) = self.interval.month_step() {
            month_number(self.current).and_then(|months| month_start(months + step))
        } else {
            decade_number(self.current)
                .and_then(|decades| decade_start(decades + i64::from(self.interval.count)))
        };
        // Outside the calendar range there is no next boundary; keep buckets non-empty.
        self.current = next.unwrap_or(i64::MAX);
        self.current
    }
}

fn month_number(key: RowKey) -> Option<i64> {
    let time = DateTime::from_timestamp_millis(key)?;
    Some(i64::from(time.year()) * 12 + i64::from(time.month0()))
}

fn month_start(months: i64) -> Option<RowKey> {
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = u32::try_from(months.rem_euclid(12)).ok()? + 1;
    date_key(year, month, 1)
}

fn decade_number(key: RowKey) -> Option<i64> {
    let time = DateTime::from_timestamp_millis(key)?;
    let decade = match time.day() {
        1..=10 => 0,
        11..=20 => 1,
        _ => 2,
    };
    Some((i64::from(time.year()) * 12 + i64::from(time.month0())) * 3 + decade)
}

fn decade_start(decades: i64) -> Option<RowKey> {
    let months = decades.div_euclid(3);
    let decade = u32::try_from(decades.rem_euclid(3)).ok()?;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = u32::try_from(months.rem_euclid(12)).ok()? + 1;
    date_key(year, month, 1 + decade * 10)
}

fn date_key(year: i32, month: u32, day: u32) -> Option<RowKey> {
    let time = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
    Some(time.and_utc().timestamp_millis())
}
