//! TTL Module
//!
//! Time-to-live parameter accepted by writes, resolved once into an absolute
//! expiration timestamp.

use std::time::Duration;

use chrono::{DateTime, Months, TimeDelta, Utc};

use crate::error::{CacheError, Result};

// == Calendar Interval ==
/// Calendar-aware duration. Months and years follow calendar rules
/// (Jan 31 + 1 month = Feb 28/29), the remaining fields are fixed-length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalendarInterval {
    pub years: u32,
    pub months: u32,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl CalendarInterval {
    pub fn years(years: u32) -> Self {
        Self { years, ..Self::default() }
    }

    pub fn months(months: u32) -> Self {
        Self { months, ..Self::default() }
    }

    pub fn days(days: i64) -> Self {
        Self { days, ..Self::default() }
    }

    pub fn hours(hours: i64) -> Self {
        Self { hours, ..Self::default() }
    }

    pub fn minutes(minutes: i64) -> Self {
        Self { minutes, ..Self::default() }
    }

    pub fn seconds(seconds: i64) -> Self {
        Self { seconds, ..Self::default() }
    }

    /// Adds this interval to `now`, returning Unix seconds.
    pub fn add_to(&self, now: i64) -> Result<i64> {
        let out_of_range = || CacheError::InvalidTtl(format!("{self:?} is out of range"));

        let start = DateTime::<Utc>::from_timestamp(now, 0).ok_or_else(out_of_range)?;
        let total_months = self
            .years
            .checked_mul(12)
            .and_then(|m| m.checked_add(self.months))
            .ok_or_else(out_of_range)?;
        let shifted = start
            .checked_add_months(Months::new(total_months))
            .ok_or_else(out_of_range)?;

        let fixed = TimeDelta::try_days(self.days)
            .and_then(|d| d.checked_add(&TimeDelta::try_hours(self.hours)?))
            .and_then(|d| d.checked_add(&TimeDelta::try_minutes(self.minutes)?))
            .and_then(|d| d.checked_add(&TimeDelta::try_seconds(self.seconds)?))
            .ok_or_else(out_of_range)?;

        shifted
            .checked_add_signed(fixed)
            .map(|t| t.timestamp())
            .ok_or_else(out_of_range)
    }
}

// == TTL ==
/// Time-to-live for a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ttl {
    /// Relative seconds; zero or negative expires the entry immediately
    Seconds(i64),
    /// Calendar interval relative to now
    Interval(CalendarInterval),
    /// Configured default TTL
    #[default]
    Default,
}

impl Ttl {
    /// Resolves to an absolute expiration timestamp.
    pub fn resolve(&self, now: i64, default_ttl: i64) -> Result<i64> {
        match self {
            Ttl::Seconds(seconds) => now
                .checked_add(*seconds)
                .ok_or_else(|| CacheError::InvalidTtl(format!("{seconds}s overflows"))),
            Ttl::Interval(interval) => interval.add_to(now),
            Ttl::Default => now
                .checked_add(default_ttl)
                .ok_or_else(|| CacheError::InvalidTtl(format!("default {default_ttl}s overflows"))),
        }
    }
}

impl From<i64> for Ttl {
    fn from(seconds: i64) -> Self {
        Ttl::Seconds(seconds)
    }
}

impl From<i32> for Ttl {
    fn from(seconds: i32) -> Self {
        Ttl::Seconds(i64::from(seconds))
    }
}

impl From<Option<i64>> for Ttl {
    fn from(seconds: Option<i64>) -> Self {
        seconds.map_or(Ttl::Default, Ttl::Seconds)
    }
}

impl From<CalendarInterval> for Ttl {
    fn from(interval: CalendarInterval) -> Self {
        Ttl::Interval(interval)
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Ttl::Seconds(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
    }
}

impl From<TimeDelta> for Ttl {
    fn from(delta: TimeDelta) -> Self {
        Ttl::Seconds(delta.num_seconds())
    }
}
