//! Interval model.
//!
//! Intervals are written `<positive integer><unit>` with unit one of
//! `s`, `m`, `d`, `w`. Hourly bars are not a concept in this engine; `h`
//! is rejected with a hint towards the equivalent minute form.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Seconds in one minute.
pub const SECONDS_PER_MINUTE: i64 = 60;
/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;
/// Seconds in one week.
pub const SECONDS_PER_WEEK: i64 = 604_800;

/// Unit of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntervalUnit {
    Second,
    Minute,
    Day,
    Week,
}

impl IntervalUnit {
    /// Duration of one unit in seconds.
    #[inline]
    pub fn seconds(self) -> i64 {
        match self {
            IntervalUnit::Second => 1,
            IntervalUnit::Minute => SECONDS_PER_MINUTE,
            IntervalUnit::Day => SECONDS_PER_DAY,
            IntervalUnit::Week => SECONDS_PER_WEEK,
        }
    }

    /// Unit suffix used in interval strings.
    pub fn suffix(self) -> char {
        match self {
            IntervalUnit::Second => 's',
            IntervalUnit::Minute => 'm',
            IntervalUnit::Day => 'd',
            IntervalUnit::Week => 'w',
        }
    }

    /// Day and week intervals follow the trading calendar.
    #[inline]
    pub fn is_calendar(self) -> bool {
        matches!(self, IntervalUnit::Day | IntervalUnit::Week)
    }
}

/// A parsed interval: unit plus positive magnitude.
///
/// Immutable once parsed. The derived duration is `magnitude * unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IntervalSpec {
    unit: IntervalUnit,
    magnitude: u32,
}

impl IntervalSpec {
    /// Build an interval from its parts. Magnitude must be positive.
    pub fn new(unit: IntervalUnit, magnitude: u32) -> Result<Self> {
        if magnitude == 0 {
            return Err(Error::invalid_interval(
                format!("0{}", unit.suffix()),
                "magnitude must be a positive integer",
            ));
        }
        Ok(Self { unit, magnitude })
    }

    /// Parse an interval string such as `"5m"` or `"1w"`.
    pub fn parse(s: &str) -> Result<Self> {
        let value = s.trim();
        let Some(unit_char) = value.chars().last() else {
            return Err(Error::invalid_interval(s, "empty interval"));
        };
        let digits = &value[..value.len() - unit_char.len_utf8()];

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_interval(
                s,
                "expected <positive integer><unit> with unit one of s, m, d, w",
            ));
        }

        let magnitude: u32 = digits
            .parse()
            .map_err(|_| Error::invalid_interval(s, "magnitude out of range"))?;

        let unit = match unit_char {
            's' => IntervalUnit::Second,
            'm' => IntervalUnit::Minute,
            'd' => IntervalUnit::Day,
            'w' => IntervalUnit::Week,
            'h' => {
                let minutes = u64::from(magnitude) * 60;
                return Err(Error::invalid_interval(
                    s,
                    format!(
                        "hourly intervals are not supported, use the minute form (e.g. \"{minutes}m\" not \"{value}\")"
                    ),
                ));
            }
            other => {
                return Err(Error::invalid_interval(
                    s,
                    format!("unknown unit '{other}', expected one of s, m, d, w"),
                ));
            }
        };

        Self::new(unit, magnitude)
    }

    /// Interval unit.
    #[inline]
    pub fn unit(&self) -> IntervalUnit {
        self.unit
    }

    /// Interval magnitude (always > 0).
    #[inline]
    pub fn magnitude(&self) -> u32 {
        self.magnitude
    }

    /// Total duration in seconds.
    #[inline]
    pub fn seconds(&self) -> i64 {
        i64::from(self.magnitude) * self.unit.seconds()
    }

    /// Total duration as a chrono duration.
    #[inline]
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.seconds())
    }

    /// Whether this interval is day- or week-based.
    #[inline]
    pub fn is_calendar(&self) -> bool {
        self.unit.is_calendar()
    }

    /// Whether this is exactly `1s` or `1m`, the time-window targets.
    pub fn is_time_window_target(&self) -> bool {
        self.magnitude == 1 && matches!(self.unit, IntervalUnit::Second | IntervalUnit::Minute)
    }
}

impl fmt::Display for IntervalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.suffix())
    }
}

impl FromStr for IntervalSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IntervalSpec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<IntervalSpec> for String {
    fn from(value: IntervalSpec) -> Self {
        value.to_string()
    }
}

impl PartialOrd for IntervalSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IntervalSpec {
    /// Ordered by duration, then unit, so `60s` < `1m`.
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds()
            .cmp(&other.seconds())
            .then(self.unit.cmp(&other.unit))
    }
}

/// Granularity of aggregation input: raw ticks or bars of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Tick,
    Bars(IntervalSpec),
}

impl Granularity {
    /// Parse `"tick"` or an interval string.
    pub fn parse(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("tick") {
            Ok(Granularity::Tick)
        } else {
            IntervalSpec::parse(s).map(Granularity::Bars)
        }
    }

    /// The bar interval, or `None` for ticks.
    pub fn interval(&self) -> Option<IntervalSpec> {
        match self {
            Granularity::Tick => None,
            Granularity::Bars(spec) => Some(*spec),
        }
    }

    #[inline]
    pub fn is_tick(&self) -> bool {
        matches!(self, Granularity::Tick)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Tick => f.write_str("tick"),
            Granularity::Bars(spec) => spec.fmt(f),
        }
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<IntervalSpec> for Granularity {
    fn from(value: IntervalSpec) -> Self {
        Granularity::Bars(value)
    }
}

/// Parse an interval string.
pub fn parse(s: &str) -> Result<IntervalSpec> {
    IntervalSpec::parse(s)
}
