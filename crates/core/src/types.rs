//! Core data types for the barsmith engine.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Size/quantity type.
pub type Size = f64;

/// Convert a millisecond timestamp into a UTC instant.
pub fn ts_from_millis(ts_ms: TimestampMs) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts_ms)
        .ok_or_else(|| Error::data(format!("timestamp {ts_ms} ms is out of range")))
}

/// One OHLCV record over a fixed window for one symbol.
///
/// `timestamp` is the inclusive window start. Well-formed input has
/// `high >= max(open, close) >= min(open, close) >= low`; the engine does
/// not enforce this on individual bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Instrument symbol.
    pub symbol: String,
    /// Window start (inclusive).
    pub timestamp: DateTime<Utc>,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Total volume.
    pub volume: Size,
}

impl Bar {
    /// Create a bar.
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Size,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Window start in whole seconds since the epoch.
    #[inline]
    pub fn epoch_seconds(&self) -> i64 {
        self.timestamp.timestamp()
    }
}

/// A single trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Instrument symbol.
    pub symbol: String,
    /// Trade time.
    pub timestamp: DateTime<Utc>,
    /// Trade price.
    pub price: f64,
    /// Trade size.
    pub size: Size,
}

impl Tick {
    /// Degenerate bar with open = high = low = close = price.
    pub fn to_bar(&self) -> Bar {
        Bar {
            symbol: self.symbol.clone(),
            timestamp: self.timestamp,
            open: self.price,
            high: self.price,
            low: self.price,
            close: self.price,
            volume: self.size,
        }
    }
}

/// Raw OHLCV record as delivered by a storage or transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvRecord {
    /// Instrument symbol.
    pub symbol: String,
    /// Window start in milliseconds.
    pub ts_ms: TimestampMs,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Volume, if the source reports it.
    #[serde(default)]
    pub volume: Option<Size>,
}

impl TryFrom<OhlcvRecord> for Bar {
    type Error = Error;

    fn try_from(record: OhlcvRecord) -> Result<Self> {
        let timestamp = ts_from_millis(record.ts_ms)?;
        let volume = record.volume.unwrap_or(0.0);
        if volume < 0.0 || volume.is_nan() {
            return Err(Error::data(format!(
                "record {}@{} has invalid volume {volume}",
                record.symbol, record.ts_ms
            )));
        }
        Ok(Bar {
            symbol: record.symbol,
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume,
        })
    }
}

/// The closed set of input shapes accepted at the aggregation boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum BarInput {
    /// A raw trade print.
    Tick(Tick),
    /// A raw OHLCV record.
    Record(OhlcvRecord),
    /// An already-typed bar.
    Bar(Bar),
}

impl BarInput {
    /// Convert into the canonical bar.
    pub fn into_bar(self) -> Result<Bar> {
        match self {
            BarInput::Tick(tick) => {
                if tick.size < 0.0 || tick.size.is_nan() {
                    return Err(Error::data(format!(
                        "tick {}@{} has invalid size {}",
                        tick.symbol, tick.timestamp, tick.size
                    )));
                }
                Ok(tick.to_bar())
            }
            BarInput::Record(record) => Bar::try_from(record),
            BarInput::Bar(bar) => Ok(bar),
        }
    }
}

impl From<Tick> for BarInput {
    fn from(value: Tick) -> Self {
        BarInput::Tick(value)
    }
}

impl From<OhlcvRecord> for BarInput {
    fn from(value: OhlcvRecord) -> Self {
        BarInput::Record(value)
    }
}

impl From<Bar> for BarInput {
    fn from(value: Bar) -> Self {
        BarInput::Bar(value)
    }
}

/// Normalize a sequence of inputs into canonical bars, preserving order.
pub fn normalize_to_bars<I, T>(items: I) -> Result<Vec<Bar>>
where
    I: IntoIterator<Item = T>,
    T: Into<BarInput>,
{
    items.into_iter().map(|item| item.into().into_bar()).collect()
}

/// A maximal contiguous run of missing expected timestamps.
///
/// `start_time` is inclusive and `end_time` exclusive. `retry_count` and
/// `last_retry` are only ever mutated by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    /// Instrument symbol.
    pub symbol: String,
    /// First missing timestamp (inclusive).
    pub start_time: DateTime<Utc>,
    /// End of the last missing window (exclusive).
    pub end_time: DateTime<Utc>,
    /// Number of missing bars in the run.
    pub missing_count: u32,
    /// Number of fill attempts so far.
    #[serde(default)]
    pub retry_count: u32,
    /// Time of the last fill attempt.
    #[serde(default)]
    pub last_retry: Option<DateTime<Utc>>,
}

impl Gap {
    /// Create a gap with no retries recorded.
    pub fn new(
        symbol: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        missing_count: u32,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            start_time,
            end_time,
            missing_count,
            retry_count: 0,
            last_retry: None,
        }
    }

    /// Length of the missing window.
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Whether `ts` falls inside `[start_time, end_time)`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start_time && ts < self.end_time
    }

    /// Record a fill attempt.
    pub fn record_retry(&mut self, at: DateTime<Utc>) {
        self.retry_count += 1;
        self.last_retry = Some(at);
    }
}
