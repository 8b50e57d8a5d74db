//! Error types for the barsmith engine.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the barsmith engine.
///
/// Every variant is a local condition the caller can act on. The engine
/// never retries and never substitutes a default for a rejected value.
#[derive(Error, Debug)]
pub enum Error {
    /// Unparseable interval string, or an hourly unit.
    #[error("Invalid interval '{value}': {reason}")]
    InvalidInterval { value: String, reason: String },

    /// Target interval is not strictly larger than the source.
    #[error("Source interval {source_interval} must be smaller than target interval {target_interval}")]
    SourceNotSmallerThanTarget {
        source_interval: String,
        target_interval: String,
    },

    /// Same-unit target magnitude is not a multiple of the source magnitude.
    #[error("Target {target_interval} is not an exact multiple of source {source_interval}")]
    NotExactMultiple {
        source_interval: String,
        target_interval: String,
    },

    /// No grouping strategy can produce the target from the source.
    #[error("Unsupported conversion {source_interval} -> {target_interval}: {reason}")]
    UnsupportedConversion {
        source_interval: String,
        target_interval: String,
        reason: String,
    },

    /// Calendar mode was selected without a trading calendar.
    #[error("Calendar aggregation to {target} requires a trading calendar")]
    CalendarRequired { target: String },

    /// Tick input can only be aggregated by time-window rounding.
    #[error("Tick input to {target} must use time-window aggregation")]
    TimeWindowOnlyForTicks { target: String },

    /// Attempted to reduce a bucket with no items.
    #[error("Cannot reduce an empty aggregation group")]
    EmptyAggregationGroup,

    /// Calendar navigation exceeded its search bound.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Session state transition not present in the transition table.
    #[error("Illegal session transition {from} -> {to}")]
    IllegalTransition { from: &'static str, to: &'static str },

    /// A holiday already exists for this (date, exchange group).
    #[error("Duplicate holiday on {date} for {group}")]
    DuplicateHoliday { date: NaiveDate, group: &'static str },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or malformed input record).
    #[error("Data error: {0}")]
    Data(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid interval error.
    pub fn invalid_interval(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidInterval {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported conversion error.
    pub fn unsupported(
        source: impl ToString,
        target: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::UnsupportedConversion {
            source_interval: source.to_string(),
            target_interval: target.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_offending_values() {
        let err = Error::invalid_interval("1h", "use 60m");
        assert_eq!(err.to_string(), "Invalid interval '1h': use 60m");

        let err = Error::unsupported("tick", "5m", "ticks aggregate only to 1s or 1m");
        assert!(err.to_string().contains("tick -> 5m"));
    }

    #[test]
    fn test_duplicate_holiday_message() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        let err = Error::DuplicateHoliday {
            date,
            group: "US_EQUITY",
        };
        assert_eq!(err.to_string(), "Duplicate holiday on 2024-07-04 for US_EQUITY");
    }
}
