//! Configuration structures for the barsmith engine.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trading calendar configuration.
    pub calendar: CalendarConfig,
    /// Aggregation defaults.
    pub aggregation: AggregationConfig,
    /// Gap detection and quality scoring configuration.
    pub quality: QualityConfig,
}

impl Config {
    /// Parse a configuration from JSON. Missing sections take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        self.calendar.validate()?;
        self.quality.validate()
    }
}

/// Trading calendar configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Exchange group used when none is given (e.g., "US_EQUITY").
    pub default_exchange_group: String,
    /// Maximum number of calendar days walked by next/previous trading day.
    pub search_limit_days: u32,
    /// Maximum number of cached sessions.
    pub session_cache_capacity: u64,
    /// First year of generated US holidays.
    pub builtin_holidays_from: i32,
    /// Last year of generated US holidays (inclusive).
    pub builtin_holidays_to: i32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            default_exchange_group: "US_EQUITY".to_string(),
            search_limit_days: 60,
            session_cache_capacity: 4096,
            builtin_holidays_from: 2000,
            builtin_holidays_to: 2035,
        }
    }
}

impl CalendarConfig {
    fn validate(&self) -> Result<()> {
        if self.search_limit_days == 0 {
            return Err(Error::config("calendar.search_limit_days must be > 0"));
        }
        if self.session_cache_capacity == 0 {
            return Err(Error::config("calendar.session_cache_capacity must be > 0"));
        }
        if self.builtin_holidays_from > self.builtin_holidays_to {
            return Err(Error::config(format!(
                "calendar.builtin_holidays_from ({}) is after builtin_holidays_to ({})",
                self.builtin_holidays_from, self.builtin_holidays_to
            )));
        }
        Ok(())
    }
}

/// Aggregation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Skip buckets that do not hold the expected number of source bars.
    pub require_complete: bool,
    /// Skip buckets with internal gaps.
    pub check_continuity: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            require_complete: true,
            check_continuity: true,
        }
    }
}

/// Gap detection and quality scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Spacing of expected bars in minutes.
    pub interval_minutes: u32,
    /// Log a warning when quality falls below this percentage.
    pub warn_below_pct: f64,
    /// Gaps up to this many bars are minor.
    pub minor_max_missing: u32,
    /// Gaps up to this many bars are moderate.
    pub moderate_max_missing: u32,
    /// Gaps up to this many bars are severe; larger gaps are critical.
    pub severe_max_missing: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 1,
            warn_below_pct: 95.0,
            minor_max_missing: 2,
            moderate_max_missing: 10,
            severe_max_missing: 30,
        }
    }
}

impl QualityConfig {
    fn validate(&self) -> Result<()> {
        if self.interval_minutes == 0 {
            return Err(Error::config("quality.interval_minutes must be > 0"));
        }
        if !(0.0..=100.0).contains(&self.warn_below_pct) {
            return Err(Error::config(format!(
                "quality.warn_below_pct must be within [0, 100], got {}",
                self.warn_below_pct
            )));
        }
        if !(self.minor_max_missing < self.moderate_max_missing
            && self.moderate_max_missing < self.severe_max_missing)
        {
            return Err(Error::config(
                "quality severity thresholds must be strictly increasing",
            ));
        }
        Ok(())
    }
}
