//! Aggregation mode selection.

use barsmith_core::{Error, Granularity, IntervalSpec, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How source items are assigned to target windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationMode {
    /// Round timestamps down to a 1s/1m boundary. Used for tick input.
    TimeWindow,
    /// Fixed-size chunks aligned to absolute epoch boundaries.
    FixedChunk,
    /// Calendar days or ISO weeks, resolved through the trading calendar.
    Calendar,
}

impl AggregationMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            AggregationMode::TimeWindow => "time_window",
            AggregationMode::FixedChunk => "fixed_chunk",
            AggregationMode::Calendar => "calendar",
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical upgrade ladder searched by [`get_supported_targets`].
pub const TARGET_LADDER: [&str; 17] = [
    "1s", "5s", "10s", "15s", "30s", "1m", "2m", "3m", "5m", "10m", "15m", "30m", "60m", "120m",
    "240m", "1d", "1w",
];

/// Select the grouping strategy for `source -> target`.
///
/// Rules apply in order: tick input is time-window only; the target must be
/// strictly longer; day/week targets are calendar; same-unit targets must be
/// an exact magnitude multiple; cross-unit targets must be an exact multiple
/// in seconds.
pub fn detect_mode(source: Granularity, target: IntervalSpec) -> Result<AggregationMode> {
    let source = match source {
        Granularity::Tick => {
            if target.is_time_window_target() {
                return Ok(AggregationMode::TimeWindow);
            }
            return Err(Error::unsupported(
                source,
                target,
                "tick input aggregates only to 1s or 1m",
            ));
        }
        Granularity::Bars(spec) => spec,
    };

    if target.seconds() <= source.seconds() {
        return Err(Error::SourceNotSmallerThanTarget {
            source_interval: source.to_string(),
            target_interval: target.to_string(),
        });
    }

    if target.is_calendar() {
        return Ok(AggregationMode::Calendar);
    }

    if source.unit() == target.unit() {
        if target.magnitude() % source.magnitude() != 0 {
            return Err(Error::NotExactMultiple {
                source_interval: source.to_string(),
                target_interval: target.to_string(),
            });
        }
        return Ok(AggregationMode::FixedChunk);
    }

    if target.seconds() % source.seconds() == 0 {
        Ok(AggregationMode::FixedChunk)
    } else {
        Err(Error::unsupported(
            source,
            target,
            format!(
                "{}s is not an exact multiple of {}s",
                target.seconds(),
                source.seconds()
            ),
        ))
    }
}

/// Targets from the canonical ladder reachable from `source`, ascending.
pub fn get_supported_targets(source: Granularity) -> Vec<IntervalSpec> {
    TARGET_LADDER
        .iter()
        .filter_map(|s| IntervalSpec::parse(s).ok())
        .filter(|target| detect_mode(source, *target).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(s: &str) -> Granularity {
        Granularity::parse(s).unwrap()
    }

    fn i(s: &str) -> IntervalSpec {
        IntervalSpec::parse(s).unwrap()
    }

    #[test]
    fn test_detect_mode_scenarios() {
        assert_eq!(detect_mode(g("1d"), i("1w")).unwrap(), AggregationMode::Calendar);
        assert_eq!(detect_mode(g("1m"), i("5m")).unwrap(), AggregationMode::FixedChunk);
        assert_eq!(detect_mode(g("tick"), i("1s")).unwrap(), AggregationMode::TimeWindow);
        assert_eq!(detect_mode(g("tick"), i("1m")).unwrap(), AggregationMode::TimeWindow);
        assert!(matches!(
            detect_mode(g("1m"), i("1s")),
            Err(Error::SourceNotSmallerThanTarget { .. })
        ));
    }

    #[test]
    fn test_detect_mode_rejections() {
        assert!(matches!(
            detect_mode(g("tick"), i("5m")),
            Err(Error::UnsupportedConversion { .. })
        ));
        assert!(matches!(
            detect_mode(g("1m"), i("1m")),
            Err(Error::SourceNotSmallerThanTarget { .. })
        ));
        assert!(matches!(
            detect_mode(g("2m"), i("5m")),
            Err(Error::NotExactMultiple { .. })
        ));
        assert!(matches!(
            detect_mode(g("7s"), i("1m")),
            Err(Error::UnsupportedConversion { .. })
        ));
    }

    #[test]
    fn test_cross_unit_and_calendar_targets() {
        assert_eq!(detect_mode(g("30s"), i("1m")).unwrap(), AggregationMode::FixedChunk);
        assert_eq!(detect_mode(g("15s"), i("60m")).unwrap(), AggregationMode::FixedChunk);
        assert_eq!(detect_mode(g("1m"), i("1d")).unwrap(), AggregationMode::Calendar);
        assert_eq!(detect_mode(g("5m"), i("2w")).unwrap(), AggregationMode::Calendar);
    }

    #[test]
    fn test_supported_targets() {
        let names = |source: &str| -> Vec<String> {
            get_supported_targets(g(source))
                .into_iter()
                .map(|t| t.to_string())
                .collect()
        };
        assert_eq!(names("tick"), vec!["1s", "1m"]);
        assert_eq!(
            names("5m"),
            vec!["10m", "15m", "30m", "60m", "120m", "240m", "1d", "1w"]
        );
        assert_eq!(names("1d"), vec!["1w"]);
        assert!(names("1w").is_empty());
    }
}
