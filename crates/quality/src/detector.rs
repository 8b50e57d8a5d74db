//! Configured gap detection and quality reports.

use crate::gaps::{
    detect_gaps, expected_count, expected_timestamps, interval_duration, quality_pct,
};
use crate::severity::{rank_gaps, GapSeverity, RankedGap, SeverityThresholds};
use barsmith_calendar::TradingSession;
use barsmith_core::{Bar, Error, Gap, QualityConfig, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Completeness summary for one symbol over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub symbol: String,
    /// Window start (inclusive).
    pub window_start: DateTime<Utc>,
    /// Window end (exclusive).
    pub window_end: DateTime<Utc>,
    /// Bars expected over the window.
    pub expected: u64,
    /// Expected bars actually present.
    pub actual: u64,
    /// `100 * actual / expected`, 100 when nothing is expected.
    pub quality_pct: f64,
    pub gaps: Vec<Gap>,
    /// Worst gap severity, `None` without gaps.
    pub worst_severity: Option<GapSeverity>,
}

impl QualityReport {
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn missing(&self) -> u64 {
        self.expected.saturating_sub(self.actual)
    }
}

/// Gap detector over a fixed bar interval.
#[derive(Debug, Clone)]
pub struct GapDetector {
    interval_minutes: u32,
    warn_below_pct: f64,
    thresholds: SeverityThresholds,
}

impl GapDetector {
    /// Detector with default warning and severity thresholds.
    pub fn new(interval_minutes: u32) -> Result<Self> {
        interval_duration(interval_minutes)?;
        Ok(Self {
            interval_minutes,
            warn_below_pct: 95.0,
            thresholds: SeverityThresholds::default(),
        })
    }

    pub fn from_config(config: &QualityConfig) -> Result<Self> {
        interval_duration(config.interval_minutes)?;
        if !(0.0..=100.0).contains(&config.warn_below_pct) {
            return Err(Error::config(format!(
                "quality.warn_below_pct must be within [0, 100], got {}",
                config.warn_below_pct
            )));
        }
        Ok(Self {
            interval_minutes: config.interval_minutes,
            warn_below_pct: config.warn_below_pct,
            thresholds: SeverityThresholds::from_config(config)?,
        })
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn thresholds(&self) -> &SeverityThresholds {
        &self.thresholds
    }

    /// Missing runs over `[session_start, current_time)`.
    pub fn detect_gaps(
        &self,
        symbol: &str,
        session_start: DateTime<Utc>,
        current_time: DateTime<Utc>,
        existing_bars: &[Bar],
    ) -> Result<Vec<Gap>> {
        detect_gaps(
            symbol,
            session_start,
            current_time,
            existing_bars,
            self.interval_minutes,
        )
    }

    /// Quality percentage in `[0, 100]`.
    pub fn calculate_quality(
        &self,
        session_start: DateTime<Utc>,
        current_time: DateTime<Utc>,
        actual_count: usize,
    ) -> Result<f64> {
        let expected = expected_count(session_start, current_time, self.interval_minutes)?;
        Ok(quality_pct(actual_count as u64, expected))
    }

    /// Regular-session window observed by `now`: `[open, min(now, close))`.
    ///
    /// `None` on non-trading days. Early closes end the window early.
    pub fn session_window(
        session: &TradingSession,
        now: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if !session.is_trading_day() {
            return None;
        }
        let open = session.regular_open_at().with_timezone(&Utc);
        let close = session.regular_close_at().with_timezone(&Utc);
        Some((open, now.min(close)))
    }

    /// Gaps inside the session's regular hours; empty on non-trading days.
    pub fn detect_session_gaps(
        &self,
        symbol: &str,
        session: &TradingSession,
        now: DateTime<Utc>,
        bars: &[Bar],
    ) -> Result<Vec<Gap>> {
        match Self::session_window(session, now) {
            Some((start, end)) => self.detect_gaps(symbol, start, end, bars),
            None => Ok(Vec::new()),
        }
    }

    pub fn severity(&self, gap: &Gap) -> GapSeverity {
        self.thresholds.classify(gap.missing_count)
    }

    pub fn rank(&self, gaps: &[Gap], expected_count: u64) -> Vec<RankedGap> {
        rank_gaps(gaps, expected_count, &self.thresholds)
    }

    /// Quality report over `[window_start, window_end)`.
    ///
    /// The window end is truncated to a whole number of intervals, so a
    /// partial trailing slot is neither expected nor reported as a gap.
    pub fn report(
        &self,
        symbol: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        bars: &[Bar],
    ) -> Result<QualityReport> {
        let step = interval_duration(self.interval_minutes)?;
        let expected = expected_count(window_start, window_end, self.interval_minutes)?;
        let slots = i32::try_from(expected)
            .map_err(|_| Error::data(format!("report window of {expected} intervals is too wide")))?;
        let window_end = window_start + step * slots;
        let present: HashSet<DateTime<Utc>> = bars.iter().map(|b| b.timestamp).collect();
        let actual = expected_timestamps(window_start, window_end, step)
            .iter()
            .filter(|ts| present.contains(ts))
            .count() as u64;

        let gaps = self.detect_gaps(symbol, window_start, window_end, bars)?;
        let worst_severity = gaps.iter().map(|g| self.severity(g)).max();
        let quality_pct = quality_pct(actual, expected);

        if quality_pct < self.warn_below_pct {
            tracing::warn!(
                symbol,
                quality_pct,
                expected,
                actual,
                gaps = gaps.len(),
                "data quality below threshold"
            );
        }

        Ok(QualityReport {
            symbol: symbol.to_string(),
            window_start,
            window_end,
            expected,
            actual,
            quality_pct,
            gaps,
            worst_severity,
        })
    }

    /// Quality report over the session's observed regular hours.
    pub fn session_report(
        &self,
        symbol: &str,
        session: &TradingSession,
        now: DateTime<Utc>,
        bars: &[Bar],
    ) -> Result<QualityReport> {
        let (start, end) = Self::session_window(session, now).unwrap_or_else(|| {
            let day = session.day_start_utc();
            (day, day)
        });
        self.report(symbol, start, end, bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barsmith_calendar::{ExchangeGroup, TradingCalendar};
    use chrono::{Duration, NaiveDate, TimeZone};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ny(y: i32, m: u32, day: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::America::New_York
            .with_ymd_and_hms(y, m, day, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn bars_every_minute(from: DateTime<Utc>, count: i64) -> Vec<Bar> {
        (0..count)
            .map(|i| Bar::new("AAPL", from + Duration::minutes(i), 1.0, 1.0, 1.0, 1.0, 1.0))
            .collect()
    }

    #[test]
    fn test_report_summarizes_gaps() {
        let detector = GapDetector::new(1).unwrap();
        let start = ny(2024, 3, 4, 9, 30);
        let mut bars = bars_every_minute(start, 10);
        bars.retain(|b| b.timestamp != start + Duration::minutes(3) && b.timestamp != start + Duration::minutes(4));

        let report = detector.report("AAPL", start, start + Duration::minutes(10), &bars).unwrap();
        assert_eq!(report.expected, 10);
        assert_eq!(report.actual, 8);
        assert_eq!(report.missing(), 2);
        assert!((report.quality_pct - 80.0).abs() < 1e-10);
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.worst_severity, Some(GapSeverity::Minor));
        assert!(!report.is_complete());
    }

    #[test]
    fn test_report_ignores_partial_trailing_interval() {
        let detector = GapDetector::new(1).unwrap();
        let start = ny(2024, 3, 4, 9, 30);
        let end = start + Duration::seconds(150);

        let report = detector.report("AAPL", start, end, &bars_every_minute(start, 2)).unwrap();
        assert_eq!(report.window_end, start + Duration::minutes(2));
        assert_eq!(report.expected, 2);
        assert_eq!(report.actual, 2);
        assert!(report.is_complete());
        assert_eq!(report.quality_pct, 100.0);

        let report = detector.report("AAPL", start, end, &bars_every_minute(start, 1)).unwrap();
        assert_eq!(report.actual, 1);
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].end_time, start + Duration::minutes(2));
        assert!((report.quality_pct - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_session_gaps_respect_early_close() {
        let cal = TradingCalendar::us_equity(2024, 2024);
        let session = cal.get_trading_session(d(2024, 7, 3), ExchangeGroup::UsEquity);
        let detector = GapDetector::new(1).unwrap();
        let open = ny(2024, 7, 3, 9, 30);

        // Full early-close session: 09:30 to 13:00.
        let bars = bars_every_minute(open, 210);
        let late = ny(2024, 7, 3, 18, 0);
        assert!(detector.detect_session_gaps("AAPL", &session, late, &bars).unwrap().is_empty());

        let report = detector.session_report("AAPL", &session, late, &bars).unwrap();
        assert_eq!(report.expected, 210);
        assert_eq!(report.quality_pct, 100.0);

        // Only the first hour arrived.
        let partial = bars_every_minute(open, 60);
        let gaps = detector.detect_session_gaps("AAPL", &session, late, &partial).unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].start_time, ny(2024, 7, 3, 10, 30));
        assert_eq!(gaps[0].end_time, ny(2024, 7, 3, 13, 0));
        assert_eq!(gaps[0].missing_count, 150);
        assert_eq!(detector.severity(&gaps[0]), GapSeverity::Critical);
    }

    #[test]
    fn test_session_gaps_bounded_by_now() {
        let cal = TradingCalendar::us_equity(2024, 2024);
        let session = cal.get_trading_session(d(2024, 3, 5), ExchangeGroup::UsEquity);
        let detector = GapDetector::new(1).unwrap();
        let now = ny(2024, 3, 5, 9, 35);
        let gaps = detector.detect_session_gaps("AAPL", &session, now, &[]).unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].missing_count, 5);

        let before_open = ny(2024, 3, 5, 8, 0);
        assert!(detector.detect_session_gaps("AAPL", &session, before_open, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_holiday_session_has_no_gaps() {
        let cal = TradingCalendar::us_equity(2024, 2024);
        let session = cal.get_trading_session(d(2024, 7, 4), ExchangeGroup::UsEquity);
        let detector = GapDetector::new(1).unwrap();
        let now = ny(2024, 7, 4, 17, 0);
        assert!(detector.detect_session_gaps("AAPL", &session, now, &[]).unwrap().is_empty());
        let report = detector.session_report("AAPL", &session, now, &[]).unwrap();
        assert_eq!(report.expected, 0);
        assert_eq!(report.quality_pct, 100.0);
    }

    #[test]
    fn test_from_config() {
        let config = QualityConfig {
            interval_minutes: 5,
            ..QualityConfig::default()
        };
        let detector = GapDetector::from_config(&config).unwrap();
        assert_eq!(detector.interval_minutes(), 5);

        let bad = QualityConfig {
            interval_minutes: 0,
            ..QualityConfig::default()
        };
        assert!(matches!(GapDetector::from_config(&bad), Err(Error::Config(_))));
    }
}
