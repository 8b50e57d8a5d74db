//! Rebuilding missing bars from finer-grained source data.
//!
//! A gap is filled only when the source covers every timestamp the target
//! bars need. Partial source data never produces a bar; the outcome lists
//! the source gaps instead.

use crate::gaps::{expected_timestamps, group_missing_runs};
use barsmith_aggregation::grouping::{local_date, local_midnight};
use barsmith_aggregation::{detect_mode, Aggregator};
use barsmith_calendar::{ExchangeGroup, TradingCalendar};
use barsmith_core::{Bar, Error, Gap, Granularity, IntervalSpec, IntervalUnit, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Result of one fill attempt.
///
/// A refusal is `filled == false`, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillOutcome {
    /// The gap this attempt targeted.
    pub gap: Gap,
    pub filled: bool,
    /// Rebuilt target bars, empty when refused.
    pub bars: Vec<Bar>,
    /// Missing source data that blocked the fill.
    pub source_gaps: Vec<Gap>,
}

impl FillOutcome {
    fn refused(gap: &Gap, source_gaps: Vec<Gap>) -> Self {
        Self {
            gap: gap.clone(),
            filled: false,
            bars: Vec::new(),
            source_gaps,
        }
    }
}

/// Source data a fill needs, split into what is present and what is not.
struct Coverage {
    selected: Vec<Bar>,
    source_gaps: Vec<Gap>,
    required: usize,
}

/// Fills gaps by aggregating complete lower-granularity source bars.
#[derive(Clone, Copy)]
pub struct GapFiller<'a> {
    calendar: Option<&'a TradingCalendar>,
    group: ExchangeGroup,
}

impl<'a> GapFiller<'a> {
    /// A calendar is needed for day and week targets.
    pub fn new(calendar: Option<&'a TradingCalendar>) -> Self {
        let group = calendar
            .map(TradingCalendar::default_group)
            .unwrap_or(ExchangeGroup::UsEquity);
        Self { calendar, group }
    }

    pub fn with_exchange_group(mut self, group: ExchangeGroup) -> Self {
        self.group = group;
        self
    }

    /// Try to rebuild the target bars covering `gap`.
    pub fn fill_gap(
        &self,
        gap: &Gap,
        source_interval: IntervalSpec,
        target_interval: IntervalSpec,
        source_bars: &[Bar],
    ) -> Result<FillOutcome> {
        let source = Granularity::Bars(source_interval);
        let mode = detect_mode(source, target_interval)?;

        let symbol_bars: Vec<&Bar> = source_bars
            .iter()
            .filter(|b| b.symbol == gap.symbol)
            .collect();

        let coverage = if target_interval.is_calendar() {
            self.calendar_coverage(gap, source_interval, target_interval, &symbol_bars)?
        } else {
            intraday_coverage(gap, source_interval, &symbol_bars)
        };

        if coverage.required == 0 {
            tracing::debug!(
                symbol = %gap.symbol,
                start = %gap.start_time,
                "no source data expected in gap span"
            );
            return Ok(FillOutcome::refused(gap, Vec::new()));
        }
        if !coverage.source_gaps.is_empty() {
            tracing::info!(
                symbol = %gap.symbol,
                start = %gap.start_time,
                source_gaps = coverage.source_gaps.len(),
                "gap fill refused: source data incomplete"
            );
            return Ok(FillOutcome::refused(gap, coverage.source_gaps));
        }

        let aggregator = Aggregator::new(source, target_interval, mode, self.calendar)?
            .with_exchange_group(self.group);
        let mut bars = aggregator.aggregate(coverage.selected, true, true)?;
        if !target_interval.is_calendar() {
            bars.retain(|b| gap.contains(b.timestamp));
        }

        let filled = !bars.is_empty();
        tracing::info!(
            symbol = %gap.symbol,
            start = %gap.start_time,
            bars = bars.len(),
            filled,
            "gap fill attempted"
        );

        Ok(FillOutcome {
            gap: gap.clone(),
            filled,
            bars,
            source_gaps: Vec::new(),
        })
    }

    /// Fill each gap independently.
    pub fn fill_gaps(
        &self,
        gaps: &[Gap],
        source_interval: IntervalSpec,
        target_interval: IntervalSpec,
        source_bars: &[Bar],
    ) -> Result<Vec<FillOutcome>> {
        gaps.iter()
            .map(|gap| self.fill_gap(gap, source_interval, target_interval, source_bars))
            .collect()
    }

    fn calendar_coverage(
        &self,
        gap: &Gap,
        source: IntervalSpec,
        target: IntervalSpec,
        bars: &[&Bar],
    ) -> Result<Coverage> {
        let calendar = self.calendar.ok_or_else(|| Error::CalendarRequired {
            target: target.to_string(),
        })?;
        let tz = self.group.timezone();

        if gap.end_time <= gap.start_time {
            return Ok(Coverage {
                selected: Vec::new(),
                source_gaps: Vec::new(),
                required: 0,
            });
        }
        let first = gap.start_time.with_timezone(&tz).date_naive();
        let last = (gap.end_time - Duration::nanoseconds(1))
            .with_timezone(&tz)
            .date_naive();
        let days = calendar.trading_days_in_range_in(first, last, self.group);

        match (source.unit(), source.magnitude()) {
            (IntervalUnit::Second | IntervalUnit::Minute, _) => {
                let mut required: Vec<DateTime<Utc>> = Vec::new();
                for date in &days {
                    let session = calendar.get_trading_session(*date, self.group);
                    required.extend(expected_timestamps(
                        session.regular_open_at().with_timezone(&Utc),
                        session.regular_close_at().with_timezone(&Utc),
                        source.duration(),
                    ));
                }
                Ok(timestamp_coverage(&gap.symbol, &required, source.duration(), bars))
            }
            (IntervalUnit::Day, 1) => {
                let present: HashSet<NaiveDate> = bars.iter().map(|b| local_date(b, tz)).collect();
                let wanted: HashSet<NaiveDate> = days.iter().copied().collect();
                let selected = bars
                    .iter()
                    .filter(|b| wanted.contains(&local_date(b, tz)))
                    .map(|b| (*b).clone())
                    .collect();
                Ok(Coverage {
                    selected,
                    source_gaps: missing_day_runs(&gap.symbol, &days, &present, tz),
                    required: days.len(),
                })
            }
            _ => Err(Error::unsupported(
                source,
                target,
                "gap filling reads intraday or single-day source bars",
            )),
        }
    }
}

fn intraday_coverage(gap: &Gap, source: IntervalSpec, bars: &[&Bar]) -> Coverage {
    let required = expected_timestamps(gap.start_time, gap.end_time, source.duration());
    timestamp_coverage(&gap.symbol, &required, source.duration(), bars)
}

fn timestamp_coverage(
    symbol: &str,
    required: &[DateTime<Utc>],
    step: Duration,
    bars: &[&Bar],
) -> Coverage {
    let present: HashSet<DateTime<Utc>> = bars.iter().map(|b| b.timestamp).collect();
    let wanted: HashSet<DateTime<Utc>> = required.iter().copied().collect();
    let missing: Vec<DateTime<Utc>> = required
        .iter()
        .copied()
        .filter(|ts| !present.contains(ts))
        .collect();

    Coverage {
        selected: bars
            .iter()
            .filter(|b| wanted.contains(&b.timestamp))
            .map(|b| (*b).clone())
            .collect(),
        source_gaps: group_missing_runs(symbol, &missing, step),
        required: required.len(),
    }
}

/// Runs of consecutive trading days with no source bar.
fn missing_day_runs(
    symbol: &str,
    days: &[NaiveDate],
    present: &HashSet<NaiveDate>,
    tz: chrono_tz::Tz,
) -> Vec<Gap> {
    let mut gaps: Vec<Gap> = Vec::new();
    let mut run: Option<(NaiveDate, NaiveDate, u32)> = None;

    for date in days {
        if present.contains(date) {
            if let Some((start, end, count)) = run.take() {
                gaps.push(day_gap(symbol, start, end, count, tz));
            }
        } else {
            run = Some(match run {
                Some((start, _, count)) => (start, *date, count + 1),
                None => (*date, *date, 1),
            });
        }
    }
    if let Some((start, end, count)) = run {
        gaps.push(day_gap(symbol, start, end, count, tz));
    }
    gaps
}

fn day_gap(symbol: &str, first: NaiveDate, last: NaiveDate, count: u32, tz: chrono_tz::Tz) -> Gap {
    let end = last.succ_opt().unwrap_or(last);
    Gap::new(symbol, local_midnight(first, tz), local_midnight(end, tz), count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn i(s: &str) -> IntervalSpec {
        IntervalSpec::parse(s).unwrap()
    }

    fn ny(m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::America::New_York
            .with_ymd_and_hms(2024, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn minutes(from: DateTime<Utc>, count: i64) -> Vec<Bar> {
        (0..count)
            .map(|k| {
                let px = 100.0 + k as f64;
                Bar::new("AAPL", from + Duration::minutes(k), px, px + 1.0, px - 1.0, px, 10.0)
            })
            .collect()
    }

    fn calendar() -> TradingCalendar {
        TradingCalendar::us_equity(2024, 2024)
    }

    #[test]
    fn test_fill_intraday_gap_from_complete_source() {
        let filler = GapFiller::new(None);
        let gap = Gap::new("AAPL", ny(3, 4, 9, 30), ny(3, 4, 9, 40), 2);
        let source = minutes(ny(3, 4, 9, 25), 20);

        let outcome = filler.fill_gap(&gap, i("1m"), i("5m"), &source).unwrap();
        assert!(outcome.filled);
        assert_eq!(outcome.bars.len(), 2);
        assert_eq!(outcome.bars[0].timestamp, ny(3, 4, 9, 30));
        assert_eq!(outcome.bars[1].timestamp, ny(3, 4, 9, 35));
        assert!((outcome.bars[0].volume - 50.0).abs() < 1e-10);
        assert!(outcome.source_gaps.is_empty());
    }

    #[test]
    fn test_refuse_when_source_has_gaps() {
        let filler = GapFiller::new(None);
        let gap = Gap::new("AAPL", ny(3, 4, 9, 30), ny(3, 4, 9, 40), 2);
        let mut source = minutes(ny(3, 4, 9, 30), 10);
        source.remove(3);

        let outcome = filler.fill_gap(&gap, i("1m"), i("5m"), &source).unwrap();
        assert!(!outcome.filled);
        assert!(outcome.bars.is_empty());
        assert_eq!(outcome.source_gaps.len(), 1);
        assert_eq!(outcome.source_gaps[0].start_time, ny(3, 4, 9, 33));
        assert_eq!(outcome.source_gaps[0].missing_count, 1);
        assert_eq!(outcome.gap, gap);
    }

    #[test]
    fn test_other_symbols_do_not_count() {
        let filler = GapFiller::new(None);
        let gap = Gap::new("AAPL", ny(3, 4, 9, 30), ny(3, 4, 9, 35), 1);
        let mut source = minutes(ny(3, 4, 9, 30), 5);
        source[2].symbol = "MSFT".to_string();
        let outcome = filler.fill_gap(&gap, i("1m"), i("5m"), &source).unwrap();
        assert!(!outcome.filled);
    }

    #[test]
    fn test_fill_day_respects_early_close() {
        let cal = calendar();
        let filler = GapFiller::new(Some(&cal));
        let gap = Gap::new("AAPL", ny(7, 3, 0, 0), ny(7, 4, 0, 0), 1);
        let source = minutes(ny(7, 3, 9, 30), 210);

        let outcome = filler.fill_gap(&gap, i("1m"), i("1d"), &source).unwrap();
        assert!(outcome.filled);
        assert_eq!(outcome.bars.len(), 1);
        assert_eq!(outcome.bars[0].timestamp, ny(7, 3, 0, 0));
        assert!((outcome.bars[0].volume - 2100.0).abs() < 1e-10);
    }

    #[test]
    fn test_fill_days_skips_holiday() {
        let cal = calendar();
        let filler = GapFiller::new(Some(&cal));
        let gap = Gap::new("AAPL", ny(7, 3, 0, 0), ny(7, 6, 0, 0), 2);
        let mut source = minutes(ny(7, 3, 9, 30), 210);
        source.extend(minutes(ny(7, 5, 9, 30), 390));

        let outcome = filler.fill_gap(&gap, i("1m"), i("1d"), &source).unwrap();
        assert!(outcome.filled);
        assert_eq!(outcome.bars.len(), 2);
        assert_eq!(outcome.bars[1].timestamp, ny(7, 5, 0, 0));

        // Missing the last minute of Jul 5 blocks the whole fill.
        source.pop();
        let outcome = filler.fill_gap(&gap, i("1m"), i("1d"), &source).unwrap();
        assert!(!outcome.filled);
        assert_eq!(outcome.source_gaps[0].start_time, ny(7, 5, 15, 59));
    }

    #[test]
    fn test_fill_week_from_daily() {
        let cal = calendar();
        let filler = GapFiller::new(Some(&cal));
        let gap = Gap::new("SPY", ny(7, 1, 0, 0), ny(7, 8, 0, 0), 1);
        let day = |d: u32| Bar::new("SPY", ny(7, d, 0, 0), 1.0, 2.0, 0.5, 1.5, 100.0);

        let outcome = filler
            .fill_gap(&gap, i("1d"), i("1w"), &[day(1), day(2), day(3), day(5)])
            .unwrap();
        assert!(outcome.filled);
        assert_eq!(outcome.bars.len(), 1);
        assert!((outcome.bars[0].volume - 400.0).abs() < 1e-10);

        let outcome = filler
            .fill_gap(&gap, i("1d"), i("1w"), &[day(1), day(3), day(5)])
            .unwrap();
        assert!(!outcome.filled);
        assert_eq!(outcome.source_gaps.len(), 1);
        assert_eq!(outcome.source_gaps[0].start_time, ny(7, 2, 0, 0));
        assert_eq!(outcome.source_gaps[0].end_time, ny(7, 3, 0, 0));
    }

    #[test]
    fn test_holiday_only_span_is_refused() {
        let cal = calendar();
        let filler = GapFiller::new(Some(&cal));
        let gap = Gap::new("AAPL", ny(7, 4, 0, 0), ny(7, 5, 0, 0), 1);
        let outcome = filler.fill_gap(&gap, i("1m"), i("1d"), &[]).unwrap();
        assert!(!outcome.filled);
        assert!(outcome.source_gaps.is_empty());
    }

    #[test]
    fn test_day_target_requires_calendar() {
        let filler = GapFiller::new(None);
        let gap = Gap::new("AAPL", ny(7, 3, 0, 0), ny(7, 4, 0, 0), 1);
        assert!(matches!(
            filler.fill_gap(&gap, i("1m"), i("1d"), &[]),
            Err(Error::CalendarRequired { .. })
        ));
        assert!(filler.fill_gap(&gap, i("5m"), i("1m"), &[]).is_err());
    }

    #[test]
    fn test_fill_gaps_batch() {
        let filler = GapFiller::new(None);
        let gaps = vec![
            Gap::new("AAPL", ny(3, 4, 9, 30), ny(3, 4, 9, 35), 1),
            Gap::new("AAPL", ny(3, 4, 9, 45), ny(3, 4, 9, 50), 1),
        ];
        let source = minutes(ny(3, 4, 9, 30), 10);
        let outcomes = filler.fill_gaps(&gaps, i("1m"), i("5m"), &source).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].filled);
        assert!(!outcomes[1].filled);
        assert_eq!(outcomes[1].source_gaps[0].missing_count, 5);
    }
}
