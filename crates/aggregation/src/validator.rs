//! Completeness and continuity checks for aggregation buckets.

use crate::grouping::{local_date, Bucket};
use crate::mode::AggregationMode;
use barsmith_calendar::{ExchangeGroup, TradingCalendar};
use barsmith_core::{Error, Granularity, IntervalSpec, Result};
use chrono::NaiveDate;

/// Per-mode completeness and continuity rules.
#[derive(Clone, Copy)]
pub struct BucketValidator<'a> {
    mode: AggregationMode,
    source: Granularity,
    target: IntervalSpec,
    calendar: Option<&'a TradingCalendar>,
    group: ExchangeGroup,
}

impl<'a> BucketValidator<'a> {
    pub fn new(
        mode: AggregationMode,
        source: Granularity,
        target: IntervalSpec,
        calendar: Option<&'a TradingCalendar>,
        group: ExchangeGroup,
    ) -> Self {
        Self {
            mode,
            source,
            target,
            calendar,
            group,
        }
    }

    /// Source items a complete bucket holds. `None` when any count is valid.
    pub fn expected_count(&self) -> Option<usize> {
        match (self.mode, self.source) {
            (AggregationMode::FixedChunk, Granularity::Bars(source)) => {
                usize::try_from(self.target.seconds() / source.seconds()).ok()
            }
            _ => None,
        }
    }

    /// TimeWindow and Calendar buckets are always complete; FixedChunk
    /// buckets need exactly `target / source` items.
    pub fn is_complete(&self, bucket: &Bucket) -> bool {
        match self.mode {
            AggregationMode::TimeWindow | AggregationMode::Calendar => !bucket.is_empty(),
            AggregationMode::FixedChunk => self.expected_count() == Some(bucket.len()),
        }
    }

    /// Whether the bucket has no internal gaps.
    pub fn is_continuous(&self, bucket: &Bucket) -> Result<bool> {
        match self.mode {
            AggregationMode::TimeWindow => Ok(true),
            AggregationMode::FixedChunk => Ok(self.is_evenly_spaced(bucket)),
            AggregationMode::Calendar => self.is_trading_day_sequence(bucket),
        }
    }

    /// Consecutive items exactly one source interval apart.
    fn is_evenly_spaced(&self, bucket: &Bucket) -> bool {
        let Some(source) = self.source.interval() else {
            return false;
        };
        let step = source.seconds();
        bucket
            .items
            .windows(2)
            .all(|pair| pair[1].epoch_seconds() - pair[0].epoch_seconds() == step)
    }

    /// Consecutive distinct item dates are consecutive trading days.
    fn is_trading_day_sequence(&self, bucket: &Bucket) -> Result<bool> {
        let calendar = self.calendar.ok_or_else(|| Error::CalendarRequired {
            target: self.target.to_string(),
        })?;
        let tz = self.group.timezone();

        let mut dates: Vec<NaiveDate> = bucket.items.iter().map(|b| local_date(b, tz)).collect();
        dates.dedup();

        for pair in dates.windows(2) {
            let expected = calendar.next_trading_day_in(pair[0], 1, self.group)?;
            if pair[1] != expected {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
