//! Aggregation pipeline: normalize, group, validate, reduce.

use crate::grouping::{group_by_calendar, group_by_fixed_chunk, group_by_time_window, Bucket};
use crate::mode::{detect_mode, AggregationMode};
use crate::reducer::reduce;
use crate::validator::BucketValidator;
use barsmith_calendar::{ExchangeGroup, TradingCalendar};
use barsmith_core::{
    normalize_to_bars, AggregationConfig, Bar, BarInput, Error, Granularity, IntervalSpec, Result,
};

/// Converts source-granularity items into target-interval bars.
///
/// Holds a borrowed calendar for calendar-mode grouping and continuity; the
/// aggregator itself carries no mutable state between calls.
#[derive(Clone)]
pub struct Aggregator<'a> {
    source: Granularity,
    target: IntervalSpec,
    mode: AggregationMode,
    calendar: Option<&'a TradingCalendar>,
    group: ExchangeGroup,
    config: AggregationConfig,
}

impl<'a> Aggregator<'a> {
    /// Create an aggregator for an explicit mode.
    pub fn new(
        source: Granularity,
        target: IntervalSpec,
        mode: AggregationMode,
        calendar: Option<&'a TradingCalendar>,
    ) -> Result<Self> {
        match mode {
            AggregationMode::Calendar => {
                if calendar.is_none() {
                    return Err(Error::CalendarRequired {
                        target: target.to_string(),
                    });
                }
                if source.is_tick() {
                    return Err(Error::TimeWindowOnlyForTicks {
                        target: target.to_string(),
                    });
                }
                if !target.is_calendar() {
                    return Err(Error::unsupported(
                        source,
                        target,
                        "calendar mode requires a day or week target",
                    ));
                }
            }
            AggregationMode::FixedChunk => {
                let Some(spec) = source.interval() else {
                    return Err(Error::TimeWindowOnlyForTicks {
                        target: target.to_string(),
                    });
                };
                if target.seconds() < spec.seconds() {
                    return Err(Error::SourceNotSmallerThanTarget {
                        source_interval: spec.to_string(),
                        target_interval: target.to_string(),
                    });
                }
                if target.seconds() % spec.seconds() != 0 {
                    return Err(Error::NotExactMultiple {
                        source_interval: spec.to_string(),
                        target_interval: target.to_string(),
                    });
                }
            }
            AggregationMode::TimeWindow => {
                if !target.is_time_window_target() {
                    return Err(Error::unsupported(
                        source,
                        target,
                        "time-window mode supports only 1s or 1m targets",
                    ));
                }
                if let Some(spec) = source.interval() {
                    if spec.seconds() >= target.seconds() {
                        return Err(Error::SourceNotSmallerThanTarget {
                            source_interval: spec.to_string(),
                            target_interval: target.to_string(),
                        });
                    }
                }
            }
        }

        let group = calendar
            .map(TradingCalendar::default_group)
            .unwrap_or(ExchangeGroup::UsEquity);

        Ok(Self {
            source,
            target,
            mode,
            calendar,
            group,
            config: AggregationConfig::default(),
        })
    }

    /// Create an aggregator using [`detect_mode`].
    pub fn detect(
        source: Granularity,
        target: IntervalSpec,
        calendar: Option<&'a TradingCalendar>,
    ) -> Result<Self> {
        let mode = detect_mode(source, target)?;
        Self::new(source, target, mode, calendar)
    }

    /// Resolve calendar periods in `group` instead of the calendar's default.
    pub fn with_exchange_group(mut self, group: ExchangeGroup) -> Self {
        self.group = group;
        self
    }

    /// Flags used by [`Aggregator::aggregate_default`].
    pub fn with_config(mut self, config: &AggregationConfig) -> Self {
        self.config = config.clone();
        self
    }

    pub fn source(&self) -> Granularity {
        self.source
    }

    pub fn target(&self) -> IntervalSpec {
        self.target
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    pub fn exchange_group(&self) -> ExchangeGroup {
        self.group
    }

    fn validator(&self) -> BucketValidator<'a> {
        BucketValidator::new(self.mode, self.source, self.target, self.calendar, self.group)
    }

    /// Assign bars to target windows, ascending by window start.
    pub fn group(&self, bars: Vec<Bar>) -> Result<Vec<Bucket>> {
        match self.mode {
            AggregationMode::TimeWindow => group_by_time_window(bars, self.target),
            AggregationMode::FixedChunk => group_by_fixed_chunk(bars, self.target),
            AggregationMode::Calendar => {
                let calendar = self.calendar.ok_or_else(|| Error::CalendarRequired {
                    target: self.target.to_string(),
                })?;
                group_by_calendar(bars, self.target, calendar, self.group)
            }
        }
    }

    /// Aggregate `items` into target bars.
    ///
    /// Buckets failing the enabled completeness or continuity check are
    /// skipped. Empty input yields empty output. Input must hold a single
    /// symbol.
    pub fn aggregate<I, T>(
        &self,
        items: I,
        require_complete: bool,
        check_continuity: bool,
    ) -> Result<Vec<Bar>>
    where
        I: IntoIterator<Item = T>,
        T: Into<BarInput>,
    {
        let bars = normalize_to_bars(items)?;
        if let Some(first) = bars.first() {
            if let Some(other) = bars.iter().find(|b| b.symbol != first.symbol) {
                return Err(Error::data(format!(
                    "mixed symbols in aggregation input: {} and {}",
                    first.symbol, other.symbol
                )));
            }
        }

        let validator = self.validator();
        let buckets = self.group(bars)?;
        let mut out = Vec::with_capacity(buckets.len());

        for bucket in buckets {
            if require_complete && !validator.is_complete(&bucket) {
                tracing::debug!(
                    start = %bucket.start,
                    count = bucket.len(),
                    expected = ?validator.expected_count(),
                    target = %self.target,
                    "skipping incomplete bucket"
                );
                continue;
            }
            if check_continuity && !validator.is_continuous(&bucket)? {
                tracing::debug!(
                    start = %bucket.start,
                    count = bucket.len(),
                    target = %self.target,
                    "skipping discontinuous bucket"
                );
                continue;
            }
            out.push(reduce(bucket.start, &bucket.items)?);
        }

        Ok(out)
    }

    /// Aggregate with the configured completeness and continuity flags.
    pub fn aggregate_default<I, T>(&self, items: I) -> Result<Vec<Bar>>
    where
        I: IntoIterator<Item = T>,
        T: Into<BarInput>,
    {
        self.aggregate(items, self.config.require_complete, self.config.check_continuity)
    }
}
