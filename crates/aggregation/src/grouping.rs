//! Window assignment for the three aggregation modes.
//!
//! Every strategy returns buckets in ascending window-start order with
//! their items sorted by timestamp.

use barsmith_calendar::{localize, ExchangeGroup, TradingCalendar};
use barsmith_core::{Bar, Error, IntervalSpec, IntervalUnit, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;

/// Source items assigned to one target window.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Window start (inclusive).
    pub start: DateTime<Utc>,
    /// Items in timestamp order.
    pub items: Vec<Bar>,
}

impl Bucket {
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Round each timestamp down to a `1s` or `1m` boundary.
pub fn group_by_time_window(bars: Vec<Bar>, target: IntervalSpec) -> Result<Vec<Bucket>> {
    if !target.is_time_window_target() {
        return Err(Error::unsupported(
            "tick",
            target,
            "time-window grouping supports only 1s or 1m",
        ));
    }
    group_by_epoch(bars, target.seconds())
}

/// Chunk by `floor(epoch_seconds / chunk) * chunk`, `chunk = target.seconds()`.
///
/// Buckets align to absolute time, not to the first observation: a 5m chunk
/// always starts on a minute divisible by five.
pub fn group_by_fixed_chunk(bars: Vec<Bar>, target: IntervalSpec) -> Result<Vec<Bucket>> {
    group_by_epoch(bars, target.seconds())
}

fn group_by_epoch(mut bars: Vec<Bar>, step: i64) -> Result<Vec<Bucket>> {
    bars.sort_by_key(|b| b.timestamp);
    let mut buckets: BTreeMap<i64, Vec<Bar>> = BTreeMap::new();
    for bar in bars {
        let secs = bar.epoch_seconds();
        let key = secs - secs.rem_euclid(step);
        buckets.entry(key).or_default().push(bar);
    }

    buckets
        .into_iter()
        .map(|(key, items)| {
            let start = DateTime::from_timestamp(key, 0)
                .ok_or_else(|| Error::data(format!("bucket start {key}s is out of range")))?;
            Ok(Bucket { start, items })
        })
        .collect()
}

/// Group by trading-calendar periods in the exchange group's timezone.
///
/// A `1d` target buckets by local date, so a weekend or holiday bar gets its
/// own bucket. An N-day target counts trading days from the first item's
/// date; weekends and holidays never open a period and fold into the
/// preceding one.
/// Week targets bucket by ISO week; an N-week target counts weeks from the
/// first item's week.
pub fn group_by_calendar(
    bars: Vec<Bar>,
    target: IntervalSpec,
    calendar: &TradingCalendar,
    group: ExchangeGroup,
) -> Result<Vec<Bucket>> {
    match target.unit() {
        IntervalUnit::Day if target.magnitude() == 1 => {
            Ok(group_by_local_date(bars, group.timezone()))
        }
        IntervalUnit::Day => group_by_trading_days(bars, target.magnitude(), calendar, group),
        IntervalUnit::Week => group_by_weeks(bars, target.magnitude(), group.timezone()),
        IntervalUnit::Second | IntervalUnit::Minute => Err(Error::unsupported(
            "bars",
            target,
            "calendar grouping supports only day or week targets",
        )),
    }
}

/// Local calendar date of `bar` in `tz`.
pub fn local_date(bar: &Bar, tz: Tz) -> NaiveDate {
    bar.timestamp.with_timezone(&tz).date_naive()
}

/// Local midnight of `date` in `tz`, as a UTC instant.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    localize(date, NaiveTime::MIN, tz).with_timezone(&Utc)
}

fn group_by_local_date(mut bars: Vec<Bar>, tz: Tz) -> Vec<Bucket> {
    bars.sort_by_key(|b| b.timestamp);
    let mut buckets: BTreeMap<NaiveDate, Vec<Bar>> = BTreeMap::new();
    for bar in bars {
        buckets.entry(local_date(&bar, tz)).or_default().push(bar);
    }
    buckets
        .into_iter()
        .map(|(date, items)| Bucket {
            start: local_midnight(date, tz),
            items,
        })
        .collect()
}

fn group_by_trading_days(
    mut bars: Vec<Bar>,
    days: u32,
    calendar: &TradingCalendar,
    group: ExchangeGroup,
) -> Result<Vec<Bucket>> {
    let tz = group.timezone();
    bars.sort_by_key(|b| b.timestamp);

    let mut buckets: BTreeMap<u64, (NaiveDate, Vec<Bar>)> = BTreeMap::new();
    let mut prev: Option<NaiveDate> = None;
    let mut ordinal: u64 = 0;

    for bar in bars {
        let date = local_date(&bar, tz);
        if let Some(prev_date) = prev {
            if date > prev_date {
                let after = prev_date
                    .succ_opt()
                    .ok_or_else(|| Error::data(format!("date overflow after {prev_date}")))?;
                ordinal += calendar.trading_days_in_range_in(after, date, group).len() as u64;
            }
        }
        prev = Some(date);

        let key = ordinal / u64::from(days);
        buckets
            .entry(key)
            .or_insert_with(|| (date, Vec::new()))
            .1
            .push(bar);
    }

    Ok(buckets
        .into_values()
        .map(|(first_date, items)| Bucket {
            start: local_midnight(first_date, tz),
            items,
        })
        .collect())
}

fn group_by_weeks(mut bars: Vec<Bar>, weeks: u32, tz: Tz) -> Result<Vec<Bucket>> {
    bars.sort_by_key(|b| b.timestamp);
    let Some(first) = bars.first() else {
        return Ok(Vec::new());
    };
    let anchor = week_monday(local_date(first, tz))?;
    let period_days = i64::from(weeks) * 7;

    let mut buckets: BTreeMap<i64, Vec<Bar>> = BTreeMap::new();
    for bar in bars {
        let monday = week_monday(local_date(&bar, tz))?;
        let key = (monday - anchor).num_days().div_euclid(period_days);
        buckets.entry(key).or_default().push(bar);
    }

    buckets
        .into_iter()
        .map(|(key, items)| {
            let start_date = anchor
                .checked_add_signed(Duration::days(key * period_days))
                .ok_or_else(|| Error::data(format!("week period {key} is out of range")))?;
            Ok(Bucket {
                start: local_midnight(start_date, tz),
                items,
            })
        })
        .collect()
}

/// Monday of the ISO week containing `date`.
pub fn week_monday(date: NaiveDate) -> Result<NaiveDate> {
    let offset = i64::from(date.weekday().num_days_from_monday());
    date.checked_sub_signed(Duration::days(offset))
        .ok_or_else(|| Error::data(format!("no ISO week start for {date}")))
}
