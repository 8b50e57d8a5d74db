//! The OHLCV reduction shared by every aggregation mode.

use barsmith_core::{Bar, Error, Result};
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;

/// Fold a time-ordered bucket into one bar starting at `start`.
///
/// open = first open, high = max high, low = min low, close = last close,
/// volume = sum of volumes. The symbol is taken from the first item.
pub fn reduce(start: DateTime<Utc>, items: &[Bar]) -> Result<Bar> {
    let (Some(first), Some(last)) = (items.first(), items.last()) else {
        return Err(Error::EmptyAggregationGroup);
    };

    let mut high = OrderedFloat(f64::NEG_INFINITY);
    let mut low = OrderedFloat(f64::INFINITY);
    let mut volume = 0.0;
    for item in items {
        high = high.max(OrderedFloat(item.high));
        low = low.min(OrderedFloat(item.low));
        volume += item.volume;
    }

    Ok(Bar {
        symbol: first.symbol.clone(),
        timestamp: start,
        open: first.open,
        high: high.into_inner(),
        low: low.into_inner(),
        close: last.close,
        volume,
    })
}
