//! Gap detection and quality scoring over fixed-interval windows.

use barsmith_core::{Bar, Error, Gap, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Positive interval of `minutes`, or a config error.
pub fn interval_duration(minutes: u32) -> Result<Duration> {
    if minutes == 0 {
        return Err(Error::config("gap interval must be at least one minute"));
    }
    Ok(Duration::minutes(i64::from(minutes)))
}

/// Grid `start, start + step, ...` strictly before `end`.
pub fn expected_timestamps(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
) -> Vec<DateTime<Utc>> {
    let mut out = Vec::new();
    if step <= Duration::zero() {
        return out;
    }
    let mut ts = start;
    while ts < end {
        out.push(ts);
        ts += step;
    }
    out
}

/// Group ascending missing timestamps into maximal runs `step` apart.
///
/// Each run becomes one gap ending one `step` after its last timestamp.
pub fn group_missing_runs(symbol: &str, missing: &[DateTime<Utc>], step: Duration) -> Vec<Gap> {
    let mut gaps = Vec::new();
    let mut iter = missing.iter().copied();
    let Some(mut run_start) = iter.next() else {
        return gaps;
    };
    let mut run_last = run_start;
    let mut run_len: u32 = 1;

    for ts in iter {
        if ts - run_last == step {
            run_last = ts;
            run_len = run_len.saturating_add(1);
        } else {
            gaps.push(Gap::new(symbol, run_start, run_last + step, run_len));
            run_start = ts;
            run_last = ts;
            run_len = 1;
        }
    }
    gaps.push(Gap::new(symbol, run_start, run_last + step, run_len));
    gaps
}

/// Missing runs over `[session_start, current_time)` at `interval_minutes`.
///
/// Bars whose timestamps are not on the expected grid are ignored.
pub fn detect_gaps(
    symbol: &str,
    session_start: DateTime<Utc>,
    current_time: DateTime<Utc>,
    existing_bars: &[Bar],
    interval_minutes: u32,
) -> Result<Vec<Gap>> {
    let step = interval_duration(interval_minutes)?;
    let actual: HashSet<DateTime<Utc>> = existing_bars.iter().map(|b| b.timestamp).collect();
    let missing: Vec<DateTime<Utc>> = expected_timestamps(session_start, current_time, step)
        .into_iter()
        .filter(|ts| !actual.contains(ts))
        .collect();
    Ok(group_missing_runs(symbol, &missing, step))
}

/// `floor((current_time - session_start) / interval)`, zero when reversed.
pub fn expected_count(
    session_start: DateTime<Utc>,
    current_time: DateTime<Utc>,
    interval_minutes: u32,
) -> Result<u64> {
    let step = interval_duration(interval_minutes)?;
    let elapsed = current_time - session_start;
    if elapsed <= Duration::zero() {
        return Ok(0);
    }
    Ok((elapsed.num_seconds() / step.num_seconds()) as u64)
}

/// Percentage of expected bars present, clamped to `[0, 100]`.
///
/// Exactly 100 when no bars are expected yet.
pub fn calculate_quality(
    session_start: DateTime<Utc>,
    current_time: DateTime<Utc>,
    actual_count: usize,
    interval_minutes: u32,
) -> Result<f64> {
    let expected = expected_count(session_start, current_time, interval_minutes)?;
    Ok(quality_pct(actual_count as u64, expected))
}

pub(crate) fn quality_pct(actual: u64, expected: u64) -> f64 {
    if expected == 0 {
        return 100.0;
    }
    (100.0 * actual as f64 / expected as f64).clamp(0.0, 100.0)
}

/// Sort by (symbol, start) and merge gaps that touch or overlap.
///
/// Merged gaps sum their missing counts, take the latest end and keep the
/// highest retry count.
pub fn merge_overlapping_gaps(mut gaps: Vec<Gap>) -> Vec<Gap> {
    gaps.sort_by(|a, b| {
        a.symbol
            .cmp(&b.symbol)
            .then(a.start_time.cmp(&b.start_time))
    });

    let mut merged: Vec<Gap> = Vec::with_capacity(gaps.len());
    for gap in gaps {
        match merged.last_mut() {
            Some(running) if running.symbol == gap.symbol && gap.start_time <= running.end_time => {
                running.end_time = running.end_time.max(gap.end_time);
                running.missing_count = running.missing_count.saturating_add(gap.missing_count);
                running.retry_count = running.retry_count.max(gap.retry_count);
                running.last_retry = running.last_retry.max(gap.last_retry);
            }
            _ => merged.push(gap),
        }
    }
    merged
}
