use barsmith_core::{Bar, Gap};
use barsmith_quality::{calculate_quality, detect_gaps, merge_overlapping_gaps};
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

fn arb_ts() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..2_000_000_000i64).prop_map(|s| DateTime::from_timestamp(s, 0).unwrap())
}

proptest! {
    #[test]
    fn quality_stays_within_bounds(
        start in arb_ts(),
        elapsed_secs in -100_000i64..1_000_000i64,
        actual in 0usize..100_000usize,
        interval in 1u32..240u32,
    ) {
        let now = start + Duration::seconds(elapsed_secs);
        let q = calculate_quality(start, now, actual, interval).unwrap();
        prop_assert!((0.0..=100.0).contains(&q));
        if elapsed_secs < i64::from(interval) * 60 {
            prop_assert_eq!(q, 100.0);
        }
    }

    #[test]
    fn gaps_account_for_every_missing_minute(
        present in proptest::collection::vec(any::<bool>(), 1..500),
    ) {
        let start = DateTime::from_timestamp(1_700_000_040, 0).unwrap();
        let bars: Vec<Bar> = present
            .iter()
            .enumerate()
            .filter(|(_, keep)| **keep)
            .map(|(k, _)| Bar::new("PROP", start + Duration::minutes(k as i64), 1.0, 1.0, 1.0, 1.0, 1.0))
            .collect();
        let end = start + Duration::minutes(present.len() as i64);

        let gaps = detect_gaps("PROP", start, end, &bars, 1).unwrap();
        let missing: u32 = gaps.iter().map(|g| g.missing_count).sum();
        prop_assert_eq!(missing as usize, present.iter().filter(|p| !**p).count());
        for gap in &gaps {
            prop_assert_eq!(gap.duration(), Duration::minutes(i64::from(gap.missing_count)));
            prop_assert!(bars.iter().all(|b| !gap.contains(b.timestamp)));
        }
        for pair in gaps.windows(2) {
            prop_assert!(pair[0].end_time < pair[1].start_time);
        }

        // Detected gaps never overlap, so merging leaves them unchanged.
        let merged = merge_overlapping_gaps(gaps.clone());
        prop_assert_eq!(merged, gaps);
    }

    #[test]
    fn merged_gaps_are_disjoint(
        spans in proptest::collection::vec((0i64..1_000i64, 1i64..50i64), 0..50),
    ) {
        let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let gaps: Vec<Gap> = spans
            .iter()
            .map(|(off, len)| {
                let s = base + Duration::minutes(*off);
                Gap::new("PROP", s, s + Duration::minutes(*len), *len as u32)
            })
            .collect();
        let total: u32 = gaps.iter().map(|g| g.missing_count).sum();

        let merged = merge_overlapping_gaps(gaps);
        for pair in merged.windows(2) {
            prop_assert!(pair[0].end_time < pair[1].start_time);
        }
        prop_assert_eq!(merged.iter().map(|g| g.missing_count).sum::<u32>(), total);
    }
}
