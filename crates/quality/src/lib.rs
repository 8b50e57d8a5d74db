//! Data quality for the barsmith engine.
//!
//! This crate handles:
//! - Gap detection against an expected bar grid
//! - Quality scoring and reports
//! - Gap severity classification and ranking
//! - Filling gaps from complete lower-granularity data

pub mod detector;
pub mod filler;
pub mod gaps;
pub mod severity;

pub use detector::{GapDetector, QualityReport};
pub use filler::{FillOutcome, GapFiller};
pub use gaps::{calculate_quality, detect_gaps, merge_overlapping_gaps};
pub use severity::{rank_gaps, severity_score, GapSeverity, RankedGap, SeverityThresholds};
