//! Gap severity classification and ranking.

use barsmith_core::{Error, Gap, QualityConfig, Result};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity bucket of a gap by missing bar count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GapSeverity {
    Minor,
    Moderate,
    Severe,
    Critical,
}

impl GapSeverity {
    pub const fn as_str(self) -> &'static str {
        match self {
            GapSeverity::Minor => "minor",
            GapSeverity::Moderate => "moderate",
            GapSeverity::Severe => "severe",
            GapSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for GapSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive upper bounds on `missing_count` for each severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityThresholds {
    pub minor_max_missing: u32,
    pub moderate_max_missing: u32,
    pub severe_max_missing: u32,
}

impl SeverityThresholds {
    /// Thresholds must be strictly increasing.
    pub fn new(minor: u32, moderate: u32, severe: u32) -> Result<Self> {
        if !(minor < moderate && moderate < severe) {
            return Err(Error::config(format!(
                "severity thresholds must increase: {minor} < {moderate} < {severe}"
            )));
        }
        Ok(Self {
            minor_max_missing: minor,
            moderate_max_missing: moderate,
            severe_max_missing: severe,
        })
    }

    pub fn from_config(config: &QualityConfig) -> Result<Self> {
        Self::new(
            config.minor_max_missing,
            config.moderate_max_missing,
            config.severe_max_missing,
        )
    }

    pub fn classify(&self, missing_count: u32) -> GapSeverity {
        if missing_count <= self.minor_max_missing {
            GapSeverity::Minor
        } else if missing_count <= self.moderate_max_missing {
            GapSeverity::Moderate
        } else if missing_count <= self.severe_max_missing {
            GapSeverity::Severe
        } else {
            GapSeverity::Critical
        }
    }
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            minor_max_missing: 2,
            moderate_max_missing: 10,
            severe_max_missing: 30,
        }
    }
}

/// Missing share of the window in percent, in `[0, 100]`.
pub fn severity_score(gap: &Gap, expected_count: u64) -> f64 {
    if expected_count == 0 {
        return if gap.missing_count > 0 { 100.0 } else { 0.0 };
    }
    (100.0 * f64::from(gap.missing_count) / expected_count as f64).clamp(0.0, 100.0)
}

/// A gap with its score and severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedGap {
    pub gap: Gap,
    pub score: f64,
    pub severity: GapSeverity,
}

/// Score and order gaps: highest score first, earlier start on ties.
pub fn rank_gaps(
    gaps: &[Gap],
    expected_count: u64,
    thresholds: &SeverityThresholds,
) -> Vec<RankedGap> {
    let mut ranked: Vec<RankedGap> = gaps
        .iter()
        .map(|gap| RankedGap {
            gap: gap.clone(),
            score: severity_score(gap, expected_count),
            severity: thresholds.classify(gap.missing_count),
        })
        .collect();
    ranked.sort_by(|a, b| {
        OrderedFloat(b.score)
            .cmp(&OrderedFloat(a.score))
            .then(a.gap.start_time.cmp(&b.gap.start_time))
    });
    ranked
}
