//! Tukey-fence outlier thresholds from quartiles.

use serde::{Deserialize, Serialize};

use crate::distribution::{Distribution, Quartiles};
use crate::types::Direction;

/// Fence multiplier for an ordinary outlier.
pub const ORDINARY_FENCE: f64 = 1.5;
/// Fence multiplier for an extreme outlier.
pub const EXTREME_FENCE: f64 = 3.0;

/// The two direction-specific outlier fences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "direction")]
pub enum Fences {
    #[serde(rename = "high-is-bad")]
    High { high: f64, very_high: f64 },
    #[serde(rename = "low-is-bad")]
    Low { low: f64, very_low: f64 },
}

/// Quartiles plus outlier fences for one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub fences: Fences,
}

impl ThresholdSet {
    pub fn direction(&self) -> Direction {
        match self.fences {
            Fences::High { .. } => Direction::HighIsBad,
            Fences::Low { .. } => Direction::LowIsBad,
        }
    }

    /// Column values in output order, keyed as in `Direction::columns`.
    pub fn columns(&self) -> [(&'static str, f64); 5] {
        let [c1, c2, c3, c4, c5] = self.direction().columns();
        let (outer, extreme) = match self.fences {
            Fences::High { high, very_high } => (high, very_high),
            Fences::Low { low, very_low } => (low, very_low),
        };
        [
            (c1, self.q1),
            (c2, self.median),
            (c3, self.q3),
            (c4, outer),
            (c5, extreme),
        ]
    }
}

/// Result of the threshold engine: fences, or an explicit absence of data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ThresholdOutcome {
    NoData { direction: Direction },
    Computed(ThresholdSet),
}

impl ThresholdOutcome {
    pub fn direction(&self) -> Direction {
        match self {
            ThresholdOutcome::NoData { direction } => *direction,
            ThresholdOutcome::Computed(set) => set.direction(),
        }
    }

    pub fn thresholds(&self) -> Option<&ThresholdSet> {
        match self {
            ThresholdOutcome::NoData { .. } => None,
            ThresholdOutcome::Computed(set) => Some(set),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, ThresholdOutcome::NoData { .. })
    }
}

/// Compute fences for a distribution. No data in, no data out.
pub fn compute_thresholds(distribution: &Distribution, direction: Direction) -> ThresholdOutcome {
    match distribution {
        Distribution::NoData => ThresholdOutcome::NoData { direction },
        Distribution::Quartiles(quartiles) => {
            ThresholdOutcome::Computed(fences_for(quartiles, direction))
        }
    }
}

/// Outlier fences at 1.5 and 3.0 IQR beyond the relevant quartile.
///
/// Low fences are clamped at zero: these metrics are never negative.
pub fn fences_for(quartiles: &Quartiles, direction: Direction) -> ThresholdSet {
    let iqr = quartiles.iqr();
    let fences = match direction {
        Direction::HighIsBad => Fences::High {
            high: quartiles.q3 + ORDINARY_FENCE * iqr,
            very_high: quartiles.q3 + EXTREME_FENCE * iqr,
        },
        Direction::LowIsBad => Fences::Low {
            low: (quartiles.q1 - ORDINARY_FENCE * iqr).max(0.0),
            very_low: (quartiles.q1 - EXTREME_FENCE * iqr).max(0.0),
        },
    };
    ThresholdSet {
        q1: quartiles.q1,
        median: quartiles.median,
        q3: quartiles.q3,
        fences,
    }
}
