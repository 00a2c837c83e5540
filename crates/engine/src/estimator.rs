//! Understanding-level estimation from a learner's leveled history.

use scaffold_core::level::{Trend, UnderstandingLevel};
use serde::Serialize;

/// Most entries ever considered; older ones are ignored.
pub const MAX_LEVELS: usize = 10;

/// Size of the recent and earliest windows compared for the trend.
pub const TREND_WINDOW: usize = 3;

const TREND_THRESHOLD: f64 = 0.3;

/// The quantized state of a learner within one unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub level: UnderstandingLevel,
    pub average: f64,
    pub trend: Trend,
}

impl Default for Estimate {
    fn default() -> Self {
        Self {
            level: UnderstandingLevel::Beginner,
            average: 1.0,
            trend: Trend::Steady,
        }
    }
}

/// Quantize a most-recent-first level history.
///
/// Missing entries are skipped everywhere. The trend compares the first
/// [`TREND_WINDOW`] usable entries against the last ones (the windows overlap
/// on short histories) and stays steady below [`TREND_WINDOW`] entries.
pub fn estimate(levels: &[Option<UnderstandingLevel>]) -> Estimate {
    let usable: Vec<f64> = levels
        .iter()
        .take(MAX_LEVELS)
        .flatten()
        .map(|level| f64::from(level.ordinal()))
        .collect();

    if usable.is_empty() {
        return Estimate::default();
    }

    let average = mean(&usable);
    Estimate {
        level: UnderstandingLevel::from_average(average),
        average,
        trend: trend(&usable),
    }
}

fn trend(values: &[f64]) -> Trend {
    if values.len() < TREND_WINDOW {
        return Trend::Steady;
    }

    let recent = mean(&values[..TREND_WINDOW]);
    let earliest = mean(&values[values.len() - TREND_WINDOW..]);

    if recent - earliest > TREND_THRESHOLD {
        Trend::Improving
    } else if earliest - recent > TREND_THRESHOLD {
        Trend::NeedsReinforcement
    } else {
        Trend::Steady
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
