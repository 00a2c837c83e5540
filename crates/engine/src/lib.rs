//! The scaffolding tutor pipeline.
//!
//! One chat cycle runs these stages in order:
//!
//! 1. **Match** the learner's message to a learning unit ([`matcher`])
//! 2. **Estimate** the learner's prior level in that unit from the log ([`estimator`])
//! 3. **Classify** the scaffolding strategy via the provider ([`classifier`])
//! 4. **Shape** the reply under the strategy's structural constraints ([`shaper`])
//! 5. **Append** the outcome to the conversation log ([`cycle`])
//!
//! Every stage that talks to a provider has a deterministic fallback, so a
//! cycle only fails when the log itself fails.

pub mod aggregator;
pub mod classifier;
pub mod cycle;
pub mod estimator;
pub mod matcher;
pub mod reply;
pub mod shaper;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use aggregator::{
    Confidence, HistoryAggregator, LearningReport, OverallStats, ScaffoldingShare, TimelineEntry,
    UnitProgress, WeaknessAnalysis, aggregate, recent_history, recent_levels, transcript,
};
pub use classifier::{ClassifierInput, DEGRADED_RATIONALE, ScaffoldingClassifier};
pub use cycle::ChatCycle;
pub use estimator::{Estimate, estimate};
pub use matcher::match_unit;
pub use shaper::{APOLOGY, ResponseShaper, ShapeInput, complete_sentences, condense, normalize_code_fences};
