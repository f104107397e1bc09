//! smsguard Engine
//!
//! Combines independent risk signals into one score per message.
//!
//! The engine deduplicates a batch, fans every unique message out to the
//! applicable scoring providers, clamps and weights their scores according
//! to which providers produced a real signal, explains the resulting risk
//! tier and returns the records ordered by message text.

pub mod aggregator;
pub mod combiner;
pub mod dedup;
pub mod explainer;
pub mod orchestrator;

pub use aggregator::ResultAggregator;
pub use combiner::{clamp_score, Combination, ScoreCombiner};
pub use dedup::deduplicate;
pub use explainer::Explainer;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::orchestrator::{Orchestrator, OrchestratorBuilder};
    pub use smsguard_core::{BatchReport, InputRecord, OutputRecord, RiskTier};
    pub use smsguard_providers::{CancellationToken, ScoringConfig, ScoringProvider};
}
