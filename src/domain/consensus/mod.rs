//! Consensus module - the pure round convergence engine.
//!
//! Nothing here touches persistence. Callers load a case and its evaluation
//! history, run [`RoundEngine::analyze`], then persist what it returns.

mod aggregator;
mod engine;
mod evaluator;
mod marker;
mod requirements;
mod round_result;

pub use aggregator::{ConsensusAggregator, ItemConsensus, OpinionDistance, OpinionPool};
pub use engine::{IncompleteRound, RoundEngine, RoundOutcome};
pub use evaluator::{ConvergenceEvaluator, ItemAssessment, RoundAnalysis, RoundMetrics};
pub use marker::{FlagUpdate, ReevaluationMarker};
pub use requirements::RoundRequirements;
pub use round_result::RoundResult;
