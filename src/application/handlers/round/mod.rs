//! Round command and query handlers.

// Command handlers
mod analyze_round;

// Query handlers
mod get_evaluation_progress;
mod get_pending_reevaluations;
mod get_round_results;

pub use analyze_round::{
    AnalyzeRoundCommand, AnalyzeRoundError, AnalyzeRoundHandler, AnalyzeRoundResult,
};
pub use get_evaluation_progress::{
    EvaluationProgress, EvaluatorProgress, GetEvaluationProgressError,
    GetEvaluationProgressHandler, GetEvaluationProgressQuery, ProgressStatus,
};
pub use get_pending_reevaluations::{
    GetPendingReevaluationsError, GetPendingReevaluationsHandler, GetPendingReevaluationsQuery,
    PendingReevaluations,
};
pub use get_round_results::{
    GetRoundResultsError, GetRoundResultsHandler, GetRoundResultsQuery, GetRoundResultsResult,
    RoundSelection,
};
