//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers write through a per-case transaction; query handlers
//! read through the reader ports.

pub mod handlers;

pub use handlers::{
    // Round handlers
    AnalyzeRoundCommand, AnalyzeRoundError, AnalyzeRoundHandler, AnalyzeRoundResult,
    GetEvaluationProgressHandler, GetEvaluationProgressQuery, GetPendingReevaluationsHandler,
    GetPendingReevaluationsQuery, GetRoundResultsHandler, GetRoundResultsQuery, RoundSelection,
    // Evaluation handlers
    OpinionInput, SubmitEvaluationsCommand, SubmitEvaluationsHandler,
    // Case handlers
    UpdateThresholdsCommand, UpdateThresholdsHandler,
};
