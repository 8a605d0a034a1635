//! Evaluation command handlers.

mod submit_evaluations;

pub use submit_evaluations::{
    OpinionInput, SubmitEvaluationsCommand, SubmitEvaluationsError, SubmitEvaluationsHandler,
    SubmitEvaluationsResult,
};
