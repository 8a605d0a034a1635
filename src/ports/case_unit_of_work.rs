//! Per-case transactional unit of work.
//!
//! Every write that depends on the case's round state runs inside a
//! [`CaseTransaction`]. Locking the case serializes writers of that case;
//! other cases are unaffected.
//!
//! Writes made through a transaction become visible only on
//! [`CaseTransaction::commit`]. Dropping the transaction without committing
//! discards them all.

use async_trait::async_trait;

use crate::domain::case::{Case, ThresholdSet};
use crate::domain::consensus::RoundResult;
use crate::domain::evaluation::{Evaluation, EvaluationFilter};
use crate::domain::foundation::{CaseId, DomainError, EvaluationId};

/// Starts case transactions.
#[async_trait]
pub trait CaseUnitOfWork: Send + Sync {
    /// Begin a new transaction.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` if the transaction cannot be opened
    async fn begin(&self) -> Result<Box<dyn CaseTransaction>, DomainError>;
}

/// One open transaction.
///
/// Callers lock the case first, then read and write.
#[async_trait]
pub trait CaseTransaction: Send {
    /// Load the case and hold its exclusive lock until commit or drop.
    ///
    /// Returns `None` if the case does not exist.
    async fn lock_case(&mut self, case_id: &CaseId) -> Result<Option<Case>, DomainError>;

    /// Filtered read that also sees this transaction's own pending writes.
    async fn fetch_evaluations(
        &mut self,
        filter: &EvaluationFilter,
    ) -> Result<Vec<Evaluation>, DomainError>;

    /// Insert or replace the evaluation for its (case, round, user, item) key.
    ///
    /// On replacement the stored record keeps its original ID. Returns the
    /// record as stored.
    async fn upsert_evaluation(&mut self, evaluation: &Evaluation)
        -> Result<Evaluation, DomainError>;

    /// Set the reevaluation flag of one evaluation.
    ///
    /// # Errors
    ///
    /// - `EvaluationNotFound` if no such evaluation exists
    async fn upsert_evaluation_flag(
        &mut self,
        evaluation_id: &EvaluationId,
        needs_reevaluation: bool,
    ) -> Result<(), DomainError>;

    /// Store the analysis snapshot of a round.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if the round already has a result
    async fn persist_round_result(&mut self, result: &RoundResult) -> Result<(), DomainError>;

    /// Move the case to `new_round`, awaiting evaluations.
    async fn advance_case_round(
        &mut self,
        case_id: &CaseId,
        new_round: u32,
    ) -> Result<(), DomainError>;

    /// Close the case at its current round.
    async fn close_case(&mut self, case_id: &CaseId) -> Result<(), DomainError>;

    /// Leave the case analyzed at its current round with no further round.
    async fn mark_case_stalled(&mut self, case_id: &CaseId) -> Result<(), DomainError>;

    /// Replace the case thresholds.
    async fn update_case_thresholds(
        &mut self,
        case_id: &CaseId,
        thresholds: &ThresholdSet,
    ) -> Result<(), DomainError>;

    /// Make every write of this transaction visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
