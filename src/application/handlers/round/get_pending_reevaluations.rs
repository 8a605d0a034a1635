//! GetPendingReevaluationsHandler - what one evaluator still owes the current round.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::case::RoundState;
use crate::domain::consensus::RoundRequirements;
use crate::domain::evaluation::{EvaluationFilter, EvaluationKey};
use crate::domain::foundation::{CaseId, DomainError, UserId};
use crate::ports::{CaseRepository, EvaluationReader};

#[derive(Debug, Clone)]
pub struct GetPendingReevaluationsQuery {
    pub case_id: CaseId,
    pub user_id: UserId,
}

/// Keys the evaluator must still submit before the round can be analyzed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReevaluations {
    pub case_id: CaseId,
    pub user_id: UserId,
    pub round: u32,
    pub state: RoundState,
    /// Sorted. Empty once the evaluator is done or the round no longer accepts input.
    pub pending: Vec<EvaluationKey>,
    pub required_count: usize,
    pub submitted_count: usize,
}

#[derive(Debug, Clone)]
pub enum GetPendingReevaluationsError {
    CaseNotFound(CaseId),
    NotAnEvaluator { case_id: CaseId, user_id: UserId },
    Infrastructure(String),
}

impl std::fmt::Display for GetPendingReevaluationsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GetPendingReevaluationsError::CaseNotFound(id) => write!(f, "Case not found: {}", id),
            GetPendingReevaluationsError::NotAnEvaluator { case_id, user_id } => {
                write!(f, "{} is not an evaluator of case {}", user_id, case_id)
            }
            GetPendingReevaluationsError::Infrastructure(msg) => {
                write!(f, "Infrastructure error: {}", msg)
            }
        }
    }
}

impl std::error::Error for GetPendingReevaluationsError {}

impl From<DomainError> for GetPendingReevaluationsError {
    fn from(err: DomainError) -> Self {
        GetPendingReevaluationsError::Infrastructure(err.to_string())
    }
}

pub struct GetPendingReevaluationsHandler {
    case_repository: Arc<dyn CaseRepository>,
    evaluation_reader: Arc<dyn EvaluationReader>,
}

impl GetPendingReevaluationsHandler {
    pub fn new(
        case_repository: Arc<dyn CaseRepository>,
        evaluation_reader: Arc<dyn EvaluationReader>,
    ) -> Self {
        Self {
            case_repository,
            evaluation_reader,
        }
    }

    pub async fn handle(
        &self,
        query: GetPendingReevaluationsQuery,
    ) -> Result<PendingReevaluations, GetPendingReevaluationsError> {
        let case = self
            .case_repository
            .find_by_id(&query.case_id)
            .await?
            .ok_or(GetPendingReevaluationsError::CaseNotFound(query.case_id))?;

        if !case.scope().is_evaluator(&query.user_id) {
            return Err(GetPendingReevaluationsError::NotAnEvaluator {
                case_id: query.case_id,
                user_id: query.user_id,
            });
        }

        let round = case.current_round();
        let history = self
            .evaluation_reader
            .fetch_evaluations(&EvaluationFilter::for_case(query.case_id).up_to_round(round))
            .await?;
        let requirements = RoundRequirements::for_round(case.scope(), round, &history);

        let required: BTreeSet<&EvaluationKey> = requirements.for_user(&query.user_id).collect();
        let submitted_count = history
            .iter()
            .filter(|e| e.round == round && required.contains(&e.key()))
            .count();

        let pending = if case.state().is_awaiting() {
            requirements
                .missing(&history)
                .into_iter()
                .filter(|k| k.user_id == query.user_id)
                .collect()
        } else {
            Vec::new()
        };

        Ok(PendingReevaluations {
            case_id: query.case_id,
            round,
            state: case.state(),
            pending,
            required_count: required.len(),
            submitted_count,
            user_id: query.user_id,
        })
    }
}
