//! GetEvaluationProgressHandler - per-evaluator progress on the current round.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::case::RoundState;
use crate::domain::consensus::RoundRequirements;
use crate::domain::evaluation::EvaluationFilter;
use crate::domain::foundation::{CaseId, DomainError, UserId};
use crate::ports::{CaseRepository, EvaluationReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    fn from_counts(submitted: usize, required: usize) -> Self {
        if submitted >= required {
            ProgressStatus::Completed
        } else if submitted == 0 {
            ProgressStatus::NotStarted
        } else {
            ProgressStatus::InProgress
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorProgress {
    pub user_id: UserId,
    pub status: ProgressStatus,
    pub submitted: usize,
    pub required: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationProgress {
    pub case_id: CaseId,
    pub round: u32,
    pub state: RoundState,
    /// In scope order.
    pub evaluators: Vec<EvaluatorProgress>,
    /// Every required opinion of the round is in.
    pub ready_for_analysis: bool,
}

#[derive(Debug, Clone)]
pub struct GetEvaluationProgressQuery {
    pub case_id: CaseId,
}

#[derive(Debug, Clone)]
pub enum GetEvaluationProgressError {
    CaseNotFound(CaseId),
    Infrastructure(String),
}

impl std::fmt::Display for GetEvaluationProgressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GetEvaluationProgressError::CaseNotFound(id) => write!(f, "Case not found: {}", id),
            GetEvaluationProgressError::Infrastructure(msg) => {
                write!(f, "Infrastructure error: {}", msg)
            }
        }
    }
}

impl std::error::Error for GetEvaluationProgressError {}

impl From<DomainError> for GetEvaluationProgressError {
    fn from(err: DomainError) -> Self {
        GetEvaluationProgressError::Infrastructure(err.to_string())
    }
}

pub struct GetEvaluationProgressHandler {
    case_repository: Arc<dyn CaseRepository>,
    evaluation_reader: Arc<dyn EvaluationReader>,
}

impl GetEvaluationProgressHandler {
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
        query: GetEvaluationProgressQuery,
    ) -> Result<EvaluationProgress, GetEvaluationProgressError> {
        let case = self
            .case_repository
            .find_by_id(&query.case_id)
            .await?
            .ok_or(GetEvaluationProgressError::CaseNotFound(query.case_id))?;

        let round = case.current_round();
        let history = self
            .evaluation_reader
            .fetch_evaluations(&EvaluationFilter::for_case(query.case_id).up_to_round(round))
            .await?;
        let requirements = RoundRequirements::for_round(case.scope(), round, &history);
        let missing = requirements.missing(&history);

        let evaluators = case
            .scope()
            .evaluators()
            .iter()
            .map(|user_id| {
                let required = requirements.for_user(user_id).count();
                let outstanding = missing.iter().filter(|k| &k.user_id == user_id).count();
                let submitted = required - outstanding;
                EvaluatorProgress {
                    user_id: user_id.clone(),
                    status: ProgressStatus::from_counts(submitted, required),
                    submitted,
                    required,
                }
            })
            .collect();

        Ok(EvaluationProgress {
            case_id: query.case_id,
            round,
            state: case.state(),
            evaluators,
            ready_for_analysis: case.state().is_awaiting() && missing.is_empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryDelphiStore;
    use crate::domain::case::{Case, CaseScope, ThresholdSet};
    use crate::domain::evaluation::{Evaluation, ItemKey};
    use crate::domain::foundation::{CriterionId, TechnologyId};
    use crate::domain::fuzzy::FuzzyVector;
    use crate::ports::CaseUnitOfWork;

    fn user(name: &str) -> UserId {
        UserId::new(name).unwrap()
    }

    async fn seeded(answers: &[(&str, usize)]) -> (Arc<InMemoryDelphiStore>, CaseId) {
        let store = Arc::new(InMemoryDelphiStore::new());
        let c = CriterionId::new();
        let scope = CaseScope::new(
            vec![user("ana"), user("bo"), user("cy")],
            vec![c],
            vec![TechnologyId::new(), TechnologyId::new()],
        );
        let items: Vec<ItemKey> = scope.items();
        let case = Case::new(CaseId::new(), "Solar".to_string(), scope, ThresholdSet::default())
            .unwrap();
        let case_id = case.id();
        store.save(&case).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.lock_case(&case_id).await.unwrap();
        for (who, count) in answers {
            for item in items.iter().take(*count) {
                let e = Evaluation::new(case_id, 1, user(who), *item, FuzzyVector::new(0.1, 0.3, 0.5), 3.0);
                tx.upsert_evaluation(&e).await.unwrap();
            }
        }
        tx.commit().await.unwrap();
        (store, case_id)
    }

    #[test]
    fn status_follows_counts() {
        assert_eq!(ProgressStatus::from_counts(0, 3), ProgressStatus::NotStarted);
        assert_eq!(ProgressStatus::from_counts(2, 3), ProgressStatus::InProgress);
        assert_eq!(ProgressStatus::from_counts(3, 3), ProgressStatus::Completed);
        assert_eq!(ProgressStatus::from_counts(0, 0), ProgressStatus::Completed);
    }

    #[tokio::test]
    async fn reports_each_evaluator_in_scope_order() {
        let (store, case_id) = seeded(&[("ana", 3), ("bo", 1)]).await;
        let handler = GetEvaluationProgressHandler::new(store.clone(), store);

        let progress = handler
            .handle(GetEvaluationProgressQuery { case_id })
            .await
            .unwrap();

        let statuses: Vec<(String, ProgressStatus, usize)> = progress
            .evaluators
            .iter()
            .map(|p| (p.user_id.to_string(), p.status, p.submitted))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("ana".to_string(), ProgressStatus::Completed, 3),
                ("bo".to_string(), ProgressStatus::InProgress, 1),
                ("cy".to_string(), ProgressStatus::NotStarted, 0),
            ]
        );
        assert!(progress.evaluators.iter().all(|p| p.required == 3));
        assert!(!progress.ready_for_analysis);
    }

    #[tokio::test]
    async fn full_panel_is_ready_for_analysis() {
        let (store, case_id) = seeded(&[("ana", 3), ("bo", 3), ("cy", 3)]).await;
        let handler = GetEvaluationProgressHandler::new(store.clone(), store);

        let progress = handler
            .handle(GetEvaluationProgressQuery { case_id })
            .await
            .unwrap();
        assert!(progress.ready_for_analysis);
        assert_eq!(progress.state, RoundState::AwaitingEvaluations(1));
    }

    #[tokio::test]
    async fn unknown_case_is_not_found() {
        let store = Arc::new(InMemoryDelphiStore::new());
        let handler = GetEvaluationProgressHandler::new(store.clone(), store);
        let err = handler
            .handle(GetEvaluationProgressQuery { case_id: CaseId::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, GetEvaluationProgressError::CaseNotFound(_)));
    }
}
