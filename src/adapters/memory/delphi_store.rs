//! In-memory store for cases, evaluations and round results.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::case::{Case, RoundState, ThresholdSet};
use crate::domain::consensus::RoundResult;
use crate::domain::evaluation::{Evaluation, EvaluationFilter, EvaluationKey};
use crate::domain::foundation::{CaseId, DomainError, ErrorCode, EvaluationId, Timestamp};
use crate::ports::{
    CaseRepository, CaseTransaction, CaseUnitOfWork, EvaluationReader, RoundResultReader,
};

/// Everything stored for one case.
#[derive(Debug, Clone)]
struct CaseData {
    case: Case,
    evaluations: BTreeMap<(u32, EvaluationKey), Evaluation>,
    results: BTreeMap<u32, RoundResult>,
}

impl CaseData {
    fn new(case: Case) -> Self {
        Self {
            case,
            evaluations: BTreeMap::new(),
            results: BTreeMap::new(),
        }
    }
}

/// Shared in-memory store.
///
/// Cloning is cheap and every clone sees the same data.
#[derive(Clone, Default)]
pub struct InMemoryDelphiStore {
    cases: Arc<RwLock<HashMap<CaseId, CaseData>>>,
    case_locks: Arc<Mutex<HashMap<CaseId, Arc<Mutex<()>>>>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryDelphiStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following commit fail with `DatabaseError` (for tests).
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    async fn case_lock(&self, case_id: CaseId) -> Arc<Mutex<()>> {
        let mut locks = self.case_locks.lock().await;
        locks.entry(case_id).or_default().clone()
    }
}

#[async_trait]
impl CaseRepository for InMemoryDelphiStore {
    async fn save(&self, case: &Case) -> Result<(), DomainError> {
        let mut cases = self.cases.write().await;
        if cases.contains_key(&case.id()) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Case already exists: {}", case.id()),
            ));
        }
        cases.insert(case.id(), CaseData::new(case.clone()));
        Ok(())
    }

    async fn find_by_id(&self, id: &CaseId) -> Result<Option<Case>, DomainError> {
        Ok(self.cases.read().await.get(id).map(|d| d.case.clone()))
    }
}

#[async_trait]
impl EvaluationReader for InMemoryDelphiStore {
    async fn fetch_evaluations(
        &self,
        filter: &EvaluationFilter,
    ) -> Result<Vec<Evaluation>, DomainError> {
        let cases = self.cases.read().await;
        Ok(cases
            .get(&filter.case_id)
            .map(|d| matching(d, filter))
            .unwrap_or_default())
    }
}

#[async_trait]
impl RoundResultReader for InMemoryDelphiStore {
    async fn list_for_case(&self, case_id: &CaseId) -> Result<Vec<RoundResult>, DomainError> {
        let cases = self.cases.read().await;
        Ok(cases
            .get(case_id)
            .map(|d| d.results.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_by_round(
        &self,
        case_id: &CaseId,
        round_number: u32,
    ) -> Result<Option<RoundResult>, DomainError> {
        let cases = self.cases.read().await;
        Ok(cases
            .get(case_id)
            .and_then(|d| d.results.get(&round_number).cloned()))
    }

    async fn find_latest(&self, case_id: &CaseId) -> Result<Option<RoundResult>, DomainError> {
        let cases = self.cases.read().await;
        Ok(cases
            .get(case_id)
            .and_then(|d| d.results.values().next_back().cloned()))
    }
}

#[async_trait]
impl CaseUnitOfWork for InMemoryDelphiStore {
    async fn begin(&self) -> Result<Box<dyn CaseTransaction>, DomainError> {
        Ok(Box::new(InMemoryCaseTransaction {
            store: self.clone(),
            guard: None,
            working: None,
        }))
    }
}

fn matching(data: &CaseData, filter: &EvaluationFilter) -> Vec<Evaluation> {
    data.evaluations
        .values()
        .filter(|e| filter.matches(e))
        .cloned()
        .collect()
}

/// Transaction over one locked case.
///
/// Writes go to a private working copy that replaces the stored case data
/// on commit.
pub struct InMemoryCaseTransaction {
    store: InMemoryDelphiStore,
    guard: Option<OwnedMutexGuard<()>>,
    working: Option<CaseData>,
}

impl InMemoryCaseTransaction {
    fn working(&mut self, case_id: &CaseId) -> Result<&mut CaseData, DomainError> {
        match self.working.as_mut() {
            Some(data) if &data.case.id() == case_id => Ok(data),
            Some(data) => Err(DomainError::new(
                ErrorCode::InternalError,
                format!(
                    "Transaction holds case {} but was asked to touch {}",
                    data.case.id(),
                    case_id
                ),
            )),
            None => Err(DomainError::new(
                ErrorCode::InternalError,
                "No case locked in this transaction",
            )),
        }
    }

    fn locked(&mut self) -> Result<&mut CaseData, DomainError> {
        self.working.as_mut().ok_or_else(|| {
            DomainError::new(ErrorCode::InternalError, "No case locked in this transaction")
        })
    }

    fn set_state(
        &mut self,
        case_id: &CaseId,
        current_round: u32,
        state: RoundState,
    ) -> Result<(), DomainError> {
        let data = self.working(case_id)?;
        let case = &data.case;
        data.case = Case::reconstitute(
            case.id(),
            case.name().to_string(),
            case.scope().clone(),
            *case.thresholds(),
            current_round,
            state,
            *case.created_at(),
            Timestamp::now(),
        );
        Ok(())
    }
}

#[async_trait]
impl CaseTransaction for InMemoryCaseTransaction {
    async fn lock_case(&mut self, case_id: &CaseId) -> Result<Option<Case>, DomainError> {
        if let Some(data) = &self.working {
            if &data.case.id() == case_id {
                return Ok(Some(data.case.clone()));
            }
            return Err(DomainError::new(
                ErrorCode::InternalError,
                "Transaction already holds another case",
            ));
        }

        let guard = self.store.case_lock(*case_id).await.lock_owned().await;
        let snapshot = self.store.cases.read().await.get(case_id).cloned();
        match snapshot {
            Some(data) => {
                let case = data.case.clone();
                self.guard = Some(guard);
                self.working = Some(data);
                Ok(Some(case))
            }
            None => Ok(None),
        }
    }

    async fn fetch_evaluations(
        &mut self,
        filter: &EvaluationFilter,
    ) -> Result<Vec<Evaluation>, DomainError> {
        let data = self.working(&filter.case_id)?;
        Ok(matching(data, filter))
    }

    async fn upsert_evaluation(
        &mut self,
        evaluation: &Evaluation,
    ) -> Result<Evaluation, DomainError> {
        let data = self.working(&evaluation.case_id)?;
        let slot = (evaluation.round, evaluation.key());
        let stored = match data.evaluations.get(&slot) {
            Some(existing) => Evaluation {
                id: existing.id,
                ..evaluation.clone()
            },
            None => evaluation.clone(),
        };
        data.evaluations.insert(slot, stored.clone());
        Ok(stored)
    }

    async fn upsert_evaluation_flag(
        &mut self,
        evaluation_id: &EvaluationId,
        needs_reevaluation: bool,
    ) -> Result<(), DomainError> {
        let data = self.locked()?;
        let evaluation = data
            .evaluations
            .values_mut()
            .find(|e| &e.id == evaluation_id)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::EvaluationNotFound,
                    format!("Evaluation not found: {}", evaluation_id),
                )
            })?;
        evaluation.needs_reevaluation = needs_reevaluation;
        Ok(())
    }

    async fn persist_round_result(&mut self, result: &RoundResult) -> Result<(), DomainError> {
        let data = self.working(&result.case_id())?;
        if data.results.contains_key(&result.round_number()) {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Round {} of case {} already has a result",
                    result.round_number(),
                    result.case_id()
                ),
            ));
        }
        data.results.insert(result.round_number(), result.clone());
        Ok(())
    }

    async fn advance_case_round(
        &mut self,
        case_id: &CaseId,
        new_round: u32,
    ) -> Result<(), DomainError> {
        let current = self.working(case_id)?.case.current_round();
        if current.checked_add(1) != Some(new_round) {
            return Err(DomainError::new(
                ErrorCode::RoundMismatch,
                format!("Cannot move case {} from round {} to {}", case_id, current, new_round),
            ));
        }
        self.set_state(case_id, new_round, RoundState::AwaitingEvaluations(new_round))
    }

    async fn close_case(&mut self, case_id: &CaseId) -> Result<(), DomainError> {
        let current = self.working(case_id)?.case.current_round();
        self.set_state(case_id, current, RoundState::Closed)
    }

    async fn mark_case_stalled(&mut self, case_id: &CaseId) -> Result<(), DomainError> {
        let current = self.working(case_id)?.case.current_round();
        self.set_state(case_id, current, RoundState::Analyzed(current))
    }

    async fn update_case_thresholds(
        &mut self,
        case_id: &CaseId,
        thresholds: &ThresholdSet,
    ) -> Result<(), DomainError> {
        let data = self.working(case_id)?;
        data.case.update_thresholds(*thresholds)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let this = *self;
        if this.store.fail_commits.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "Failed to commit transaction: injected failure",
            ));
        }
        if let Some(data) = this.working {
            this.store.cases.write().await.insert(data.case.id(), data);
        }
        drop(this.guard);
        Ok(())
    }
}
