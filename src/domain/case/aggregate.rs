//! Case aggregate.
//!
//! A case is one fuzzy-Delphi study: a fixed panel of evaluators scoring a
//! fixed set of criteria and technology×criterion pairs over successive
//! rounds until the panel converges.

use serde::{Deserialize, Serialize};

use super::{RoundState, RoundTransition, ThresholdSet};
use crate::domain::evaluation::ItemKey;
use crate::domain::foundation::{
    CaseId, CriterionId, DomainError, ErrorCode, StateMachine, TechnologyId, Timestamp, UserId,
};

/// Maximum length for a case name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Who scores what in a case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseScope {
    evaluators: Vec<UserId>,
    criteria: Vec<CriterionId>,
    technologies: Vec<TechnologyId>,
}

impl CaseScope {
    /// Builds a scope, dropping duplicates while keeping first-seen order.
    pub fn new(
        evaluators: Vec<UserId>,
        criteria: Vec<CriterionId>,
        technologies: Vec<TechnologyId>,
    ) -> Self {
        Self {
            evaluators: dedup(evaluators),
            criteria: dedup(criteria),
            technologies: dedup(technologies),
        }
    }

    pub fn evaluators(&self) -> &[UserId] {
        &self.evaluators
    }

    pub fn criteria(&self) -> &[CriterionId] {
        &self.criteria
    }

    pub fn technologies(&self) -> &[TechnologyId] {
        &self.technologies
    }

    pub fn is_evaluator(&self, user_id: &UserId) -> bool {
        self.evaluators.contains(user_id)
    }

    /// One item per criterion.
    pub fn criterion_items(&self) -> impl Iterator<Item = ItemKey> + '_ {
        self.criteria.iter().map(|c| ItemKey::criterion(*c))
    }

    /// One item per (criterion, technology) pair.
    pub fn technology_items(&self) -> impl Iterator<Item = ItemKey> + '_ {
        self.criteria.iter().flat_map(move |c| {
            self.technologies
                .iter()
                .map(move |t| ItemKey::technology(*c, *t))
        })
    }

    /// Every scored item, criteria first.
    pub fn items(&self) -> Vec<ItemKey> {
        self.criterion_items().chain(self.technology_items()).collect()
    }

    pub fn contains_item(&self, item: &ItemKey) -> bool {
        let criterion_known = self.criteria.contains(&item.criterion_id());
        match item.technology_id() {
            None => criterion_known,
            Some(t) => criterion_known && self.technologies.contains(&t),
        }
    }
}

fn dedup<T: PartialEq>(values: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

/// Case aggregate.
///
/// # Invariants
///
/// - `current_round` starts at 1 and only ever grows by one
/// - `state` refers to `current_round` unless the case is closed
/// - a closed case never reopens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    id: CaseId,
    name: String,
    scope: CaseScope,
    thresholds: ThresholdSet,
    current_round: u32,
    state: RoundState,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Case {
    /// Opens a new case in round 1.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if name is empty or too long
    pub fn new(
        id: CaseId,
        name: String,
        scope: CaseScope,
        thresholds: ThresholdSet,
    ) -> Result<Self, DomainError> {
        Self::validate_name(&name)?;

        let now = Timestamp::now();
        Ok(Self {
            id,
            name,
            scope,
            thresholds,
            current_round: 1,
            state: RoundState::AwaitingEvaluations(1),
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstitute a case from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: CaseId,
        name: String,
        scope: CaseScope,
        thresholds: ThresholdSet,
        current_round: u32,
        state: RoundState,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            scope,
            thresholds,
            current_round,
            state,
            created_at,
            updated_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> CaseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &CaseScope {
        &self.scope
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// True when the round limit stopped the case without convergence.
    pub fn is_stalled(&self) -> bool {
        matches!(self.state, RoundState::Analyzed(_))
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Guards
    // ─────────────────────────────────────────────────────────────────────────

    /// Ensures the current round can still receive evaluations or be analyzed.
    ///
    /// # Errors
    ///
    /// - `CaseClosed` if the case has converged
    /// - `RoundLimitReached` if the case stalled on its last allowed round
    pub fn ensure_round_open(&self) -> Result<(), DomainError> {
        match self.state {
            RoundState::AwaitingEvaluations(_) => Ok(()),
            RoundState::Closed => Err(DomainError::new(
                ErrorCode::CaseClosed,
                format!("Case {} has converged and is closed", self.id),
            )),
            RoundState::Analyzed(n) => Err(DomainError::new(
                ErrorCode::RoundLimitReached,
                format!("Case {} stopped after round {} without converging", self.id, n),
            )
            .with_detail("round", n.to_string())),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Replaces the thresholds, returning the previous set.
    ///
    /// # Errors
    ///
    /// - `CaseClosed` if the case has converged
    pub fn update_thresholds(&mut self, thresholds: ThresholdSet) -> Result<ThresholdSet, DomainError> {
        if self.is_closed() {
            return Err(DomainError::new(
                ErrorCode::CaseClosed,
                format!("Case {} is closed; thresholds are frozen", self.id),
            ));
        }
        let previous = std::mem::replace(&mut self.thresholds, thresholds);
        self.updated_at = Timestamp::now();
        Ok(previous)
    }

    /// Applies the verdict of the current round's analysis.
    ///
    /// A pass closes the case at the current round. A failure opens the next
    /// round, unless `max_rounds` is set and already reached, in which case
    /// the case stays analyzed.
    ///
    /// # Errors
    ///
    /// - `CaseClosed` / `RoundLimitReached` if the round is not open
    /// - `InvalidStateTransition` if the round counter cannot advance
    pub fn record_analysis(
        &mut self,
        passed: bool,
        max_rounds: Option<u32>,
    ) -> Result<RoundTransition, DomainError> {
        self.ensure_round_open()?;
        let round = self.current_round;
        let analyzed = self.transition(RoundState::Analyzed(round))?;

        let outcome = if passed {
            self.state = analyzed.transition_to(RoundState::Closed).map_err(invalid_transition)?;
            RoundTransition::Closed { round }
        } else if max_rounds.is_some_and(|limit| round >= limit) {
            self.state = analyzed;
            RoundTransition::Stalled { round }
        } else {
            let next = round.checked_add(1).ok_or_else(|| {
                DomainError::new(ErrorCode::InvalidStateTransition, "Round counter exhausted")
            })?;
            self.state = analyzed
                .transition_to(RoundState::AwaitingEvaluations(next))
                .map_err(invalid_transition)?;
            self.current_round = next;
            RoundTransition::Opened { round: next }
        };

        self.updated_at = Timestamp::now();
        Ok(outcome)
    }

    fn transition(&self, target: RoundState) -> Result<RoundState, DomainError> {
        self.state.transition_to(target).map_err(invalid_transition)
    }

    fn validate_name(name: &str) -> Result<(), DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("name", "Case name cannot be empty"));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(DomainError::validation(
                "name",
                format!("Case name cannot exceed {} characters", MAX_NAME_LENGTH),
            ));
        }
        Ok(())
    }
}

fn invalid_transition(err: crate::domain::foundation::ValidationError) -> DomainError {
    DomainError::new(ErrorCode::InvalidStateTransition, err.to_string())
}
