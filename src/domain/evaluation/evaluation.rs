//! Evaluation record - one evaluator's opinion on one item in one round.

use serde::{Deserialize, Serialize};

use super::{EvaluationKey, ItemKey};
use crate::domain::foundation::{CaseId, EvaluationId, Timestamp, UserId};
use crate::domain::fuzzy::FuzzyVector;

/// A submitted opinion.
///
/// Unique per (case, round, user, item). The engine never edits the vector;
/// only `needs_reevaluation` is rewritten by the marking pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: EvaluationId,
    pub case_id: CaseId,
    pub round: u32,
    pub user_id: UserId,
    pub item: ItemKey,
    pub vector: FuzzyVector,
    /// Scalar answer kept alongside the vector for older consumers.
    pub score: f64,
    pub needs_reevaluation: bool,
    pub submitted_at: Timestamp,
}

impl Evaluation {
    /// Creates a fresh, unflagged evaluation.
    pub fn new(
        case_id: CaseId,
        round: u32,
        user_id: UserId,
        item: ItemKey,
        vector: FuzzyVector,
        score: f64,
    ) -> Self {
        Self {
            id: EvaluationId::new(),
            case_id,
            round,
            user_id,
            item,
            vector,
            score,
            needs_reevaluation: false,
            submitted_at: Timestamp::now(),
        }
    }

    /// The round-independent (user, item) key.
    pub fn key(&self) -> EvaluationKey {
        EvaluationKey::new(self.user_id.clone(), self.item)
    }

    /// Returns a copy carrying the given reevaluation flag.
    pub fn with_reevaluation_flag(mut self, needs_reevaluation: bool) -> Self {
        self.needs_reevaluation = needs_reevaluation;
        self
    }
}

/// Filtered read over a case's evaluations.
///
/// `None` fields match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationFilter {
    pub case_id: CaseId,
    pub round: Option<u32>,
    /// Upper bound (inclusive) on the round; used to load history.
    pub up_to_round: Option<u32>,
    pub item: Option<ItemKey>,
    pub user_id: Option<UserId>,
}

impl EvaluationFilter {
    pub fn for_case(case_id: CaseId) -> Self {
        Self {
            case_id,
            round: None,
            up_to_round: None,
            item: None,
            user_id: None,
        }
    }

    pub fn round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn up_to_round(mut self, round: u32) -> Self {
        self.up_to_round = Some(round);
        self
    }

    pub fn item(mut self, item: ItemKey) -> Self {
        self.item = Some(item);
        self
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Returns true if the evaluation satisfies every set criterion.
    pub fn matches(&self, evaluation: &Evaluation) -> bool {
        evaluation.case_id == self.case_id
            && self.round.map_or(true, |r| evaluation.round == r)
            && self.up_to_round.map_or(true, |r| evaluation.round <= r)
            && self.item.map_or(true, |i| evaluation.item == i)
            && self
                .user_id
                .as_ref()
                .map_or(true, |u| &evaluation.user_id == u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::CriterionId;

    fn sample(case_id: CaseId, round: u32, user: &str, item: ItemKey) -> Evaluation {
        Evaluation::new(
            case_id,
            round,
            UserId::new(user).unwrap(),
            item,
            FuzzyVector::new(0.3, 0.5, 0.7),
            4.0,
        )
    }

    #[test]
    fn new_evaluation_is_not_flagged() {
        let e = sample(CaseId::new(), 1, "ana", ItemKey::criterion(CriterionId::new()));
        assert!(!e.needs_reevaluation);
    }

    #[test]
    fn key_drops_round() {
        let case_id = CaseId::new();
        let item = ItemKey::criterion(CriterionId::new());
        assert_eq!(
            sample(case_id, 1, "ana", item).key(),
            sample(case_id, 3, "ana", item).key()
        );
    }

    #[test]
    fn filter_matches_on_all_set_fields() {
        let case_id = CaseId::new();
        let item = ItemKey::criterion(CriterionId::new());
        let e = sample(case_id, 2, "ana", item);

        assert!(EvaluationFilter::for_case(case_id).matches(&e));
        assert!(EvaluationFilter::for_case(case_id).round(2).item(item).matches(&e));
        assert!(!EvaluationFilter::for_case(case_id).round(1).matches(&e));
        assert!(!EvaluationFilter::for_case(CaseId::new()).matches(&e));
        assert!(!EvaluationFilter::for_case(case_id)
            .user(UserId::new("bo").unwrap())
            .matches(&e));
    }

    #[test]
    fn up_to_round_is_inclusive() {
        let case_id = CaseId::new();
        let e = sample(case_id, 2, "ana", ItemKey::criterion(CriterionId::new()));
        assert!(EvaluationFilter::for_case(case_id).up_to_round(2).matches(&e));
        assert!(!EvaluationFilter::for_case(case_id).up_to_round(1).matches(&e));
    }
}
