//! Which opinions a round needs before it can be analyzed.

use std::collections::BTreeSet;

use crate::domain::case::CaseScope;
use crate::domain::evaluation::{Evaluation, EvaluationKey, ItemKey};
use crate::domain::foundation::UserId;

/// The required (user, item) keys of one round.
///
/// Round 1 requires every evaluator on every item. Round n > 1 requires
/// exactly the keys whose round n - 1 evaluation was flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRequirements {
    round: u32,
    required: BTreeSet<EvaluationKey>,
}

impl RoundRequirements {
    /// Computes the required set.
    ///
    /// `previous_round` may hold any evaluations; only those of round
    /// `round - 1` are considered.
    pub fn for_round(scope: &CaseScope, round: u32, previous_round: &[Evaluation]) -> Self {
        let required = if round <= 1 {
            let items: Vec<ItemKey> = scope.items();
            scope
                .evaluators()
                .iter()
                .flat_map(|user| {
                    items
                        .iter()
                        .map(move |item| EvaluationKey::new(user.clone(), *item))
                })
                .collect()
        } else {
            previous_round
                .iter()
                .filter(|e| e.round == round - 1 && e.needs_reevaluation)
                .map(Evaluation::key)
                .collect()
        };

        Self { round, required }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn len(&self) -> usize {
        self.required.len()
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    pub fn contains(&self, key: &EvaluationKey) -> bool {
        self.required.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvaluationKey> {
        self.required.iter()
    }

    /// Required keys belonging to one evaluator.
    pub fn for_user<'a>(&'a self, user_id: &'a UserId) -> impl Iterator<Item = &'a EvaluationKey> {
        self.required.iter().filter(move |k| &k.user_id == user_id)
    }

    /// Required keys with no evaluation of this round among `submitted`, sorted.
    pub fn missing(&self, submitted: &[Evaluation]) -> Vec<EvaluationKey> {
        let present: BTreeSet<EvaluationKey> = submitted
            .iter()
            .filter(|e| e.round == self.round)
            .map(Evaluation::key)
            .collect();
        self.required.difference(&present).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{CaseId, CriterionId, TechnologyId};
    use crate::domain::fuzzy::FuzzyVector;

    fn user(name: &str) -> UserId {
        UserId::new(name).unwrap()
    }

    fn eval(case_id: CaseId, round: u32, who: &str, item: ItemKey, flagged: bool) -> Evaluation {
        Evaluation::new(case_id, round, user(who), item, FuzzyVector::new(0.3, 0.5, 0.7), 4.0)
            .with_reevaluation_flag(flagged)
    }

    #[test]
    fn round_one_requires_full_matrix() {
        let scope = CaseScope::new(
            vec![user("ana"), user("bo")],
            vec![CriterionId::new(), CriterionId::new()],
            vec![TechnologyId::new()],
        );
        let req = RoundRequirements::for_round(&scope, 1, &[]);
        // 2 evaluators × (2 criteria + 2 pairs)
        assert_eq!(req.len(), 8);
        assert_eq!(req.for_user(&user("ana")).count(), 4);
    }

    #[test]
    fn later_round_requires_only_flagged_keys() {
        let case_id = CaseId::new();
        let item = ItemKey::criterion(CriterionId::new());
        let scope = CaseScope::new(vec![user("ana"), user("bo")], vec![item.criterion_id()], vec![]);
        let previous = vec![eval(case_id, 1, "ana", item, false), eval(case_id, 1, "bo", item, true)];

        let req = RoundRequirements::for_round(&scope, 2, &previous);
        assert_eq!(req.len(), 1);
        assert!(req.contains(&EvaluationKey::new(user("bo"), item)));
    }

    #[test]
    fn flags_from_older_rounds_are_not_required() {
        let case_id = CaseId::new();
        let item = ItemKey::criterion(CriterionId::new());
        let scope = CaseScope::new(vec![user("ana")], vec![item.criterion_id()], vec![]);
        let stale = vec![eval(case_id, 1, "ana", item, true)];

        assert!(RoundRequirements::for_round(&scope, 3, &stale).is_empty());
    }

    #[test]
    fn missing_names_exact_keys() {
        let case_id = CaseId::new();
        let item = ItemKey::criterion(CriterionId::new());
        let scope = CaseScope::new(vec![user("ana"), user("bo")], vec![item.criterion_id()], vec![]);
        let req = RoundRequirements::for_round(&scope, 1, &[]);

        let submitted = vec![eval(case_id, 1, "ana", item, false)];
        assert_eq!(req.missing(&submitted), vec![EvaluationKey::new(user("bo"), item)]);
    }

    #[test]
    fn submissions_from_other_rounds_do_not_count() {
        let case_id = CaseId::new();
        let item = ItemKey::criterion(CriterionId::new());
        let scope = CaseScope::new(vec![user("ana")], vec![item.criterion_id()], vec![]);
        let previous = vec![eval(case_id, 1, "ana", item, true)];
        let req = RoundRequirements::for_round(&scope, 2, &previous);

        assert_eq!(req.missing(&previous).len(), 1);
    }
}
