//! Pure round analysis: requirements check, aggregation, verdict, marking.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    ConvergenceEvaluator, FlagUpdate, OpinionPool, ReevaluationMarker, RoundAnalysis,
    RoundRequirements,
};
use crate::domain::case::{CaseScope, ThresholdSet};
use crate::domain::evaluation::{Evaluation, EvaluationKey};

/// Analysis refused because required opinions are missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteRound {
    pub round: u32,
    pub missing: Vec<EvaluationKey>,
}

impl fmt::Display for IncompleteRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "round {} is missing {} required evaluation(s)",
            self.round,
            self.missing.len()
        )
    }
}

/// Everything a completed analysis wants written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub analysis: RoundAnalysis,
    pub flag_updates: Vec<FlagUpdate>,
}

impl RoundOutcome {
    /// Opinions that must be resubmitted if another round opens.
    pub fn flagged_count(&self) -> usize {
        self.flag_updates.iter().filter(|u| u.needs_reevaluation).count()
    }
}

pub struct RoundEngine;

impl RoundEngine {
    /// Analyzes `round` from the case's evaluation history (rounds 1..=round).
    ///
    /// # Errors
    ///
    /// Returns [`IncompleteRound`] with the sorted missing keys when any
    /// required evaluation of `round` is absent.
    pub fn analyze(
        scope: &CaseScope,
        thresholds: &ThresholdSet,
        round: u32,
        history: Vec<Evaluation>,
    ) -> Result<RoundOutcome, IncompleteRound> {
        let requirements = RoundRequirements::for_round(scope, round, &history);
        let missing = requirements.missing(&history);
        if !missing.is_empty() {
            return Err(IncompleteRound { round, missing });
        }

        let pool = OpinionPool::build(round, history);
        let analysis = ConvergenceEvaluator::evaluate(scope, &pool, thresholds);
        let flag_updates = ReevaluationMarker::mark(
            round,
            analysis.items.iter().map(|a| &a.consensus),
            thresholds,
        );

        Ok(RoundOutcome {
            analysis,
            flag_updates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::evaluation::ItemKey;
    use crate::domain::foundation::{CaseId, CriterionId, TechnologyId, UserId};
    use crate::domain::fuzzy::FuzzyVector;

    fn user(name: &str) -> UserId {
        UserId::new(name).unwrap()
    }

    fn eval(case_id: CaseId, round: u32, who: &str, item: ItemKey, v: FuzzyVector) -> Evaluation {
        Evaluation::new(case_id, round, user(who), item, v, 0.0)
    }

    /// One criterion, one technology; the pair always agrees at (2, 3, 4).
    fn setup() -> (CaseId, CaseScope, ItemKey, ItemKey) {
        let c = CriterionId::new();
        let t = TechnologyId::new();
        let scope = CaseScope::new(vec![user("ana"), user("bo")], vec![c], vec![t]);
        (CaseId::new(), scope, ItemKey::criterion(c), ItemKey::technology(c, t))
    }

    fn agreeing_pair(case_id: CaseId, round: u32, item: ItemKey) -> Vec<Evaluation> {
        let v = FuzzyVector::new(2.0, 3.0, 4.0);
        vec![eval(case_id, round, "ana", item, v), eval(case_id, round, "bo", item, v)]
    }

    #[test]
    fn identical_opinions_converge_without_flags() {
        let (case_id, scope, criterion, pair) = setup();
        let thresholds = ThresholdSet::new(0.1667, 75.0, 75.0).unwrap();
        let mut history = agreeing_pair(case_id, 1, criterion);
        history.extend(agreeing_pair(case_id, 1, pair));

        let outcome = RoundEngine::analyze(&scope, &thresholds, 1, history).unwrap();
        let item = &outcome.analysis.items[0];
        assert_eq!(item.consensus.mean_vector, FuzzyVector::new(2.0, 3.0, 4.0));
        assert_eq!(item.consensus.mean_distance, 0.0);
        assert!(item.passed);
        assert!(outcome.analysis.passed());
        assert_eq!(outcome.flagged_count(), 0);
        assert_eq!(outcome.flag_updates.len(), 4);
    }

    #[test]
    fn divergent_opinions_flag_both_evaluators() {
        let (case_id, scope, criterion, pair) = setup();
        let mut history = vec![
            eval(case_id, 1, "ana", criterion, FuzzyVector::new(1.0, 2.0, 3.0)),
            eval(case_id, 1, "bo", criterion, FuzzyVector::new(9.0, 9.0, 9.0)),
        ];
        history.extend(agreeing_pair(case_id, 1, pair));

        let outcome = RoundEngine::analyze(&scope, &ThresholdSet::default(), 1, history).unwrap();
        assert_eq!(
            outcome.analysis.items[0].consensus.mean_vector,
            FuzzyVector::new(5.0, 5.5, 6.0)
        );
        assert!(!outcome.analysis.passed());

        let flagged: Vec<&EvaluationKey> = outcome
            .flag_updates
            .iter()
            .filter(|u| u.needs_reevaluation)
            .map(|u| &u.key)
            .collect();
        assert_eq!(
            flagged,
            vec![
                &EvaluationKey::new(user("ana"), criterion),
                &EvaluationKey::new(user("bo"), criterion)
            ]
        );
    }

    #[test]
    fn missing_submission_is_reported_by_key() {
        let (case_id, scope, criterion, pair) = setup();
        let mut history = agreeing_pair(case_id, 1, criterion);
        history.push(eval(case_id, 1, "ana", pair, FuzzyVector::new(2.0, 3.0, 4.0)));

        let err = RoundEngine::analyze(&scope, &ThresholdSet::default(), 1, history).unwrap_err();
        assert_eq!(err.round, 1);
        assert_eq!(err.missing, vec![EvaluationKey::new(user("bo"), pair)]);
    }

    #[test]
    fn second_round_pools_resubmissions_with_carried_opinions() {
        let (case_id, scope, criterion, pair) = setup();
        let mut history = vec![
            eval(case_id, 1, "ana", criterion, FuzzyVector::new(1.0, 2.0, 3.0))
                .with_reevaluation_flag(true),
            eval(case_id, 1, "bo", criterion, FuzzyVector::new(9.0, 9.0, 9.0))
                .with_reevaluation_flag(true),
        ];
        history.extend(agreeing_pair(case_id, 1, pair));
        history.extend(agreeing_pair(case_id, 2, criterion));

        let outcome = RoundEngine::analyze(&scope, &ThresholdSet::default(), 2, history).unwrap();
        assert!(outcome.analysis.passed());
        assert_eq!(outcome.analysis.metrics.tech_total_count, 1);
        // Only the two round-2 submissions are re-marked.
        assert_eq!(outcome.flag_updates.len(), 2);
        assert!(outcome
            .flag_updates
            .iter()
            .all(|u| u.key.item == criterion && !u.needs_reevaluation));
    }

    #[test]
    fn second_round_requires_flagged_resubmissions() {
        let (case_id, scope, criterion, pair) = setup();
        let mut history = vec![
            eval(case_id, 1, "ana", criterion, FuzzyVector::new(1.0, 2.0, 3.0))
                .with_reevaluation_flag(true),
            eval(case_id, 1, "bo", criterion, FuzzyVector::new(9.0, 9.0, 9.0))
                .with_reevaluation_flag(true),
        ];
        history.extend(agreeing_pair(case_id, 1, pair));
        history.push(eval(case_id, 2, "bo", criterion, FuzzyVector::new(2.0, 3.0, 4.0)));

        let err = RoundEngine::analyze(&scope, &ThresholdSet::default(), 2, history).unwrap_err();
        assert_eq!(err.missing, vec![EvaluationKey::new(user("ana"), criterion)]);
    }
}
