//! Convergence Evaluator - judges a round against the case thresholds.

use serde::{Deserialize, Serialize};

use super::{ConsensusAggregator, ItemConsensus, OpinionPool};
use crate::domain::case::{CaseScope, ThresholdSet};
use crate::domain::evaluation::{ItemKey, ItemKind};
use crate::domain::foundation::Percentage;

/// Counts, percentages and distances of one analyzed round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundMetrics {
    pub criteria_ok_count: usize,
    pub criteria_total_count: usize,
    pub criteria_ok_percent: Percentage,
    pub criteria_passed: bool,

    pub tech_ok_count: usize,
    pub tech_total_count: usize,
    pub tech_ok_percent: Percentage,
    pub tech_passed: bool,

    pub mean_distance_value: f64,
    pub mean_distance_ok: bool,
    pub criteria_mean_distance_value: f64,
    pub criteria_mean_distance_ok: bool,
    pub tech_mean_distance_value: f64,
    pub tech_mean_distance_ok: bool,

    /// `mean_distance_ok && criteria_passed && tech_passed`.
    pub passed: bool,
}

/// Verdict for one item that had data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAssessment {
    pub consensus: ItemConsensus,
    pub passed: bool,
}

impl ItemAssessment {
    pub fn item(&self) -> ItemKey {
        self.consensus.item
    }
}

/// Full, unpersisted outcome of evaluating a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundAnalysis {
    pub round: u32,
    pub metrics: RoundMetrics,
    pub items: Vec<ItemAssessment>,
    /// In-scope items nobody contributed to; excluded from every count.
    pub no_data: Vec<ItemKey>,
}

impl RoundAnalysis {
    pub fn passed(&self) -> bool {
        self.metrics.passed
    }
}

#[derive(Default)]
struct Tally {
    ok: usize,
    total: usize,
    distance_sum: f64,
    distance_count: usize,
}

impl Tally {
    fn record(&mut self, consensus: &ItemConsensus, passed: bool) {
        self.total += 1;
        if passed {
            self.ok += 1;
        }
        for opinion in &consensus.opinions {
            self.distance_sum += opinion.distance;
            self.distance_count += 1;
        }
    }

    fn mean_distance(&self) -> f64 {
        if self.distance_count == 0 {
            return 0.0;
        }
        self.distance_sum / self.distance_count as f64
    }
}

/// Computes round metrics and the overall verdict.
pub struct ConvergenceEvaluator;

impl ConvergenceEvaluator {
    /// Evaluates every in-scope item of the pool's round.
    ///
    /// Items without contributors land in `no_data`. The overall mean
    /// distances average individual opinion distances, so larger items weigh
    /// more; with no opinions at all they are 0.0.
    pub fn evaluate(
        scope: &CaseScope,
        pool: &OpinionPool,
        thresholds: &ThresholdSet,
    ) -> RoundAnalysis {
        let mut criteria = Tally::default();
        let mut tech = Tally::default();
        let mut items = Vec::new();
        let mut no_data = Vec::new();

        for item in scope.items() {
            let Some(consensus) = ConsensusAggregator::aggregate_pooled(item, pool) else {
                no_data.push(item);
                continue;
            };

            let passed = thresholds.distance_ok(consensus.mean_distance);
            match item.kind() {
                ItemKind::Criterion => criteria.record(&consensus, passed),
                ItemKind::Technology => tech.record(&consensus, passed),
            }
            items.push(ItemAssessment { consensus, passed });
        }

        let metrics = Self::metrics(&criteria, &tech, thresholds);
        RoundAnalysis {
            round: pool.round(),
            metrics,
            items,
            no_data,
        }
    }

    fn metrics(criteria: &Tally, tech: &Tally, thresholds: &ThresholdSet) -> RoundMetrics {
        let criteria_ok_percent = Percentage::from_counts(criteria.ok, criteria.total);
        let tech_ok_percent = Percentage::from_counts(tech.ok, tech.total);
        let criteria_passed = criteria_ok_percent.meets(thresholds.criteria_percent_threshold());
        let tech_passed = tech_ok_percent.meets(thresholds.tech_percent_threshold());

        let all_count = criteria.distance_count + tech.distance_count;
        let mean_distance_value = if all_count == 0 {
            0.0
        } else {
            (criteria.distance_sum + tech.distance_sum) / all_count as f64
        };
        let criteria_mean_distance_value = criteria.mean_distance();
        let tech_mean_distance_value = tech.mean_distance();
        let mean_distance_ok = thresholds.distance_ok(mean_distance_value);

        RoundMetrics {
            criteria_ok_count: criteria.ok,
            criteria_total_count: criteria.total,
            criteria_ok_percent,
            criteria_passed,
            tech_ok_count: tech.ok,
            tech_total_count: tech.total,
            tech_ok_percent,
            tech_passed,
            mean_distance_value,
            mean_distance_ok,
            criteria_mean_distance_value,
            criteria_mean_distance_ok: thresholds.distance_ok(criteria_mean_distance_value),
            tech_mean_distance_value,
            tech_mean_distance_ok: thresholds.distance_ok(tech_mean_distance_value),
            passed: mean_distance_ok && criteria_passed && tech_passed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::evaluation::Evaluation;
    use crate::domain::foundation::{CaseId, CriterionId, TechnologyId, UserId};
    use crate::domain::fuzzy::{FuzzyVector, LikertValue};

    fn likert(v: u8) -> FuzzyVector {
        LikertValue::try_new(v).unwrap().to_fuzzy()
    }

    fn eval(case_id: CaseId, who: &str, item: ItemKey, v: FuzzyVector) -> Evaluation {
        Evaluation::new(case_id, 1, UserId::new(who).unwrap(), item, v, 0.0)
    }

    struct Fixture {
        case_id: CaseId,
        scope: CaseScope,
        c1: CriterionId,
        c2: CriterionId,
        t1: TechnologyId,
    }

    fn fixture() -> Fixture {
        let c1 = CriterionId::new();
        let c2 = CriterionId::new();
        let t1 = TechnologyId::new();
        let scope = CaseScope::new(
            vec![UserId::new("ana").unwrap(), UserId::new("bo").unwrap()],
            vec![c1, c2],
            vec![t1],
        );
        Fixture {
            case_id: CaseId::new(),
            scope,
            c1,
            c2,
            t1,
        }
    }

    fn unanimous(f: &Fixture, answer: u8) -> Vec<Evaluation> {
        f.scope
            .items()
            .into_iter()
            .flat_map(|item| {
                vec![
                    eval(f.case_id, "ana", item, likert(answer)),
                    eval(f.case_id, "bo", item, likert(answer)),
                ]
            })
            .collect()
    }

    #[test]
    fn unanimous_panel_passes() {
        let f = fixture();
        let pool = OpinionPool::build(1, unanimous(&f, 5));
        let analysis = ConvergenceEvaluator::evaluate(&f.scope, &pool, &ThresholdSet::default());

        let m = analysis.metrics;
        assert_eq!((m.criteria_ok_count, m.criteria_total_count), (2, 2));
        assert_eq!((m.tech_ok_count, m.tech_total_count), (2, 2));
        assert_eq!(m.mean_distance_value, 0.0);
        assert!(m.passed);
        assert!(analysis.no_data.is_empty());
    }

    #[test]
    fn one_split_criterion_drops_criteria_to_half() {
        let f = fixture();
        let mut evals = unanimous(&f, 5);
        let split = ItemKey::criterion(f.c2);
        for e in evals.iter_mut().filter(|e| e.item == split && e.user_id.as_str() == "bo") {
            e.vector = likert(1);
        }

        let pool = OpinionPool::build(1, evals);
        let analysis = ConvergenceEvaluator::evaluate(&f.scope, &pool, &ThresholdSet::default());

        let m = analysis.metrics;
        assert_eq!(m.criteria_ok_count, 1);
        assert_eq!(m.criteria_ok_percent.value(), 50.0);
        assert!(!m.criteria_passed);
        assert!(m.tech_passed);
        assert!(!m.passed);
    }

    #[test]
    fn items_without_opinions_are_excluded_from_counts() {
        let f = fixture();
        let silent = ItemKey::technology(f.c1, f.t1);
        let evals: Vec<Evaluation> =
            unanimous(&f, 4).into_iter().filter(|e| e.item != silent).collect();

        let pool = OpinionPool::build(1, evals);
        let analysis = ConvergenceEvaluator::evaluate(&f.scope, &pool, &ThresholdSet::default());

        assert_eq!(analysis.no_data, vec![silent]);
        assert_eq!(analysis.metrics.tech_total_count, 1);
        assert_eq!(analysis.metrics.tech_ok_percent.value(), 100.0);
    }

    #[test]
    fn empty_category_counts_as_zero_percent() {
        let c = CriterionId::new();
        let scope = CaseScope::new(vec![UserId::new("ana").unwrap()], vec![c], vec![]);
        let case_id = CaseId::new();
        let pool = OpinionPool::build(1, vec![eval(case_id, "ana", ItemKey::criterion(c), likert(6))]);

        let analysis = ConvergenceEvaluator::evaluate(&scope, &pool, &ThresholdSet::default());
        assert_eq!(analysis.metrics.tech_total_count, 0);
        assert_eq!(analysis.metrics.tech_ok_percent, Percentage::ZERO);
        assert!(!analysis.metrics.tech_passed);
        assert!(!analysis.passed());

        let lenient = ThresholdSet::new(1.0 / 6.0, 75.0, 0.0).unwrap();
        assert!(ConvergenceEvaluator::evaluate(&scope, &pool, &lenient).passed());
    }

    #[test]
    fn overall_mean_distance_can_fail_while_percentages_pass() {
        // Three tight criteria and one far-apart criterion: 75% of criteria
        // pass, yet the pooled distance exceeds a strict threshold.
        let criteria: Vec<CriterionId> = (0..4).map(|_| CriterionId::new()).collect();
        let scope = CaseScope::new(
            vec![UserId::new("ana").unwrap(), UserId::new("bo").unwrap()],
            criteria.clone(),
            vec![],
        );
        let case_id = CaseId::new();
        let mut evals = Vec::new();
        for (i, c) in criteria.iter().enumerate() {
            let item = ItemKey::criterion(*c);
            evals.push(eval(case_id, "ana", item, likert(1)));
            evals.push(eval(case_id, "bo", item, likert(if i == 3 { 7 } else { 1 })));
        }

        let thresholds = ThresholdSet::new(0.1, 75.0, 0.0).unwrap();
        let analysis = ConvergenceEvaluator::evaluate(&scope, &OpinionPool::build(1, evals), &thresholds);

        let m = analysis.metrics;
        assert!(m.criteria_passed);
        assert!(m.tech_passed);
        assert!(m.mean_distance_value > 0.1);
        assert!(!m.mean_distance_ok);
        assert!(!m.passed);
        assert_eq!(m.tech_mean_distance_value, 0.0);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let f = fixture();
        let mut evals = unanimous(&f, 3);
        evals[1].vector = likert(6);
        let pool = OpinionPool::build(1, evals);
        let first = ConvergenceEvaluator::evaluate(&f.scope, &pool, &ThresholdSet::default());
        let second = ConvergenceEvaluator::evaluate(&f.scope, &pool, &ThresholdSet::default());
        assert_eq!(first, second);
    }
}
