//! Consensus Aggregator - per-item group mean and spread.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::domain::evaluation::{Evaluation, EvaluationKey, ItemKey};
use crate::domain::foundation::{EvaluationId, UserId};
use crate::domain::fuzzy::FuzzyVector;

/// The effective opinion set of a round.
///
/// Built by folding rounds 1..=n: each round's fresh submissions replace the
/// evaluator's earlier opinion on that item, and an older opinion survives
/// only while it is not flagged for reevaluation. An opinion that converged
/// in round 1 is therefore still pooled in round 3.
#[derive(Debug, Clone, Default)]
pub struct OpinionPool {
    round: u32,
    effective: BTreeMap<EvaluationKey, Evaluation>,
}

impl OpinionPool {
    /// Folds the evaluation history up to and including `round`.
    ///
    /// Evaluations from later rounds are ignored.
    pub fn build<I>(round: u32, history: I) -> Self
    where
        I: IntoIterator<Item = Evaluation>,
    {
        let mut by_round: BTreeMap<u32, Vec<Evaluation>> = BTreeMap::new();
        for evaluation in history {
            if (1..=round).contains(&evaluation.round) {
                by_round.entry(evaluation.round).or_default().push(evaluation);
            }
        }

        let mut effective: BTreeMap<EvaluationKey, Evaluation> = BTreeMap::new();
        for r in 1..=round {
            let fresh = by_round.remove(&r).unwrap_or_default();
            let fresh_keys: HashSet<EvaluationKey> = fresh.iter().map(Evaluation::key).collect();

            effective.retain(|key, carried| !carried.needs_reevaluation && !fresh_keys.contains(key));
            for evaluation in fresh {
                effective.insert(evaluation.key(), evaluation);
            }
        }

        Self { round, effective }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn len(&self) -> usize {
        self.effective.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effective.is_empty()
    }

    /// Opinions pooled for one item, ordered by evaluator.
    pub fn opinions_for(&self, item: &ItemKey) -> Vec<&Evaluation> {
        self.effective.values().filter(|e| &e.item == item).collect()
    }

    /// Opinions carried over from earlier rounds.
    pub fn carried_forward(&self) -> impl Iterator<Item = &Evaluation> {
        self.effective.values().filter(move |e| e.round < self.round)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Evaluation> {
        self.effective.values()
    }
}

/// One contributor's distance to its item's group mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionDistance {
    pub evaluation_id: EvaluationId,
    pub user_id: UserId,
    /// Round the opinion was submitted in.
    pub round: u32,
    pub distance: f64,
}

/// Group consensus for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemConsensus {
    pub item: ItemKey,
    pub mean_vector: FuzzyVector,
    pub mean_distance: f64,
    pub opinions: Vec<OpinionDistance>,
}

impl ItemConsensus {
    pub fn contributor_count(&self) -> usize {
        self.opinions.len()
    }
}

/// Computes per-item consensus from a pooled opinion set.
pub struct ConsensusAggregator;

impl ConsensusAggregator {
    /// Aggregates one item.
    ///
    /// Returns `None` when nobody contributed, so no division by zero happens
    /// and callers can exclude the item from counts.
    pub fn aggregate(item: ItemKey, opinions: &[&Evaluation]) -> Option<ItemConsensus> {
        let mean_vector = FuzzyVector::mean(opinions.iter().map(|e| &e.vector))?;

        let opinions: Vec<OpinionDistance> = opinions
            .iter()
            .map(|e| OpinionDistance {
                evaluation_id: e.id,
                user_id: e.user_id.clone(),
                round: e.round,
                distance: e.vector.distance_to(&mean_vector),
            })
            .collect();

        let mean_distance =
            opinions.iter().map(|o| o.distance).sum::<f64>() / opinions.len() as f64;

        Some(ItemConsensus {
            item,
            mean_vector,
            mean_distance,
            opinions,
        })
    }

    /// Aggregates one item straight from a pool.
    pub fn aggregate_pooled(item: ItemKey, pool: &OpinionPool) -> Option<ItemConsensus> {
        Self::aggregate(item, &pool.opinions_for(&item))
    }
}
