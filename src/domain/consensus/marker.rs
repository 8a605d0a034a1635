//! Reevaluation Marker - flags opinions too far from their item's mean.

use serde::{Deserialize, Serialize};

use super::ItemConsensus;
use crate::domain::case::ThresholdSet;
use crate::domain::evaluation::{EvaluationKey, ItemKey};
use crate::domain::foundation::EvaluationId;

/// New value of one evaluation's reevaluation flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagUpdate {
    pub evaluation_id: EvaluationId,
    pub key: EvaluationKey,
    pub needs_reevaluation: bool,
}

pub struct ReevaluationMarker;

impl ReevaluationMarker {
    /// Produces a flag for every opinion submitted in `round`.
    ///
    /// Uses the distances already computed against each item's own mean.
    /// Opinions carried over from earlier rounds are left alone.
    pub fn mark<'a, I>(round: u32, items: I, thresholds: &ThresholdSet) -> Vec<FlagUpdate>
    where
        I: IntoIterator<Item = &'a ItemConsensus>,
    {
        items
            .into_iter()
            .flat_map(|consensus| Self::mark_item(round, consensus, thresholds))
            .collect()
    }

    fn mark_item<'a>(
        round: u32,
        consensus: &'a ItemConsensus,
        thresholds: &'a ThresholdSet,
    ) -> impl Iterator<Item = FlagUpdate> + 'a {
        let item: ItemKey = consensus.item;
        consensus
            .opinions
            .iter()
            .filter(move |o| o.round == round)
            .map(move |o| FlagUpdate {
                evaluation_id: o.evaluation_id,
                key: EvaluationKey::new(o.user_id.clone(), item),
                needs_reevaluation: !thresholds.distance_ok(o.distance),
            })
    }
}
