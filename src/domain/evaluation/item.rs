//! Scored items and the (user, item) keys that identify an opinion.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{CriterionId, TechnologyId, UserId};

/// Category of a scored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Criterion,
    Technology,
}

/// A single scored unit: a criterion alone, or a criterion×technology pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKey {
    Criterion {
        criterion_id: CriterionId,
    },
    Technology {
        criterion_id: CriterionId,
        technology_id: TechnologyId,
    },
}

impl ItemKey {
    pub fn criterion(criterion_id: CriterionId) -> Self {
        ItemKey::Criterion { criterion_id }
    }

    pub fn technology(criterion_id: CriterionId, technology_id: TechnologyId) -> Self {
        ItemKey::Technology {
            criterion_id,
            technology_id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            ItemKey::Criterion { .. } => ItemKind::Criterion,
            ItemKey::Technology { .. } => ItemKind::Technology,
        }
    }

    pub fn criterion_id(&self) -> CriterionId {
        match self {
            ItemKey::Criterion { criterion_id } | ItemKey::Technology { criterion_id, .. } => {
                *criterion_id
            }
        }
    }

    pub fn technology_id(&self) -> Option<TechnologyId> {
        match self {
            ItemKey::Criterion { .. } => None,
            ItemKey::Technology { technology_id, .. } => Some(*technology_id),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Criterion { criterion_id } => write!(f, "criterion:{}", criterion_id),
            ItemKey::Technology {
                criterion_id,
                technology_id,
            } => write!(f, "technology:{}/criterion:{}", technology_id, criterion_id),
        }
    }
}

/// Identifies one evaluator's opinion on one item, independent of round.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EvaluationKey {
    pub user_id: UserId,
    pub item: ItemKey,
}

impl EvaluationKey {
    pub fn new(user_id: UserId, item: ItemKey) -> Self {
        Self { user_id, item }
    }
}

impl fmt::Display for EvaluationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.user_id, self.item)
    }
}
