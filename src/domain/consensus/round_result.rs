//! RoundResult - the immutable snapshot of one analyzed round.

use serde::{Deserialize, Serialize};

use super::RoundMetrics;
use crate::domain::foundation::{CaseId, RoundResultId, Timestamp};

/// Persisted once per (case, round). Never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    id: RoundResultId,
    case_id: CaseId,
    round_number: u32,
    metrics: RoundMetrics,
    analyzed_at: Timestamp,
}

impl RoundResult {
    pub fn new(case_id: CaseId, round_number: u32, metrics: RoundMetrics) -> Self {
        Self {
            id: RoundResultId::new(),
            case_id,
            round_number,
            metrics,
            analyzed_at: Timestamp::now(),
        }
    }

    /// Reconstitute from persistence.
    pub fn reconstitute(
        id: RoundResultId,
        case_id: CaseId,
        round_number: u32,
        metrics: RoundMetrics,
        analyzed_at: Timestamp,
    ) -> Self {
        Self {
            id,
            case_id,
            round_number,
            metrics,
            analyzed_at,
        }
    }

    pub fn id(&self) -> RoundResultId {
        self.id
    }

    pub fn case_id(&self) -> CaseId {
        self.case_id
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn metrics(&self) -> &RoundMetrics {
        &self.metrics
    }

    pub fn passed(&self) -> bool {
        self.metrics.passed
    }

    pub fn analyzed_at(&self) -> &Timestamp {
        &self.analyzed_at
    }
}
