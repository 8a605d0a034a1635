//! Case domain events.
//!
//! - `RoundAnalyzed` - a round's analysis was committed
//! - `CaseConverged` - the panel converged and the case closed
//! - `RoundOpened` - a failed round opened the next one
//! - `ThresholdsUpdated` - convergence thresholds changed between rounds

use serde::{Deserialize, Serialize};

use super::{RoundTransition, ThresholdSet};
use crate::domain::foundation::{domain_event, CaseId, EventId, RoundResultId, Timestamp};

// ════════════════════════════════════════════════════════════════════════════
// RoundAnalyzed
// ════════════════════════════════════════════════════════════════════════════

/// Published once per analyzed round, after the analysis transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundAnalyzed {
    pub event_id: EventId,
    pub case_id: CaseId,
    pub round_result_id: RoundResultId,
    pub round: u32,
    pub passed: bool,
    pub criteria_ok_percent: f64,
    pub tech_ok_percent: f64,
    pub mean_distance: f64,
    /// What happened to the case as a result.
    pub transition: RoundTransition,
    pub analyzed_at: Timestamp,
}

domain_event!(
    RoundAnalyzed,
    event_type = "round.analyzed.v1",
    aggregate_id = case_id,
    aggregate_type = "Case",
    occurred_at = analyzed_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// CaseConverged
// ════════════════════════════════════════════════════════════════════════════

/// Published when a passing round closes the case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseConverged {
    pub event_id: EventId,
    pub case_id: CaseId,
    pub final_round: u32,
    pub converged_at: Timestamp,
}

domain_event!(
    CaseConverged,
    event_type = "case.converged.v1",
    aggregate_id = case_id,
    aggregate_type = "Case",
    occurred_at = converged_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// RoundOpened
// ════════════════════════════════════════════════════════════════════════════

/// Published when a failed round opens the next one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundOpened {
    pub event_id: EventId,
    pub case_id: CaseId,
    pub round: u32,
    /// Number of (user, item) opinions that must be resubmitted.
    pub required_evaluations: usize,
    pub opened_at: Timestamp,
}

domain_event!(
    RoundOpened,
    event_type = "round.opened.v1",
    aggregate_id = case_id,
    aggregate_type = "Case",
    occurred_at = opened_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// ThresholdsUpdated
// ════════════════════════════════════════════════════════════════════════════

/// Published when a case's thresholds are replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsUpdated {
    pub event_id: EventId,
    pub case_id: CaseId,
    pub previous: ThresholdSet,
    pub current: ThresholdSet,
    pub updated_at: Timestamp,
}

domain_event!(
    ThresholdsUpdated,
    event_type = "case.thresholds_updated.v1",
    aggregate_id = case_id,
    aggregate_type = "Case",
    occurred_at = updated_at,
    event_id = event_id
);
