//! Round lifecycle of a case.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Where a case stands in its round cycle.
///
/// ```text
/// AwaitingEvaluations(n) ──analyze──▶ Analyzed(n) ──passed──▶ Closed
///          ▲                               │
///          └──────────failed───────────────┘ (n + 1)
/// ```
///
/// `Analyzed(n)` is normally transient inside one analysis. It is only
/// persisted when the round limit stops the case from opening round n + 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "round", rename_all = "snake_case")]
pub enum RoundState {
    AwaitingEvaluations(u32),
    Analyzed(u32),
    Closed,
}

impl RoundState {
    /// The round this state refers to, if any.
    pub fn round(&self) -> Option<u32> {
        match self {
            RoundState::AwaitingEvaluations(n) | RoundState::Analyzed(n) => Some(*n),
            RoundState::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, RoundState::Closed)
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self, RoundState::AwaitingEvaluations(_))
    }
}

impl StateMachine for RoundState {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            RoundState::AwaitingEvaluations(n) => vec![RoundState::Analyzed(*n)],
            RoundState::Analyzed(n) => match n.checked_add(1) {
                Some(next) => vec![RoundState::AwaitingEvaluations(next), RoundState::Closed],
                None => vec![RoundState::Closed],
            },
            RoundState::Closed => vec![],
        }
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundState::AwaitingEvaluations(n) => write!(f, "awaiting evaluations (round {})", n),
            RoundState::Analyzed(n) => write!(f, "analyzed (round {})", n),
            RoundState::Closed => write!(f, "closed"),
        }
    }
}

/// Outcome of recording an analysis on a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoundTransition {
    /// The round passed; the case is closed at this round.
    Closed { round: u32 },
    /// The round failed; a new round is open.
    Opened { round: u32 },
    /// The round failed on the configured last round; nothing further opens.
    Stalled { round: u32 },
}

impl RoundTransition {
    pub fn is_closed(&self) -> bool {
        matches!(self, RoundTransition::Closed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn awaiting_only_moves_to_analyzed_same_round() {
        let s = RoundState::AwaitingEvaluations(2);
        assert!(s.can_transition_to(&RoundState::Analyzed(2)));
        assert!(!s.can_transition_to(&RoundState::Analyzed(3)));
        assert!(!s.can_transition_to(&RoundState::Closed));
    }

    #[test]
    fn analyzed_opens_next_round_or_closes() {
        let s = RoundState::Analyzed(2);
        assert!(s.can_transition_to(&RoundState::AwaitingEvaluations(3)));
        assert!(s.can_transition_to(&RoundState::Closed));
        assert!(!s.can_transition_to(&RoundState::AwaitingEvaluations(2)));
        assert!(!s.can_transition_to(&RoundState::AwaitingEvaluations(4)));
    }

    #[test]
    fn closed_is_terminal() {
        assert!(RoundState::Closed.is_terminal());
        assert!(RoundState::Closed
            .transition_to(RoundState::AwaitingEvaluations(1))
            .is_err());
    }

    #[test]
    fn last_representable_round_can_only_close() {
        assert_eq!(
            RoundState::Analyzed(u32::MAX).valid_transitions(),
            vec![RoundState::Closed]
        );
    }

    #[test]
    fn serializes_with_state_tag() {
        let json = serde_json::to_value(RoundState::AwaitingEvaluations(3)).unwrap();
        assert_eq!(json["state"], "awaiting_evaluations");
        assert_eq!(json["round"], 3);
    }
}
