//! In-memory event bus that records published envelopes.
//!
//! Delivery is synchronous and ordered, which keeps handler tests
//! deterministic.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

/// Recording event bus.
///
/// Can be told to reject publications, to exercise failure paths.
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// handler.handle(cmd).await?;
/// assert!(bus.has_event("round.analyzed.v1"));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    published: Arc<RwLock<Vec<EventEnvelope>>>,
    reject: Arc<RwLock<bool>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Every envelope published so far, in order.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Event types published so far, in order.
    pub fn event_types(&self) -> Vec<String> {
        self.published_events()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.event_types().iter().any(|t| t == event_type)
    }

    pub fn event_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn clear(&self) {
        self.published
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Makes subsequent publications fail.
    pub fn reject_publications(&self, reject: bool) {
        *self
            .reject
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = reject;
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let rejecting = *self
            .reject
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if rejecting {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Event bus rejected {}", event.event_type),
            ));
        }

        self.published
            .write()
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "Event bus lock poisoned"))?
            .push(event);
        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::case::CaseConverged;
    use crate::domain::foundation::{CaseId, EventId, SerializableDomainEvent, Timestamp};

    fn envelope() -> EventEnvelope {
        CaseConverged {
            event_id: EventId::new(),
            case_id: CaseId::new(),
            final_round: 2,
            converged_at: Timestamp::now(),
        }
        .to_envelope()
        .unwrap()
    }

    #[tokio::test]
    async fn records_published_events_in_order() {
        let bus = InMemoryEventBus::new();
        bus.publish_all(vec![envelope(), envelope()]).await.unwrap();

        assert_eq!(bus.event_count(), 2);
        assert!(bus.has_event("case.converged.v1"));
        assert_eq!(bus.events_of_type("case.converged.v1").len(), 2);
    }

    #[tokio::test]
    async fn rejecting_bus_records_nothing() {
        let bus = InMemoryEventBus::new();
        bus.reject_publications(true);

        assert!(bus.publish(envelope()).await.is_err());
        assert_eq!(bus.event_count(), 0);
    }

    #[tokio::test]
    async fn clones_share_recordings() {
        let bus = InMemoryEventBus::new();
        let other = bus.clone();
        other.publish(envelope()).await.unwrap();
        assert_eq!(bus.event_count(), 1);
        bus.clear();
        assert_eq!(other.event_count(), 0);
    }
}
