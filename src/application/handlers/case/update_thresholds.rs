//! UpdateThresholdsHandler - Command handler for replacing a case's thresholds.
//!
//! Runs under the case lock so a threshold change never lands in the middle
//! of an analysis. The new set applies from the next analysis on.

use std::sync::Arc;

use tracing::info;

use crate::domain::case::{ThresholdSet, ThresholdsUpdated};
use crate::domain::foundation::{
    CaseId, CommandMetadata, DomainError, ErrorCode, EventId, SerializableDomainEvent, Timestamp,
    ValidationError,
};
use crate::ports::{CaseUnitOfWork, EventPublisher};

/// Command to replace the thresholds. Values are validated by the handler.
#[derive(Debug, Clone)]
pub struct UpdateThresholdsCommand {
    pub case_id: CaseId,
    pub distance_mean_threshold: f64,
    pub criteria_percent_threshold: f64,
    pub tech_percent_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct UpdateThresholdsResult {
    pub previous: ThresholdSet,
    pub current: ThresholdSet,
    pub event: ThresholdsUpdated,
}

#[derive(Debug, Clone)]
pub enum UpdateThresholdsError {
    CaseNotFound(CaseId),
    CaseClosed(CaseId),
    InvalidThreshold(ValidationError),
    Domain(DomainError),
}

impl std::fmt::Display for UpdateThresholdsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateThresholdsError::CaseNotFound(id) => write!(f, "Case not found: {}", id),
            UpdateThresholdsError::CaseClosed(id) => write!(f, "Case {} is closed", id),
            UpdateThresholdsError::InvalidThreshold(err) => write!(f, "Invalid threshold: {}", err),
            UpdateThresholdsError::Domain(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for UpdateThresholdsError {}

impl From<DomainError> for UpdateThresholdsError {
    fn from(err: DomainError) -> Self {
        UpdateThresholdsError::Domain(err)
    }
}

impl UpdateThresholdsError {
    pub fn code(&self) -> ErrorCode {
        match self {
            UpdateThresholdsError::CaseNotFound(_) => ErrorCode::CaseNotFound,
            UpdateThresholdsError::CaseClosed(_) => ErrorCode::CaseClosed,
            UpdateThresholdsError::InvalidThreshold(_) => ErrorCode::InvalidThreshold,
            UpdateThresholdsError::Domain(err) => err.code,
        }
    }
}

pub struct UpdateThresholdsHandler {
    unit_of_work: Arc<dyn CaseUnitOfWork>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl UpdateThresholdsHandler {
    pub fn new(
        unit_of_work: Arc<dyn CaseUnitOfWork>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            unit_of_work,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: UpdateThresholdsCommand,
        metadata: CommandMetadata,
    ) -> Result<UpdateThresholdsResult, UpdateThresholdsError> {
        let thresholds = ThresholdSet::new(
            cmd.distance_mean_threshold,
            cmd.criteria_percent_threshold,
            cmd.tech_percent_threshold,
        )
        .map_err(UpdateThresholdsError::InvalidThreshold)?;

        let mut tx = self.unit_of_work.begin().await?;
        let mut case = tx
            .lock_case(&cmd.case_id)
            .await?
            .ok_or(UpdateThresholdsError::CaseNotFound(cmd.case_id))?;

        let previous = case.update_thresholds(thresholds).map_err(|err| match err.code {
            ErrorCode::CaseClosed => UpdateThresholdsError::CaseClosed(cmd.case_id),
            _ => UpdateThresholdsError::Domain(err),
        })?;
        tx.update_case_thresholds(&cmd.case_id, &thresholds).await?;
        tx.commit().await?;

        info!(
            case_id = %cmd.case_id,
            distance = thresholds.distance_mean_threshold(),
            criteria_percent = thresholds.criteria_percent_threshold().value(),
            tech_percent = thresholds.tech_percent_threshold().value(),
            "Thresholds updated"
        );

        let event = ThresholdsUpdated {
            event_id: EventId::new(),
            case_id: cmd.case_id,
            previous,
            current: thresholds,
            updated_at: Timestamp::now(),
        };
        let envelope = event
            .to_envelope()?
            .with_correlation_id(metadata.correlation_id())
            .with_user_id(metadata.user_id.to_string());
        if let Err(err) = self.event_publisher.publish(envelope).await {
            tracing::error!(case_id = %cmd.case_id, error = %err, "Threshold event publication failed");
        }

        Ok(UpdateThresholdsResult {
            previous,
            current: thresholds,
            event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDelphiStore, InMemoryEventBus};
    use crate::domain::case::{Case, CaseScope, DEFAULT_DISTANCE_MEAN_THRESHOLD};
    use crate::ports::CaseRepository;

    async fn setup(closed: bool) -> (Arc<InMemoryDelphiStore>, Arc<InMemoryEventBus>, CaseId) {
        let store = Arc::new(InMemoryDelphiStore::new());
        let mut case = Case::new(
            CaseId::new(),
            "Geothermal".to_string(),
            CaseScope::default(),
            ThresholdSet::default(),
        )
        .unwrap();
        if closed {
            case.record_analysis(true, None).unwrap();
        }
        store.save(&case).await.unwrap();
        (store, Arc::new(InMemoryEventBus::new()), case.id())
    }

    fn command(case_id: CaseId, distance: f64, criteria: f64, tech: f64) -> UpdateThresholdsCommand {
        UpdateThresholdsCommand {
            case_id,
            distance_mean_threshold: distance,
            criteria_percent_threshold: criteria,
            tech_percent_threshold: tech,
        }
    }

    #[tokio::test]
    async fn replaces_thresholds_and_publishes() {
        let (store, bus, case_id) = setup(false).await;
        let handler = UpdateThresholdsHandler::new(store.clone(), bus.clone());

        let result = handler
            .handle(command(case_id, 0.2, 60.0, 50.0), CommandMetadata::test_fixture())
            .await
            .unwrap();

        assert_eq!(result.previous.distance_mean_threshold(), DEFAULT_DISTANCE_MEAN_THRESHOLD);
        let stored = store.find_by_id(&case_id).await.unwrap().unwrap();
        assert_eq!(stored.thresholds().distance_mean_threshold(), 0.2);
        assert_eq!(stored.thresholds().tech_percent_threshold().value(), 50.0);
        assert_eq!(bus.event_types(), vec!["case.thresholds_updated.v1"]);
    }

    #[tokio::test]
    async fn boundary_percentages_are_accepted() {
        let (store, bus, case_id) = setup(false).await;
        let handler = UpdateThresholdsHandler::new(store, bus);
        assert!(handler
            .handle(command(case_id, 0.1, 0.0, 100.0), CommandMetadata::test_fixture())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn invalid_values_are_rejected_before_locking() {
        let (store, bus, case_id) = setup(false).await;
        let handler = UpdateThresholdsHandler::new(store.clone(), bus.clone());

        for cmd in [
            command(case_id, 0.0, 75.0, 75.0),
            command(case_id, f64::INFINITY, 75.0, 75.0),
            command(case_id, 0.2, 101.0, 75.0),
            command(case_id, 0.2, 75.0, -1.0),
        ] {
            let err = handler.handle(cmd, CommandMetadata::test_fixture()).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidThreshold);
        }
        assert_eq!(bus.event_count(), 0);
        let stored = store.find_by_id(&case_id).await.unwrap().unwrap();
        assert_eq!(*stored.thresholds(), ThresholdSet::default());
    }

    #[tokio::test]
    async fn closed_case_keeps_its_thresholds() {
        let (store, bus, case_id) = setup(true).await;
        let handler = UpdateThresholdsHandler::new(store, bus.clone());
        let err = handler
            .handle(command(case_id, 0.3, 50.0, 50.0), CommandMetadata::test_fixture())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateThresholdsError::CaseClosed(_)));
        assert_eq!(bus.event_count(), 0);
    }

    #[tokio::test]
    async fn unknown_case_is_not_found() {
        let (store, bus, _) = setup(false).await;
        let handler = UpdateThresholdsHandler::new(store, bus);
        let err = handler
            .handle(command(CaseId::new(), 0.3, 50.0, 50.0), CommandMetadata::test_fixture())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CaseNotFound);
    }
}
