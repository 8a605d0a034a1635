//! AnalyzeRoundHandler - the round controller.
//!
//! Analyzes the current round of a case inside one case transaction:
//! checks that every required opinion is present, aggregates the effective
//! opinion pool, judges convergence, flags outlying opinions and moves the
//! case either to `Closed` or to the next round. Flags, the round result and
//! the case transition commit together; events are published afterwards.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::case::{Case, CaseConverged, RoundAnalyzed, RoundOpened, RoundTransition};
use crate::domain::consensus::{RoundAnalysis, RoundEngine, RoundOutcome, RoundResult};
use crate::domain::evaluation::{EvaluationFilter, EvaluationKey};
use crate::domain::foundation::{
    CaseId, CommandMetadata, DomainError, ErrorCode, EventEnvelope, EventId,
    SerializableDomainEvent, Timestamp,
};
use crate::ports::{CaseTransaction, CaseUnitOfWork, EventPublisher};

/// Command to analyze the current round of a case.
#[derive(Debug, Clone)]
pub struct AnalyzeRoundCommand {
    pub case_id: CaseId,
    /// Compute everything but write and publish nothing.
    pub dry_run: bool,
}

impl AnalyzeRoundCommand {
    pub fn new(case_id: CaseId) -> Self {
        Self {
            case_id,
            dry_run: false,
        }
    }

    pub fn dry_run(case_id: CaseId) -> Self {
        Self {
            case_id,
            dry_run: true,
        }
    }
}

/// Result of analyzing a round.
#[derive(Debug, Clone)]
pub struct AnalyzeRoundResult {
    /// Snapshot of the round. Persisted unless `dry_run`.
    pub round_result: RoundResult,
    /// Per-item detail behind the snapshot.
    pub analysis: RoundAnalysis,
    /// What the verdict does (or, on a dry run, would do) to the case.
    pub transition: RoundTransition,
    /// Opinions of this round that must be resubmitted, sorted.
    pub flagged: Vec<EvaluationKey>,
    pub dry_run: bool,
}

/// Error type for analyzing a round.
#[derive(Debug, Clone)]
pub enum AnalyzeRoundError {
    CaseNotFound(CaseId),
    /// Required opinions of the current round are missing. Nothing was written.
    IncompleteData {
        case_id: CaseId,
        round: u32,
        missing: Vec<EvaluationKey>,
    },
    CaseClosed(CaseId),
    /// The case stopped at its last allowed round without converging.
    RoundLimitReached { case_id: CaseId, round: u32 },
    Domain(DomainError),
}

impl std::fmt::Display for AnalyzeRoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzeRoundError::CaseNotFound(id) => write!(f, "Case not found: {}", id),
            AnalyzeRoundError::IncompleteData {
                case_id,
                round,
                missing,
            } => write!(
                f,
                "Case {} round {} is missing {} required evaluation(s)",
                case_id,
                round,
                missing.len()
            ),
            AnalyzeRoundError::CaseClosed(id) => write!(f, "Case {} is closed", id),
            AnalyzeRoundError::RoundLimitReached { case_id, round } => write!(
                f,
                "Case {} reached its round limit at round {}",
                case_id, round
            ),
            AnalyzeRoundError::Domain(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AnalyzeRoundError {}

impl From<DomainError> for AnalyzeRoundError {
    fn from(err: DomainError) -> Self {
        AnalyzeRoundError::Domain(err)
    }
}

impl AnalyzeRoundError {
    /// Stable error code, matching the domain error codes.
    pub fn code(&self) -> ErrorCode {
        match self {
            AnalyzeRoundError::CaseNotFound(_) => ErrorCode::CaseNotFound,
            AnalyzeRoundError::IncompleteData { .. } => ErrorCode::IncompleteData,
            AnalyzeRoundError::CaseClosed(_) => ErrorCode::CaseClosed,
            AnalyzeRoundError::RoundLimitReached { .. } => ErrorCode::RoundLimitReached,
            AnalyzeRoundError::Domain(err) => err.code,
        }
    }
}

/// Handler for round analysis.
pub struct AnalyzeRoundHandler {
    unit_of_work: Arc<dyn CaseUnitOfWork>,
    event_publisher: Arc<dyn EventPublisher>,
    max_rounds: Option<u32>,
}

impl AnalyzeRoundHandler {
    pub fn new(
        unit_of_work: Arc<dyn CaseUnitOfWork>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            unit_of_work,
            event_publisher,
            max_rounds: None,
        }
    }

    /// Stop opening rounds after round `max_rounds`. `None` means unbounded.
    pub fn with_max_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub async fn handle(
        &self,
        cmd: AnalyzeRoundCommand,
        metadata: CommandMetadata,
    ) -> Result<AnalyzeRoundResult, AnalyzeRoundError> {
        let case_id = cmd.case_id;

        // 1. Lock the case for the whole analysis
        let mut tx = self.unit_of_work.begin().await?;
        let case = tx
            .lock_case(&case_id)
            .await?
            .ok_or(AnalyzeRoundError::CaseNotFound(case_id))?;
        case.ensure_round_open().map_err(|err| guard_error(&case, err))?;
        let round = case.current_round();

        // 2. Run the pure analysis over rounds 1..=round
        let history = tx
            .fetch_evaluations(&EvaluationFilter::for_case(case_id).up_to_round(round))
            .await?;
        let outcome = RoundEngine::analyze(case.scope(), case.thresholds(), round, history)
            .map_err(|incomplete| {
                warn!(
                    case_id = %case_id,
                    round,
                    missing = incomplete.missing.len(),
                    "Round analysis refused: required evaluations missing"
                );
                AnalyzeRoundError::IncompleteData {
                    case_id,
                    round: incomplete.round,
                    missing: incomplete.missing,
                }
            })?;
        log_items(&case_id, &outcome.analysis);

        let round_result = RoundResult::new(case_id, round, outcome.analysis.metrics);
        let mut next = case.clone();
        let transition = next.record_analysis(round_result.passed(), self.max_rounds)?;
        let flagged = flagged_keys(&outcome);

        if cmd.dry_run {
            debug!(case_id = %case_id, round, "Dry run; discarding analysis");
            return Ok(AnalyzeRoundResult {
                round_result,
                analysis: outcome.analysis,
                transition,
                flagged,
                dry_run: true,
            });
        }

        // 3. Write flags, the snapshot and the transition atomically
        for update in &outcome.flag_updates {
            tx.upsert_evaluation_flag(&update.evaluation_id, update.needs_reevaluation)
                .await?;
        }
        tx.persist_round_result(&round_result).await?;
        apply_transition(tx.as_mut(), &case_id, transition).await?;
        tx.commit().await?;

        info!(
            case_id = %case_id,
            round,
            passed = round_result.passed(),
            flagged = flagged.len(),
            transition = ?transition,
            "Round analyzed"
        );

        // 4. Publish after commit
        let envelopes = build_events(&round_result, transition, flagged.len(), &metadata)?;
        if let Err(err) = self.event_publisher.publish_all(envelopes).await {
            tracing::error!(
                case_id = %case_id,
                round,
                error = %err,
                "Round committed but event publication failed"
            );
        }

        Ok(AnalyzeRoundResult {
            round_result,
            analysis: outcome.analysis,
            transition,
            flagged,
            dry_run: false,
        })
    }
}

fn guard_error(case: &Case, err: DomainError) -> AnalyzeRoundError {
    match err.code {
        ErrorCode::CaseClosed => AnalyzeRoundError::CaseClosed(case.id()),
        ErrorCode::RoundLimitReached => AnalyzeRoundError::RoundLimitReached {
            case_id: case.id(),
            round: case.current_round(),
        },
        _ => AnalyzeRoundError::Domain(err),
    }
}

fn log_items(case_id: &CaseId, analysis: &RoundAnalysis) {
    for item in &analysis.no_data {
        warn!(
            case_id = %case_id,
            round = analysis.round,
            item = %item,
            "No opinions for item; excluded from the round"
        );
    }
    for assessment in &analysis.items {
        debug!(
            case_id = %case_id,
            round = analysis.round,
            item = %assessment.item(),
            mean = %assessment.consensus.mean_vector,
            mean_distance = assessment.consensus.mean_distance,
            contributors = assessment.consensus.contributor_count(),
            passed = assessment.passed,
            "Item consensus"
        );
    }
}

fn flagged_keys(outcome: &RoundOutcome) -> Vec<EvaluationKey> {
    let mut keys: Vec<EvaluationKey> = outcome
        .flag_updates
        .iter()
        .filter(|u| u.needs_reevaluation)
        .map(|u| u.key.clone())
        .collect();
    keys.sort();
    keys
}

async fn apply_transition(
    tx: &mut dyn CaseTransaction,
    case_id: &CaseId,
    transition: RoundTransition,
) -> Result<(), DomainError> {
    match transition {
        RoundTransition::Closed { .. } => tx.close_case(case_id).await,
        RoundTransition::Opened { round } => tx.advance_case_round(case_id, round).await,
        RoundTransition::Stalled { round } => {
            warn!(case_id = %case_id, round, "Round limit reached without convergence");
            tx.mark_case_stalled(case_id).await
        }
    }
}

fn build_events(
    result: &RoundResult,
    transition: RoundTransition,
    flagged: usize,
    metadata: &CommandMetadata,
) -> Result<Vec<EventEnvelope>, DomainError> {
    let metrics = result.metrics();
    let now = Timestamp::now();

    let mut envelopes = vec![RoundAnalyzed {
        event_id: EventId::new(),
        case_id: result.case_id(),
        round_result_id: result.id(),
        round: result.round_number(),
        passed: result.passed(),
        criteria_ok_percent: metrics.criteria_ok_percent.value(),
        tech_ok_percent: metrics.tech_ok_percent.value(),
        mean_distance: metrics.mean_distance_value,
        transition,
        analyzed_at: *result.analyzed_at(),
    }
    .to_envelope()?];

    match transition {
        RoundTransition::Closed { round } => envelopes.push(
            CaseConverged {
                event_id: EventId::new(),
                case_id: result.case_id(),
                final_round: round,
                converged_at: now,
            }
            .to_envelope()?,
        ),
        RoundTransition::Opened { round } => envelopes.push(
            RoundOpened {
                event_id: EventId::new(),
                case_id: result.case_id(),
                round,
                required_evaluations: flagged,
                opened_at: now,
            }
            .to_envelope()?,
        ),
        RoundTransition::Stalled { .. } => {}
    }

    Ok(envelopes
        .into_iter()
        .map(|e| {
            e.with_correlation_id(metadata.correlation_id())
                .with_user_id(metadata.user_id.to_string())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDelphiStore, InMemoryEventBus};
    use crate::domain::case::{CaseScope, RoundState, ThresholdSet};
    use crate::domain::evaluation::{Evaluation, ItemKey};
    use crate::domain::foundation::{CriterionId, TechnologyId, UserId};
    use crate::domain::fuzzy::FuzzyVector;
    use crate::ports::{CaseRepository, EvaluationReader, RoundResultReader};

    // ─────────────────────────────────────────────────────────────────────
    // Test helpers
    // ─────────────────────────────────────────────────────────────────────

    const CLOSE: FuzzyVector = FuzzyVector::new(0.3, 0.5, 0.7);
    const FAR: FuzzyVector = FuzzyVector::new(0.9, 1.0, 1.0);

    struct Fixture {
        store: Arc<InMemoryDelphiStore>,
        bus: Arc<InMemoryEventBus>,
        case_id: CaseId,
        criterion: ItemKey,
        pair: ItemKey,
    }

    fn user(name: &str) -> UserId {
        UserId::new(name).unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryDelphiStore::new());
        let c = CriterionId::new();
        let t = TechnologyId::new();
        let scope = CaseScope::new(vec![user("ana"), user("bo")], vec![c], vec![t]);
        let case = Case::new(CaseId::new(), "Storage".to_string(), scope, ThresholdSet::default())
            .unwrap();
        store.save(&case).await.unwrap();
        Fixture {
            store,
            bus: Arc::new(InMemoryEventBus::new()),
            case_id: case.id(),
            criterion: ItemKey::criterion(c),
            pair: ItemKey::technology(c, t),
        }
    }

    impl Fixture {
        fn handler(&self) -> AnalyzeRoundHandler {
            AnalyzeRoundHandler::new(self.store.clone(), self.bus.clone())
        }

        async fn submit(&self, round: u32, who: &str, item: ItemKey, v: FuzzyVector) {
            let mut tx = self.store.begin().await.unwrap();
            tx.lock_case(&self.case_id).await.unwrap();
            tx.upsert_evaluation(&Evaluation::new(self.case_id, round, user(who), item, v, 4.0))
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        /// Both users agree on the criterion; the pair is split by `bo`.
        async fn submit_round(&self, round: u32, bo_pair: FuzzyVector) {
            self.submit(round, "ana", self.criterion, CLOSE).await;
            self.submit(round, "bo", self.criterion, CLOSE).await;
            self.submit(round, "ana", self.pair, CLOSE).await;
            self.submit(round, "bo", self.pair, bo_pair).await;
        }

        async fn case(&self) -> Case {
            self.store.find_by_id(&self.case_id).await.unwrap().unwrap()
        }
    }

    fn metadata() -> CommandMetadata {
        CommandMetadata::test_fixture()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tests
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn agreeing_round_closes_case() {
        let fx = fixture().await;
        fx.submit_round(1, CLOSE).await;

        let result = fx
            .handler()
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await
            .unwrap();

        assert!(result.round_result.passed());
        assert_eq!(result.transition, RoundTransition::Closed { round: 1 });
        assert!(result.flagged.is_empty());

        let case = fx.case().await;
        assert_eq!(case.state(), RoundState::Closed);
        assert_eq!(case.current_round(), 1);
        assert_eq!(fx.bus.event_types(), vec!["round.analyzed.v1", "case.converged.v1"]);
    }

    #[tokio::test]
    async fn split_round_opens_next_round_and_flags_outliers() {
        let fx = fixture().await;
        fx.submit_round(1, FAR).await;

        let result = fx
            .handler()
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await
            .unwrap();

        assert!(!result.round_result.passed());
        assert_eq!(result.transition, RoundTransition::Opened { round: 2 });
        assert_eq!(result.flagged.len(), 2);
        assert!(result.flagged.iter().all(|k| k.item == fx.pair));

        let case = fx.case().await;
        assert_eq!(case.state(), RoundState::AwaitingEvaluations(2));

        let stored = fx
            .store
            .fetch_evaluations(&EvaluationFilter::for_case(fx.case_id).item(fx.pair))
            .await
            .unwrap();
        assert!(stored.iter().all(|e| e.needs_reevaluation));

        assert_eq!(fx.bus.event_types(), vec!["round.analyzed.v1", "round.opened.v1"]);
        let opened: RoundOpened = fx.bus.events_of_type("round.opened.v1")[0].payload_as().unwrap();
        assert_eq!(opened.round, 2);
        assert_eq!(opened.required_evaluations, 2);
    }

    #[tokio::test]
    async fn missing_evaluations_leave_case_untouched() {
        let fx = fixture().await;
        fx.submit(1, "ana", fx.criterion, CLOSE).await;

        let err = fx
            .handler()
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await
            .unwrap_err();

        match &err {
            AnalyzeRoundError::IncompleteData { round, missing, .. } => {
                assert_eq!(*round, 1);
                assert_eq!(missing.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.code(), ErrorCode::IncompleteData);
        assert_eq!(fx.case().await.state(), RoundState::AwaitingEvaluations(1));
        assert!(fx.store.list_for_case(&fx.case_id).await.unwrap().is_empty());
        assert_eq!(fx.bus.event_count(), 0);
    }

    #[tokio::test]
    async fn second_round_pools_carried_opinions() {
        let fx = fixture().await;
        fx.submit_round(1, FAR).await;
        let handler = fx.handler();
        handler
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await
            .unwrap();

        // Both flagged pair opinions come back in agreement
        fx.submit(2, "ana", fx.pair, CLOSE).await;
        fx.submit(2, "bo", fx.pair, CLOSE).await;

        let result = handler
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await
            .unwrap();

        assert_eq!(result.transition, RoundTransition::Closed { round: 2 });
        let criterion = result
            .analysis
            .items
            .iter()
            .find(|a| a.item() == fx.criterion)
            .unwrap();
        assert_eq!(criterion.consensus.contributor_count(), 2);
        assert_eq!(fx.store.list_for_case(&fx.case_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing_and_is_repeatable() {
        let fx = fixture().await;
        fx.submit_round(1, FAR).await;
        let handler = fx.handler();

        let first = handler
            .handle(AnalyzeRoundCommand::dry_run(fx.case_id), metadata())
            .await
            .unwrap();
        let second = handler
            .handle(AnalyzeRoundCommand::dry_run(fx.case_id), metadata())
            .await
            .unwrap();

        assert!(first.dry_run);
        assert_eq!(first.round_result.metrics(), second.round_result.metrics());
        assert_eq!(first.flagged, second.flagged);
        assert_eq!(first.transition, RoundTransition::Opened { round: 2 });

        assert_eq!(fx.case().await.state(), RoundState::AwaitingEvaluations(1));
        assert!(fx.store.list_for_case(&fx.case_id).await.unwrap().is_empty());
        let stored = fx
            .store
            .fetch_evaluations(&EvaluationFilter::for_case(fx.case_id))
            .await
            .unwrap();
        assert!(stored.iter().all(|e| !e.needs_reevaluation));
        assert_eq!(fx.bus.event_count(), 0);
    }

    #[tokio::test]
    async fn closed_case_rejects_analysis() {
        let fx = fixture().await;
        fx.submit_round(1, CLOSE).await;
        let handler = fx.handler();
        handler
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await
            .unwrap();

        let err = handler
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzeRoundError::CaseClosed(id) if id == fx.case_id));
        assert_eq!(fx.store.list_for_case(&fx.case_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_case_is_not_found() {
        let fx = fixture().await;
        let missing = CaseId::new();
        let err = fx
            .handler()
            .handle(AnalyzeRoundCommand::new(missing), metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzeRoundError::CaseNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn round_limit_stalls_case_instead_of_opening_round() {
        let fx = fixture().await;
        fx.submit_round(1, FAR).await;
        let handler = fx.handler().with_max_rounds(Some(1));

        let result = handler
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await
            .unwrap();
        assert_eq!(result.transition, RoundTransition::Stalled { round: 1 });

        let case = fx.case().await;
        assert_eq!(case.state(), RoundState::Analyzed(1));
        assert_eq!(case.current_round(), 1);
        assert_eq!(fx.bus.event_types(), vec!["round.analyzed.v1"]);

        let err = handler
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzeRoundError::RoundLimitReached { round: 1, .. }));
    }

    #[tokio::test]
    async fn failed_commit_publishes_nothing() {
        let fx = fixture().await;
        fx.submit_round(1, CLOSE).await;
        fx.store.fail_commits(true);

        let err = fx
            .handler()
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert_eq!(fx.bus.event_count(), 0);
        fx.store.fail_commits(false);
        assert_eq!(fx.case().await.state(), RoundState::AwaitingEvaluations(1));
    }

    #[tokio::test]
    async fn publish_failure_does_not_undo_committed_round() {
        let fx = fixture().await;
        fx.submit_round(1, CLOSE).await;
        fx.bus.reject_publications(true);

        let result = fx
            .handler()
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await;

        assert!(result.is_ok());
        assert!(fx.case().await.is_closed());
    }

    #[tokio::test]
    async fn events_carry_command_correlation() {
        let fx = fixture().await;
        fx.submit_round(1, CLOSE).await;

        fx.handler()
            .handle(AnalyzeRoundCommand::new(fx.case_id), metadata())
            .await
            .unwrap();

        for envelope in fx.bus.published_events() {
            assert_eq!(
                envelope.metadata.correlation_id.as_deref(),
                Some("test-correlation-id")
            );
            assert_eq!(envelope.metadata.user_id.as_deref(), Some("operator"));
            assert_eq!(envelope.aggregate_id, fx.case_id.to_string());
        }
    }
}
