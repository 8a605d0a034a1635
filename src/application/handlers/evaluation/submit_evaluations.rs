//! SubmitEvaluationsHandler - Command handler for an evaluator's opinions.
//!
//! A batch is accepted or rejected as a whole. Each opinion is upserted on
//! its (case, round, user, item) key, which replaces an earlier answer and
//! clears its reevaluation flag.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::case::Case;
use crate::domain::consensus::RoundRequirements;
use crate::domain::evaluation::{Evaluation, EvaluationFilter, EvaluationKey, ItemKey};
use crate::domain::foundation::{
    CaseId, CommandMetadata, DomainError, ErrorCode, UserId, ValidationError,
};
use crate::domain::fuzzy::{FuzzyVector, LikertValue};
use crate::ports::CaseUnitOfWork;

/// One opinion in a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum OpinionInput {
    /// Answer on the seven-point scale. The score becomes the Likert value.
    Likert { item: ItemKey, value: LikertValue },
    /// Explicit triangular vector with its legacy scalar score.
    Vector {
        item: ItemKey,
        vector: FuzzyVector,
        score: f64,
    },
}

impl OpinionInput {
    pub fn item(&self) -> ItemKey {
        match self {
            OpinionInput::Likert { item, .. } | OpinionInput::Vector { item, .. } => *item,
        }
    }

    fn resolve(&self) -> Result<(FuzzyVector, f64), ValidationError> {
        match self {
            OpinionInput::Likert { value, .. } => Ok((value.to_fuzzy(), f64::from(value.value()))),
            OpinionInput::Vector { vector, score, .. } => {
                if !vector.is_finite() {
                    return Err(ValidationError::invalid_format(
                        "vector",
                        "components must be finite numbers",
                    ));
                }
                if !score.is_finite() {
                    return Err(ValidationError::invalid_format("score", "must be a finite number"));
                }
                Ok((*vector, *score))
            }
        }
    }
}

/// Command to submit opinions for the case's current round.
///
/// The evaluator is the command's acting user.
#[derive(Debug, Clone)]
pub struct SubmitEvaluationsCommand {
    pub case_id: CaseId,
    /// Reject the batch if the case has moved past this round.
    pub expected_round: Option<u32>,
    pub opinions: Vec<OpinionInput>,
}

#[derive(Debug, Clone)]
pub struct SubmitEvaluationsResult {
    pub round: u32,
    /// Records as stored, in submission order.
    pub evaluations: Vec<Evaluation>,
}

#[derive(Debug, Clone)]
pub enum SubmitEvaluationsError {
    CaseNotFound(CaseId),
    CaseClosed(CaseId),
    RoundLimitReached { case_id: CaseId, round: u32 },
    RoundMismatch { expected: u32, current: u32 },
    NotAnEvaluator(UserId),
    ItemOutOfScope(ItemKey),
    /// The item converged for this evaluator in an earlier round.
    ItemLocked(ItemKey),
    Validation(ValidationError),
    Domain(DomainError),
}

impl std::fmt::Display for SubmitEvaluationsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitEvaluationsError::CaseNotFound(id) => write!(f, "Case not found: {}", id),
            SubmitEvaluationsError::CaseClosed(id) => write!(f, "Case {} is closed", id),
            SubmitEvaluationsError::RoundLimitReached { case_id, round } => write!(
                f,
                "Case {} reached its round limit at round {}",
                case_id, round
            ),
            SubmitEvaluationsError::RoundMismatch { expected, current } => write!(
                f,
                "Submission targets round {} but the case is in round {}",
                expected, current
            ),
            SubmitEvaluationsError::NotAnEvaluator(user) => {
                write!(f, "{} is not an evaluator of this case", user)
            }
            SubmitEvaluationsError::ItemOutOfScope(item) => {
                write!(f, "Item {} is not part of this case", item)
            }
            SubmitEvaluationsError::ItemLocked(item) => {
                write!(f, "Item {} is not open for reevaluation", item)
            }
            SubmitEvaluationsError::Validation(err) => write!(f, "{}", err),
            SubmitEvaluationsError::Domain(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SubmitEvaluationsError {}

impl From<DomainError> for SubmitEvaluationsError {
    fn from(err: DomainError) -> Self {
        SubmitEvaluationsError::Domain(err)
    }
}

impl From<ValidationError> for SubmitEvaluationsError {
    fn from(err: ValidationError) -> Self {
        SubmitEvaluationsError::Validation(err)
    }
}

impl SubmitEvaluationsError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SubmitEvaluationsError::CaseNotFound(_) => ErrorCode::CaseNotFound,
            SubmitEvaluationsError::CaseClosed(_) => ErrorCode::CaseClosed,
            SubmitEvaluationsError::RoundLimitReached { .. } => ErrorCode::RoundLimitReached,
            SubmitEvaluationsError::RoundMismatch { .. } => ErrorCode::RoundMismatch,
            SubmitEvaluationsError::NotAnEvaluator(_) => ErrorCode::NotAnEvaluator,
            SubmitEvaluationsError::ItemOutOfScope(_) => ErrorCode::ItemOutOfScope,
            SubmitEvaluationsError::ItemLocked(_) => ErrorCode::ItemLocked,
            SubmitEvaluationsError::Validation(_) => ErrorCode::ValidationFailed,
            SubmitEvaluationsError::Domain(err) => err.code,
        }
    }
}

pub struct SubmitEvaluationsHandler {
    unit_of_work: Arc<dyn CaseUnitOfWork>,
}

impl SubmitEvaluationsHandler {
    pub fn new(unit_of_work: Arc<dyn CaseUnitOfWork>) -> Self {
        Self { unit_of_work }
    }

    pub async fn handle(
        &self,
        cmd: SubmitEvaluationsCommand,
        metadata: CommandMetadata,
    ) -> Result<SubmitEvaluationsResult, SubmitEvaluationsError> {
        let user_id = metadata.user_id;

        let mut tx = self.unit_of_work.begin().await?;
        let case = tx
            .lock_case(&cmd.case_id)
            .await?
            .ok_or(SubmitEvaluationsError::CaseNotFound(cmd.case_id))?;
        check_open(&case)?;

        let round = case.current_round();
        if let Some(expected) = cmd.expected_round {
            if expected != round {
                return Err(SubmitEvaluationsError::RoundMismatch {
                    expected,
                    current: round,
                });
            }
        }
        if !case.scope().is_evaluator(&user_id) {
            return Err(SubmitEvaluationsError::NotAnEvaluator(user_id));
        }

        let requirements = if round > 1 {
            let previous = tx
                .fetch_evaluations(&EvaluationFilter::for_case(cmd.case_id).round(round - 1))
                .await?;
            Some(RoundRequirements::for_round(case.scope(), round, &previous))
        } else {
            None
        };

        // Validate the whole batch before writing any of it
        let mut pending = Vec::with_capacity(cmd.opinions.len());
        for opinion in &cmd.opinions {
            let item = opinion.item();
            if !case.scope().contains_item(&item) {
                return Err(SubmitEvaluationsError::ItemOutOfScope(item));
            }
            let key = EvaluationKey::new(user_id.clone(), item);
            if requirements.as_ref().is_some_and(|r| !r.contains(&key)) {
                return Err(SubmitEvaluationsError::ItemLocked(item));
            }
            let (vector, score) = opinion.resolve()?;
            pending.push(Evaluation::new(cmd.case_id, round, user_id.clone(), item, vector, score));
        }

        let mut evaluations = Vec::with_capacity(pending.len());
        for evaluation in &pending {
            evaluations.push(tx.upsert_evaluation(evaluation).await?);
        }
        tx.commit().await?;

        info!(
            case_id = %cmd.case_id,
            round,
            user_id = %user_id,
            count = evaluations.len(),
            "Evaluations submitted"
        );

        Ok(SubmitEvaluationsResult { round, evaluations })
    }
}

fn check_open(case: &Case) -> Result<(), SubmitEvaluationsError> {
    case.ensure_round_open().map_err(|err| match err.code {
        ErrorCode::CaseClosed => SubmitEvaluationsError::CaseClosed(case.id()),
        ErrorCode::RoundLimitReached => SubmitEvaluationsError::RoundLimitReached {
            case_id: case.id(),
            round: case.current_round(),
        },
        _ => SubmitEvaluationsError::Domain(err),
    })
}
