//! Row mapping, type conversions and queries shared by the PostgreSQL adapters.

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::domain::case::{Case, CaseScope, RoundState, ThresholdSet};
use crate::domain::consensus::{RoundMetrics, RoundResult};
use crate::domain::evaluation::{Evaluation, EvaluationFilter, ItemKey};
use crate::domain::foundation::{
    CaseId, CriterionId, DomainError, ErrorCode, EvaluationId, Percentage, RoundResultId,
    TechnologyId, Timestamp, UserId,
};
use crate::domain::fuzzy::FuzzyVector;

pub(super) const EVALUATION_COLUMNS: &str = "id, case_id, round, user_id, criterion_id, \
    technology_id, vector_a, vector_b, vector_c, score, needs_reevaluation, submitted_at";

pub(super) const ROUND_RESULT_COLUMNS: &str = "id, case_id, round_number, \
    criteria_ok_count, criteria_total_count, criteria_ok_percent, criteria_passed, \
    tech_ok_count, tech_total_count, tech_ok_percent, tech_passed, \
    mean_distance_value, mean_distance_ok, criteria_mean_distance_value, \
    criteria_mean_distance_ok, tech_mean_distance_value, tech_mean_distance_ok, \
    passed, analyzed_at";

pub(super) fn db_err(context: &str) -> impl Fn(sqlx::Error) -> DomainError + '_ {
    move |e| DomainError::database(context, e)
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::database(&format!("Failed to read column {}", name), e))
}

// ════════════════════════════════════════════════════════════════════════════════
// Cases
// ════════════════════════════════════════════════════════════════════════════════

/// Loads a case with its scope; `for_update` takes the row lock.
pub(super) async fn load_case(
    conn: &mut PgConnection,
    id: &CaseId,
    for_update: bool,
) -> Result<Option<Case>, DomainError> {
    let sql = format!(
        r#"
        SELECT id, name, distance_mean_threshold, criteria_percent_threshold,
               tech_percent_threshold, current_round, round_status, created_at, updated_at
        FROM cases WHERE id = $1{}
        "#,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("Failed to fetch case"))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let scope = load_scope(conn, id).await?;
    row_to_case(&row, scope).map(Some)
}

async fn load_scope(conn: &mut PgConnection, id: &CaseId) -> Result<CaseScope, DomainError> {
    let evaluators: Vec<String> = sqlx::query_scalar(
        "SELECT user_id FROM case_evaluators WHERE case_id = $1 ORDER BY position",
    )
    .bind(id.as_uuid())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err("Failed to load evaluators"))?;

    let criteria: Vec<Uuid> = sqlx::query_scalar(
        "SELECT criterion_id FROM case_criteria WHERE case_id = $1 ORDER BY position",
    )
    .bind(id.as_uuid())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err("Failed to load criteria"))?;

    let technologies: Vec<Uuid> = sqlx::query_scalar(
        "SELECT technology_id FROM case_technologies WHERE case_id = $1 ORDER BY position",
    )
    .bind(id.as_uuid())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err("Failed to load technologies"))?;

    let evaluators = evaluators
        .into_iter()
        .map(UserId::new)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CaseScope::new(
        evaluators,
        criteria.into_iter().map(CriterionId::from_uuid).collect(),
        technologies.into_iter().map(TechnologyId::from_uuid).collect(),
    ))
}

fn row_to_case(row: &PgRow, scope: CaseScope) -> Result<Case, DomainError> {
    let id: Uuid = col(row, "id")?;
    let current_round = to_round(col(row, "current_round")?)?;
    let status: String = col(row, "round_status")?;
    let thresholds = ThresholdSet::new(
        col(row, "distance_mean_threshold")?,
        col(row, "criteria_percent_threshold")?,
        col(row, "tech_percent_threshold")?,
    )?;
    let created_at: chrono::DateTime<chrono::Utc> = col(row, "created_at")?;
    let updated_at: chrono::DateTime<chrono::Utc> = col(row, "updated_at")?;

    Ok(Case::reconstitute(
        CaseId::from_uuid(id),
        col(row, "name")?,
        scope,
        thresholds,
        current_round,
        str_to_round_state(&status, current_round)?,
        Timestamp::from_datetime(created_at),
        Timestamp::from_datetime(updated_at),
    ))
}

// ════════════════════════════════════════════════════════════════════════════════
// Evaluations
// ════════════════════════════════════════════════════════════════════════════════

pub(super) async fn fetch_evaluations(
    conn: &mut PgConnection,
    filter: &EvaluationFilter,
) -> Result<Vec<Evaluation>, DomainError> {
    let sql = format!(
        r#"
        SELECT {EVALUATION_COLUMNS}
        FROM evaluations
        WHERE case_id = $1
          AND ($2::INTEGER IS NULL OR round = $2)
          AND ($3::INTEGER IS NULL OR round <= $3)
          AND (NOT $4 OR (criterion_id = $5 AND technology_id IS NOT DISTINCT FROM $6))
          AND ($7::TEXT IS NULL OR user_id = $7)
        ORDER BY round, user_id, criterion_id, technology_id NULLS FIRST
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(filter.case_id.as_uuid())
        .bind(filter.round.map(from_round).transpose()?)
        .bind(filter.up_to_round.map(from_round).transpose()?)
        .bind(filter.item.is_some())
        .bind(filter.item.map(|i| *i.criterion_id().as_uuid()))
        .bind(filter.item.and_then(|i| i.technology_id()).map(|t| *t.as_uuid()))
        .bind(filter.user_id.as_ref().map(|u| u.as_str().to_string()))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err("Failed to fetch evaluations"))?;

    rows.iter().map(row_to_evaluation).collect()
}

pub(super) fn row_to_evaluation(row: &PgRow) -> Result<Evaluation, DomainError> {
    let criterion_id = CriterionId::from_uuid(col(row, "criterion_id")?);
    let technology_id: Option<Uuid> = col(row, "technology_id")?;
    let item = match technology_id {
        Some(t) => ItemKey::technology(criterion_id, TechnologyId::from_uuid(t)),
        None => ItemKey::criterion(criterion_id),
    };
    let user_id: String = col(row, "user_id")?;
    let submitted_at: chrono::DateTime<chrono::Utc> = col(row, "submitted_at")?;

    Ok(Evaluation {
        id: EvaluationId::from_uuid(col(row, "id")?),
        case_id: CaseId::from_uuid(col(row, "case_id")?),
        round: to_round(col(row, "round")?)?,
        user_id: UserId::new(user_id)?,
        item,
        vector: FuzzyVector::new(
            col(row, "vector_a")?,
            col(row, "vector_b")?,
            col(row, "vector_c")?,
        ),
        score: col(row, "score")?,
        needs_reevaluation: col(row, "needs_reevaluation")?,
        submitted_at: Timestamp::from_datetime(submitted_at),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Round results
// ════════════════════════════════════════════════════════════════════════════════

pub(super) fn row_to_round_result(row: &PgRow) -> Result<RoundResult, DomainError> {
    let analyzed_at: chrono::DateTime<chrono::Utc> = col(row, "analyzed_at")?;
    let metrics = RoundMetrics {
        criteria_ok_count: to_count(col(row, "criteria_ok_count")?)?,
        criteria_total_count: to_count(col(row, "criteria_total_count")?)?,
        criteria_ok_percent: to_percent(col(row, "criteria_ok_percent")?)?,
        criteria_passed: col(row, "criteria_passed")?,
        tech_ok_count: to_count(col(row, "tech_ok_count")?)?,
        tech_total_count: to_count(col(row, "tech_total_count")?)?,
        tech_ok_percent: to_percent(col(row, "tech_ok_percent")?)?,
        tech_passed: col(row, "tech_passed")?,
        mean_distance_value: col(row, "mean_distance_value")?,
        mean_distance_ok: col(row, "mean_distance_ok")?,
        criteria_mean_distance_value: col(row, "criteria_mean_distance_value")?,
        criteria_mean_distance_ok: col(row, "criteria_mean_distance_ok")?,
        tech_mean_distance_value: col(row, "tech_mean_distance_value")?,
        tech_mean_distance_ok: col(row, "tech_mean_distance_ok")?,
        passed: col(row, "passed")?,
    };

    Ok(RoundResult::reconstitute(
        RoundResultId::from_uuid(col(row, "id")?),
        CaseId::from_uuid(col(row, "case_id")?),
        to_round(col(row, "round_number")?)?,
        metrics,
        Timestamp::from_datetime(analyzed_at),
    ))
}

// ════════════════════════════════════════════════════════════════════════════════
// Type Conversions
// ════════════════════════════════════════════════════════════════════════════════

pub(super) fn round_state_to_str(state: RoundState) -> &'static str {
    match state {
        RoundState::AwaitingEvaluations(_) => "awaiting_evaluations",
        RoundState::Analyzed(_) => "analyzed",
        RoundState::Closed => "closed",
    }
}

pub(super) fn str_to_round_state(s: &str, current_round: u32) -> Result<RoundState, DomainError> {
    match s {
        "awaiting_evaluations" => Ok(RoundState::AwaitingEvaluations(current_round)),
        "analyzed" => Ok(RoundState::Analyzed(current_round)),
        "closed" => Ok(RoundState::Closed),
        _ => Err(DomainError::new(
            ErrorCode::InvalidFormat,
            format!("Invalid round status: {}", s),
        )),
    }
}

pub(super) fn from_round(round: u32) -> Result<i32, DomainError> {
    i32::try_from(round).map_err(|_| {
        DomainError::new(ErrorCode::InvalidFormat, format!("Round {} out of range", round))
    })
}

pub(super) fn to_round(value: i32) -> Result<u32, DomainError> {
    u32::try_from(value).map_err(|_| {
        DomainError::new(ErrorCode::InvalidFormat, format!("Invalid round number: {}", value))
    })
}

pub(super) fn from_count(count: usize) -> Result<i32, DomainError> {
    i32::try_from(count).map_err(|_| {
        DomainError::new(ErrorCode::InvalidFormat, format!("Count {} out of range", count))
    })
}

fn to_count(value: i32) -> Result<usize, DomainError> {
    usize::try_from(value).map_err(|_| {
        DomainError::new(ErrorCode::InvalidFormat, format!("Invalid count: {}", value))
    })
}

fn to_percent(value: f64) -> Result<Percentage, DomainError> {
    Percentage::try_new(value).map_err(DomainError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_state_round_trips_through_status_column() {
        for state in [
            RoundState::AwaitingEvaluations(3),
            RoundState::Analyzed(3),
            RoundState::Closed,
        ] {
            let restored = str_to_round_state(round_state_to_str(state), 3).unwrap();
            assert_eq!(restored, state);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = str_to_round_state("paused", 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFormat);
    }

    #[test]
    fn negative_round_is_rejected() {
        assert!(to_round(-1).is_err());
        assert_eq!(to_round(4).unwrap(), 4);
        assert!(from_round(u32::MAX).is_err());
    }
}
