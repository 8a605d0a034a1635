//! PostgreSQL implementation of CaseRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use super::rows::{db_err, from_round, load_case, round_state_to_str};
use crate::domain::case::Case;
use crate::domain::foundation::{CaseId, DomainError, ErrorCode};
use crate::ports::CaseRepository;

#[derive(Clone)]
pub struct PostgresCaseRepository {
    pool: PgPool,
}

impl PostgresCaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CaseRepository for PostgresCaseRepository {
    async fn save(&self, case: &Case) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let thresholds = case.thresholds();
        sqlx::query(
            r#"
            INSERT INTO cases (
                id, name, distance_mean_threshold, criteria_percent_threshold,
                tech_percent_threshold, current_round, round_status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(case.id().as_uuid())
        .bind(case.name())
        .bind(thresholds.distance_mean_threshold())
        .bind(thresholds.criteria_percent_threshold().value())
        .bind(thresholds.tech_percent_threshold().value())
        .bind(from_round(case.current_round())?)
        .bind(round_state_to_str(case.state()))
        .bind(case.created_at().as_datetime())
        .bind(case.updated_at().as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to insert case"))?;

        let scope = case.scope();
        for (position, user) in scope.evaluators().iter().enumerate() {
            sqlx::query(
                "INSERT INTO case_evaluators (case_id, user_id, position) VALUES ($1, $2, $3)",
            )
            .bind(case.id().as_uuid())
            .bind(user.as_str())
            .bind(position_of(position)?)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to insert evaluator"))?;
        }

        for (position, criterion) in scope.criteria().iter().enumerate() {
            sqlx::query(
                "INSERT INTO case_criteria (case_id, criterion_id, position) VALUES ($1, $2, $3)",
            )
            .bind(case.id().as_uuid())
            .bind(criterion.as_uuid())
            .bind(position_of(position)?)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to insert criterion"))?;
        }

        for (position, technology) in scope.technologies().iter().enumerate() {
            sqlx::query(
                "INSERT INTO case_technologies (case_id, technology_id, position) VALUES ($1, $2, $3)",
            )
            .bind(case.id().as_uuid())
            .bind(technology.as_uuid())
            .bind(position_of(position)?)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to insert technology"))?;
        }

        tx.commit()
            .await
            .map_err(db_err("Failed to commit transaction"))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &CaseId) -> Result<Option<Case>, DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_err("Failed to acquire connection"))?;
        load_case(&mut conn, id, false).await
    }
}

fn position_of(index: usize) -> Result<i32, DomainError> {
    i32::try_from(index)
        .map_err(|_| DomainError::new(ErrorCode::ValidationFailed, "Case scope is too large"))
}
