//! PostgreSQL implementation of CaseUnitOfWork.
//!
//! One sqlx transaction per unit of work. `lock_case` issues
//! `SELECT ... FOR UPDATE` on the case row, so concurrent analyses and
//! submissions of the same case queue behind each other until commit or
//! rollback. Dropping an uncommitted transaction rolls it back.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::rows::{
    db_err, fetch_evaluations, from_count, from_round, load_case, row_to_evaluation,
    EVALUATION_COLUMNS,
};
use crate::domain::case::{Case, ThresholdSet};
use crate::domain::consensus::RoundResult;
use crate::domain::evaluation::{Evaluation, EvaluationFilter};
use crate::domain::foundation::{CaseId, DomainError, ErrorCode, EvaluationId, Timestamp};
use crate::ports::{CaseTransaction, CaseUnitOfWork};

#[derive(Clone)]
pub struct PostgresCaseUnitOfWork {
    pool: PgPool,
}

impl PostgresCaseUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CaseUnitOfWork for PostgresCaseUnitOfWork {
    async fn begin(&self) -> Result<Box<dyn CaseTransaction>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;
        Ok(Box::new(PostgresCaseTransaction { tx }))
    }
}

pub struct PostgresCaseTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresCaseTransaction {
    async fn set_round_status(
        &mut self,
        case_id: &CaseId,
        status: &str,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE cases SET round_status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(case_id.as_uuid())
        .bind(status)
        .bind(Timestamp::now().as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(db_err("Failed to update case status"))?;

        if result.rows_affected() == 0 {
            return Err(case_not_found(case_id));
        }
        Ok(())
    }
}

#[async_trait]
impl CaseTransaction for PostgresCaseTransaction {
    async fn lock_case(&mut self, case_id: &CaseId) -> Result<Option<Case>, DomainError> {
        load_case(&mut self.tx, case_id, true).await
    }

    async fn fetch_evaluations(
        &mut self,
        filter: &EvaluationFilter,
    ) -> Result<Vec<Evaluation>, DomainError> {
        fetch_evaluations(&mut self.tx, filter).await
    }

    async fn upsert_evaluation(
        &mut self,
        evaluation: &Evaluation,
    ) -> Result<Evaluation, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO evaluations (
                id, case_id, round, user_id, criterion_id, technology_id,
                vector_a, vector_b, vector_c, score, needs_reevaluation, submitted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT ON CONSTRAINT evaluations_key_unique DO UPDATE SET
                vector_a = EXCLUDED.vector_a,
                vector_b = EXCLUDED.vector_b,
                vector_c = EXCLUDED.vector_c,
                score = EXCLUDED.score,
                needs_reevaluation = EXCLUDED.needs_reevaluation,
                submitted_at = EXCLUDED.submitted_at
            RETURNING {EVALUATION_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(evaluation.id.as_uuid())
            .bind(evaluation.case_id.as_uuid())
            .bind(from_round(evaluation.round)?)
            .bind(evaluation.user_id.as_str())
            .bind(evaluation.item.criterion_id().as_uuid())
            .bind(evaluation.item.technology_id().map(|t| *t.as_uuid()))
            .bind(evaluation.vector.a)
            .bind(evaluation.vector.b)
            .bind(evaluation.vector.c)
            .bind(evaluation.score)
            .bind(evaluation.needs_reevaluation)
            .bind(evaluation.submitted_at.as_datetime())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err("Failed to upsert evaluation"))?;

        row_to_evaluation(&row)
    }

    async fn upsert_evaluation_flag(
        &mut self,
        evaluation_id: &EvaluationId,
        needs_reevaluation: bool,
    ) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE evaluations SET needs_reevaluation = $2 WHERE id = $1")
            .bind(evaluation_id.as_uuid())
            .bind(needs_reevaluation)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err("Failed to update reevaluation flag"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::EvaluationNotFound,
                format!("Evaluation not found: {}", evaluation_id),
            ));
        }
        Ok(())
    }

    async fn persist_round_result(&mut self, result: &RoundResult) -> Result<(), DomainError> {
        let m = result.metrics();
        sqlx::query(
            r#"
            INSERT INTO round_results (
                id, case_id, round_number,
                criteria_ok_count, criteria_total_count, criteria_ok_percent, criteria_passed,
                tech_ok_count, tech_total_count, tech_ok_percent, tech_passed,
                mean_distance_value, mean_distance_ok,
                criteria_mean_distance_value, criteria_mean_distance_ok,
                tech_mean_distance_value, tech_mean_distance_ok,
                passed, analyzed_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            "#,
        )
        .bind(result.id().as_uuid())
        .bind(result.case_id().as_uuid())
        .bind(from_round(result.round_number())?)
        .bind(from_count(m.criteria_ok_count)?)
        .bind(from_count(m.criteria_total_count)?)
        .bind(m.criteria_ok_percent.value())
        .bind(m.criteria_passed)
        .bind(from_count(m.tech_ok_count)?)
        .bind(from_count(m.tech_total_count)?)
        .bind(m.tech_ok_percent.value())
        .bind(m.tech_passed)
        .bind(m.mean_distance_value)
        .bind(m.mean_distance_ok)
        .bind(m.criteria_mean_distance_value)
        .bind(m.criteria_mean_distance_ok)
        .bind(m.tech_mean_distance_value)
        .bind(m.tech_mean_distance_ok)
        .bind(m.passed)
        .bind(result.analyzed_at().as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Round {} of case {} already has a result",
                    result.round_number(),
                    result.case_id()
                ),
            ),
            _ => DomainError::database("Failed to insert round result", e),
        })?;

        Ok(())
    }

    async fn advance_case_round(
        &mut self,
        case_id: &CaseId,
        new_round: u32,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE cases SET
                current_round = $2,
                round_status = 'awaiting_evaluations',
                updated_at = $3
            WHERE id = $1 AND current_round = $2 - 1
            "#,
        )
        .bind(case_id.as_uuid())
        .bind(from_round(new_round)?)
        .bind(Timestamp::now().as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(db_err("Failed to advance case round"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::RoundMismatch,
                format!("Case {} cannot move to round {}", case_id, new_round),
            ));
        }
        Ok(())
    }

    async fn close_case(&mut self, case_id: &CaseId) -> Result<(), DomainError> {
        self.set_round_status(case_id, "closed").await
    }

    async fn mark_case_stalled(&mut self, case_id: &CaseId) -> Result<(), DomainError> {
        self.set_round_status(case_id, "analyzed").await
    }

    async fn update_case_thresholds(
        &mut self,
        case_id: &CaseId,
        thresholds: &ThresholdSet,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE cases SET
                distance_mean_threshold = $2,
                criteria_percent_threshold = $3,
                tech_percent_threshold = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(case_id.as_uuid())
        .bind(thresholds.distance_mean_threshold())
        .bind(thresholds.criteria_percent_threshold().value())
        .bind(thresholds.tech_percent_threshold().value())
        .bind(Timestamp::now().as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(db_err("Failed to update thresholds"))?;

        if result.rows_affected() == 0 {
            return Err(case_not_found(case_id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(db_err("Failed to commit transaction"))
    }
}

fn case_not_found(case_id: &CaseId) -> DomainError {
    DomainError::new(ErrorCode::CaseNotFound, format!("Case not found: {}", case_id))
}
