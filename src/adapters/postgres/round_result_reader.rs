//! PostgreSQL implementation of RoundResultReader.

use async_trait::async_trait;
use sqlx::PgPool;

use super::rows::{db_err, from_round, row_to_round_result, ROUND_RESULT_COLUMNS};
use crate::domain::consensus::RoundResult;
use crate::domain::foundation::{CaseId, DomainError};
use crate::ports::RoundResultReader;

#[derive(Clone)]
pub struct PostgresRoundResultReader {
    pool: PgPool,
}

impl PostgresRoundResultReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoundResultReader for PostgresRoundResultReader {
    async fn list_for_case(&self, case_id: &CaseId) -> Result<Vec<RoundResult>, DomainError> {
        let sql = format!(
            "SELECT {ROUND_RESULT_COLUMNS} FROM round_results WHERE case_id = $1 ORDER BY round_number"
        );
        let rows = sqlx::query(&sql)
            .bind(case_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list round results"))?;

        rows.iter().map(row_to_round_result).collect()
    }

    async fn find_by_round(
        &self,
        case_id: &CaseId,
        round_number: u32,
    ) -> Result<Option<RoundResult>, DomainError> {
        let sql = format!(
            "SELECT {ROUND_RESULT_COLUMNS} FROM round_results WHERE case_id = $1 AND round_number = $2"
        );
        let row = sqlx::query(&sql)
            .bind(case_id.as_uuid())
            .bind(from_round(round_number)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to fetch round result"))?;

        row.as_ref().map(row_to_round_result).transpose()
    }

    async fn find_latest(&self, case_id: &CaseId) -> Result<Option<RoundResult>, DomainError> {
        let sql = format!(
            "SELECT {ROUND_RESULT_COLUMNS} FROM round_results WHERE case_id = $1 \
             ORDER BY round_number DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(case_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to fetch latest round result"))?;

        row.as_ref().map(row_to_round_result).transpose()
    }
}
