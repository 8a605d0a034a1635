//! PostgreSQL implementation of EvaluationReader.

use async_trait::async_trait;
use sqlx::PgPool;

use super::rows::{db_err, fetch_evaluations};
use crate::domain::evaluation::{Evaluation, EvaluationFilter};
use crate::domain::foundation::DomainError;
use crate::ports::EvaluationReader;

#[derive(Clone)]
pub struct PostgresEvaluationReader {
    pool: PgPool,
}

impl PostgresEvaluationReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvaluationReader for PostgresEvaluationReader {
    async fn fetch_evaluations(
        &self,
        filter: &EvaluationFilter,
    ) -> Result<Vec<Evaluation>, DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_err("Failed to acquire connection"))?;
        fetch_evaluations(&mut conn, filter).await
    }
}
