//! Evaluation reader port (read side).

use async_trait::async_trait;

use crate::domain::evaluation::{Evaluation, EvaluationFilter};
use crate::domain::foundation::DomainError;

/// Filtered, lock-free reads of committed evaluations.
#[async_trait]
pub trait EvaluationReader: Send + Sync {
    /// Returns every evaluation matching the filter, ordered by round then key.
    async fn fetch_evaluations(
        &self,
        filter: &EvaluationFilter,
    ) -> Result<Vec<Evaluation>, DomainError>;
}
