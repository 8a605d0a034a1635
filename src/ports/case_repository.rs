//! Case repository port.
//!
//! Case creation and lookup. Round transitions and threshold changes go
//! through [`CaseUnitOfWork`](super::CaseUnitOfWork) so they happen under the
//! per-case lock.

use async_trait::async_trait;

use crate::domain::case::Case;
use crate::domain::foundation::{CaseId, DomainError};

#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Save a new case together with its scope.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn save(&self, case: &Case) -> Result<(), DomainError>;

    /// Find a case by its ID.
    ///
    /// Returns `None` if not found.
    async fn find_by_id(&self, id: &CaseId) -> Result<Option<Case>, DomainError>;
}
