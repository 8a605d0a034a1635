//! Round result reader port (read side).

use async_trait::async_trait;

use crate::domain::consensus::RoundResult;
use crate::domain::foundation::{CaseId, DomainError};

#[async_trait]
pub trait RoundResultReader: Send + Sync {
    /// All results of a case, ordered by round number ascending.
    async fn list_for_case(&self, case_id: &CaseId) -> Result<Vec<RoundResult>, DomainError>;

    /// The result of one round, if it was analyzed.
    async fn find_by_round(
        &self,
        case_id: &CaseId,
        round_number: u32,
    ) -> Result<Option<RoundResult>, DomainError>;

    /// The result with the highest round number.
    async fn find_latest(&self, case_id: &CaseId) -> Result<Option<RoundResult>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_result_reader_is_object_safe() {
        fn _accepts_dyn(_reader: &dyn RoundResultReader) {}
    }
}
