//! GetRoundResultsHandler - Query handler for a case's round history.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::consensus::RoundResult;
use crate::domain::foundation::{CaseId, DomainError};
use crate::ports::{CaseRepository, RoundResultReader};

/// Which results to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "select", content = "round", rename_all = "snake_case")]
pub enum RoundSelection {
    All,
    Latest,
    Round(u32),
}

/// Query for round results of a case.
#[derive(Debug, Clone)]
pub struct GetRoundResultsQuery {
    pub case_id: CaseId,
    pub selection: RoundSelection,
}

impl GetRoundResultsQuery {
    pub fn all(case_id: CaseId) -> Self {
        Self {
            case_id,
            selection: RoundSelection::All,
        }
    }
}

/// Results ordered by round number ascending.
pub type GetRoundResultsResult = Vec<RoundResult>;

#[derive(Debug, Clone)]
pub enum GetRoundResultsError {
    CaseNotFound(CaseId),
    /// The requested round has not been analyzed.
    RoundNotFound { case_id: CaseId, round: u32 },
    Infrastructure(String),
}

impl std::fmt::Display for GetRoundResultsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GetRoundResultsError::CaseNotFound(id) => write!(f, "Case not found: {}", id),
            GetRoundResultsError::RoundNotFound { case_id, round } => {
                write!(f, "Case {} has no result for round {}", case_id, round)
            }
            GetRoundResultsError::Infrastructure(msg) => write!(f, "Infrastructure error: {}", msg),
        }
    }
}

impl std::error::Error for GetRoundResultsError {}

impl From<DomainError> for GetRoundResultsError {
    fn from(err: DomainError) -> Self {
        GetRoundResultsError::Infrastructure(err.to_string())
    }
}

pub struct GetRoundResultsHandler {
    case_repository: Arc<dyn CaseRepository>,
    reader: Arc<dyn RoundResultReader>,
}

impl GetRoundResultsHandler {
    pub fn new(case_repository: Arc<dyn CaseRepository>, reader: Arc<dyn RoundResultReader>) -> Self {
        Self {
            case_repository,
            reader,
        }
    }

    /// An empty list for `All` or `Latest` means no round was analyzed yet.
    pub async fn handle(
        &self,
        query: GetRoundResultsQuery,
    ) -> Result<GetRoundResultsResult, GetRoundResultsError> {
        let case_id = query.case_id;
        if self.case_repository.find_by_id(&case_id).await?.is_none() {
            return Err(GetRoundResultsError::CaseNotFound(case_id));
        }

        match query.selection {
            RoundSelection::All => Ok(self.reader.list_for_case(&case_id).await?),
            RoundSelection::Latest => Ok(self.reader.find_latest(&case_id).await?.into_iter().collect()),
            RoundSelection::Round(round) => self
                .reader
                .find_by_round(&case_id, round)
                .await?
                .map(|r| vec![r])
                .ok_or(GetRoundResultsError::RoundNotFound { case_id, round }),
        }
    }
}
