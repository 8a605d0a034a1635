//! Command metadata carried through handlers into emitted events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Who issued a command, and how to correlate what it caused.
///
/// For submissions `user_id` is the evaluator; for analysis it is the
/// operator or service that triggered the round.
///
/// ```ignore
/// let envelope = event
///     .to_envelope()?
///     .with_correlation_id(metadata.correlation_id())
///     .with_user_id(metadata.user_id.to_string());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    pub user_id: UserId,

    correlation_id: String,

    /// Where the command came from (e.g. "cli", "api").
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl CommandMetadata {
    /// Creates metadata with a freshly generated correlation ID.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            correlation_id: Uuid::new_v4().to_string(),
            source: None,
        }
    }

    /// Replaces the generated correlation ID with one from upstream.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

#[cfg(test)]
impl CommandMetadata {
    /// Fixture for handler tests.
    pub fn test_fixture() -> Self {
        Self::new(UserId::new("operator").unwrap())
            .with_correlation_id("test-correlation-id")
            .with_source("test")
    }
}
