//! Consensus engine configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Engine-wide settings. Per-case thresholds live on the case itself.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsensusConfig {
    /// Last round that may be opened. A case failing this round stops
    /// without converging. Absent means rounds continue until consensus.
    #[serde(default)]
    pub max_rounds: Option<u32>,
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_rounds == Some(0) {
            return Err(ValidationError::InvalidMaxRounds);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_by_default() {
        let config = ConsensusConfig::default();
        assert_eq!(config.max_rounds, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_rounds_is_invalid() {
        let config = ConsensusConfig { max_rounds: Some(0) };
        assert_eq!(config.validate(), Err(ValidationError::InvalidMaxRounds));
    }

    #[test]
    fn deserializes_limit() {
        let config: ConsensusConfig = serde_json::from_str(r#"{"max_rounds": 4}"#).unwrap();
        assert_eq!(config.max_rounds, Some(4));
    }
}
