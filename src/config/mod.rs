//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `FUZZY_DELPHI` prefix
//! and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use fuzzy_delphi::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod consensus;
mod database;
mod error;
mod logging;

pub use consensus::ConsensusConfig;
pub use database::{DatabaseConfig, MAX_POOL_SIZE};
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;

use serde::Deserialize;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "FUZZY_DELPHI";

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub consensus: ConsensusConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Reads `.env` if present, then every `FUZZY_DELPHI__*` variable:
    ///
    /// - `FUZZY_DELPHI__DATABASE__URL=...` -> `database.url`
    /// - `FUZZY_DELPHI__LOGGING__JSON=true` -> `logging.json`
    /// - `FUZZY_DELPHI__CONSENSUS__MAX_ROUNDS=5` -> `consensus.max_rounds`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.logging.validate()?;
        self.consensus.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 4] = [
        "FUZZY_DELPHI__DATABASE__URL",
        "FUZZY_DELPHI__LOGGING__LEVEL",
        "FUZZY_DELPHI__LOGGING__JSON",
        "FUZZY_DELPHI__CONSENSUS__MAX_ROUNDS",
    ];

    fn set_minimal_env() {
        env::set_var("FUZZY_DELPHI__DATABASE__URL", "postgresql://test@localhost/delphi");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn loads_minimal_environment_with_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/delphi");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.consensus.max_rounds, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reads_nested_sections() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("FUZZY_DELPHI__LOGGING__LEVEL", "debug");
        env::set_var("FUZZY_DELPHI__LOGGING__JSON", "true");
        env::set_var("FUZZY_DELPHI__CONSENSUS__MAX_ROUNDS", "3");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.consensus.max_rounds, Some(3));
    }

    #[test]
    fn missing_database_url_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert!(AppConfig::load().is_err());
    }

    #[test]
    fn validation_covers_every_section() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("FUZZY_DELPHI__CONSENSUS__MAX_ROUNDS", "0");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.validate(), Err(ValidationError::InvalidMaxRounds));
    }
}
