//! Configuration management for fetchledger
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file (`config/fetchledger.toml` or `$FETCHLEDGER_CONFIG`)
//! 3. A `.env` file in the working directory, loaded via dotenvy
//! 4. `FETCHLEDGER__SECTION__KEY` environment variables (highest priority)
//!
//! `.env` entries never override variables already set in the environment.
//!
//! # Usage
//!
//! ```no_run
//! use fetchledger::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Ledger lives at: {}", config.ledger.path.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `FETCHLEDGER__<section>__<key>`
//!
//! Examples:
//! - `FETCHLEDGER__LEDGER__PATH=/var/lib/fetchledger`
//! - `FETCHLEDGER__RETRY__MAX_ATTEMPTS=5`
//! - `FETCHLEDGER__PROVIDERS__STEAM__WINDOW=5m`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/fetchledger.toml`.
//! This can be overridden using the `FETCHLEDGER_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    Config, HttpSettings, LedgerConfig, OrchestratorConfig, ProviderLimit, RetryConfig,
};
pub use sources::config_path;
pub use validation::ValidationError;

use crate::fetch::HttpConfig;
use crate::limiter::{RateLimit, RateLimiter};
use crate::retry::RetryPolicy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`FETCHLEDGER__*`)
    /// 2. TOML file (default: `config/fetchledger.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    /// Limiter with every configured provider ceiling
    pub fn rate_limiter(&self) -> RateLimiter {
        let mut limiter = RateLimiter::new();
        if let Some(limit) = self.default_limit {
            limiter = limiter.with_default_limit(limit.into());
        }
        for (provider, limit) in &self.providers {
            limiter = limiter.with_limit(provider.clone(), (*limit).into());
        }
        limiter
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: self.http.connect_timeout.as_duration(),
            request_timeout: self.http.request_timeout.as_duration(),
            user_agent: self.http.user_agent.clone(),
        }
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl From<ProviderLimit> for RateLimit {
    fn from(limit: ProviderLimit) -> Self {
        RateLimit::new(limit.max_calls_per_window, limit.window.as_duration())
    }
}
