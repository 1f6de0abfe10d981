use super::models::{Config, ProviderLimit};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("retry.max_attempts must be at least 1")]
    ZeroMaxAttempts,

    #[error("retry.base_backoff ({base}) exceeds retry.max_backoff ({max})")]
    BackoffRange { base: String, max: String },

    #[error("orchestrator.worker_pool_size must be at least 1")]
    ZeroWorkerPool,

    #[error("Provider '{provider}': max_calls_per_window must be at least 1")]
    ZeroCallsPerWindow { provider: String },

    #[error("Provider '{provider}': window must be positive")]
    ZeroWindow { provider: String },

    #[error("ledger.refresh_after must be positive when set")]
    ZeroRefreshWindow,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_retry(config)?;
    validate_orchestrator(config)?;
    validate_limits(config)?;
    validate_ledger(config)?;
    Ok(())
}

fn validate_retry(config: &Config) -> Result<(), ValidationError> {
    let retry = &config.retry;
    if retry.max_attempts == 0 {
        return Err(ValidationError::ZeroMaxAttempts);
    }
    if retry.base_backoff > retry.max_backoff {
        return Err(ValidationError::BackoffRange {
            base: retry.base_backoff.to_string(),
            max: retry.max_backoff.to_string(),
        });
    }
    Ok(())
}

fn validate_orchestrator(config: &Config) -> Result<(), ValidationError> {
    if config.orchestrator.worker_pool_size == 0 {
        return Err(ValidationError::ZeroWorkerPool);
    }
    Ok(())
}

fn validate_limits(config: &Config) -> Result<(), ValidationError> {
    if let Some(limit) = &config.default_limit {
        validate_limit("default", limit)?;
    }
    for (provider, limit) in &config.providers {
        validate_limit(provider, limit)?;
    }
    Ok(())
}

fn validate_limit(provider: &str, limit: &ProviderLimit) -> Result<(), ValidationError> {
    if limit.max_calls_per_window == 0 {
        return Err(ValidationError::ZeroCallsPerWindow {
            provider: provider.to_string(),
        });
    }
    if limit.window.is_zero() {
        return Err(ValidationError::ZeroWindow {
            provider: provider.to_string(),
        });
    }
    Ok(())
}

fn validate_ledger(config: &Config) -> Result<(), ValidationError> {
    if config.ledger.refresh_after.is_some_and(|d| d.is_zero()) {
        return Err(ValidationError::ZeroRefreshWindow);
    }
    Ok(())
}
