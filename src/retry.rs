//! Retry and quarantine decisions
//!
//! Failures are either transient (worth another attempt after a backoff)
//! or permanent (quarantined at once). Transient failures turn into a
//! quarantine too once an item has used up its attempts for the run.

use std::time::Duration;

use bon::Builder;
use rand::Rng;

use crate::config::RetryConfig;
use crate::fetch::FetchError;
use crate::ledger::FailureCause;

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    Quarantine { cause: FailureCause },
}

#[derive(Debug, Clone, Builder)]
pub struct RetryPolicy {
    #[builder(default = Duration::from_secs(1))]
    base_backoff: Duration,
    #[builder(default = Duration::from_secs(60))]
    max_backoff: Duration,
    #[builder(default = 3)]
    max_attempts: u32,
    /// Scale each delay into [50%, 100%] so items failing together do
    /// not retry together
    #[builder(default = false)]
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::builder()
            .base_backoff(config.base_backoff.as_duration())
            .max_backoff(config.max_backoff.as_duration())
            .max_attempts(config.max_attempts)
            .jitter(config.jitter)
            .build()
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn classify(&self, error: &FetchError) -> ErrorClass {
        match error {
            FetchError::Timeout
            | FetchError::Network(_)
            | FetchError::RateLimited { .. }
            | FetchError::TryAgain(_)
            | FetchError::Sink(_) => ErrorClass::Transient,
            FetchError::Http { status, .. } => match status {
                408 | 429 | 500..=599 => ErrorClass::Transient,
                _ => ErrorClass::Permanent,
            },
            FetchError::MalformedRequest(_) | FetchError::InvalidItem(_) => ErrorClass::Permanent,
        }
    }

    /// `min(base * 2^(attempt - 1), max)`, jittered if enabled
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff);

        if self.jitter && !delay.is_zero() {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }

    /// Permanent errors and spent attempt budgets end in quarantine
    pub fn should_quarantine(&self, attempt: u32, error: &FetchError) -> bool {
        self.classify(error) == ErrorClass::Permanent || attempt >= self.max_attempts
    }

    pub fn cause_for(&self, attempt: u32, error: &FetchError) -> FailureCause {
        match self.classify(error) {
            ErrorClass::Permanent => FailureCause::permanent(error.to_string()),
            ErrorClass::Transient => FailureCause::attempts_exhausted(format!(
                "{} (after {} attempts)",
                error, attempt
            )),
        }
    }

    /// Decide the next step after attempt number `attempt` failed with `error`
    pub fn decide(&self, attempt: u32, error: &FetchError) -> RetryDecision {
        if self.should_quarantine(attempt, error) {
            return RetryDecision::Quarantine {
                cause: self.cause_for(attempt, error),
            };
        }

        let mut delay = self.next_delay(attempt);
        if let Some(hint) = error.retry_after() {
            delay = delay.max(hint);
        }
        RetryDecision::Retry { delay }
    }
}
