use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub http: HttpSettings,
    /// Ceiling applied to providers without their own entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_limit: Option<ProviderLimit>,
    /// Per-provider call ceilings, keyed by provider name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderLimit>,
}

/// Durable ledger location and freshness
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
    /// Successes older than this are fetched again; unset means never
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_after: Option<HumanDuration>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
            refresh_after: None,
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

/// Backoff and attempt budget
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_base_backoff")]
    pub base_backoff: HumanDuration,
    #[serde(default = "default_max_backoff")]
    pub max_backoff: HumanDuration,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_backoff: default_base_backoff(),
            max_backoff: default_max_backoff(),
            max_attempts: default_max_attempts(),
            jitter: false,
        }
    }
}

fn default_base_backoff() -> HumanDuration {
    HumanDuration::from_secs(1)
}

fn default_max_backoff() -> HumanDuration {
    HumanDuration::from_secs(60)
}

fn default_max_attempts() -> u32 {
    3
}

/// Run-level settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    /// Log progress every N finished items (0 disables)
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            progress_every: default_progress_every(),
        }
    }
}

fn default_worker_pool_size() -> usize {
    2
}

fn default_progress_every() -> usize {
    100
}

/// Reference HTTP fetcher settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            headers: BTreeMap::new(),
        }
    }
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("fetchledger/{}", env!("CARGO_PKG_VERSION"))
}

/// Calls allowed per sliding window for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProviderLimit {
    pub max_calls_per_window: u32,
    pub window: HumanDuration,
}
