//! Per-provider sliding-window rate limiting
//!
//! Each provider key keeps a log of the instants at which calls were
//! granted. A call is granted only while fewer than `max_calls` grants lie
//! inside the trailing window; otherwise the caller sleeps until the oldest
//! grant ages out and checks again. The check and the record happen under
//! one lock, so concurrent callers can never overshoot the ceiling.
//!
//! Time comes from `tokio::time`, which lets tests drive the limiter with
//! a paused clock.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{trace, warn};

/// Call ceiling for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_calls: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self { max_calls, window }
    }
}

#[derive(Debug, Default)]
struct ProviderWindow {
    grants: VecDeque<Instant>,
    cooldown_until: Option<Instant>,
}

pub struct RateLimiter {
    limits: HashMap<String, RateLimit>,
    default_limit: Option<RateLimit>,
    windows: Mutex<HashMap<String, ProviderWindow>>,
}

impl RateLimiter {
    /// A limiter with no ceilings configured; every provider is unthrottled
    pub fn new() -> Self {
        Self {
            limits: HashMap::new(),
            default_limit: None,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_limit(mut self, provider: impl Into<String>, limit: RateLimit) -> Self {
        self.limits.insert(provider.into(), limit);
        self
    }

    /// Ceiling for providers without their own entry
    pub fn with_default_limit(mut self, limit: RateLimit) -> Self {
        self.default_limit = Some(limit);
        self
    }

    pub fn limit_for(&self, provider: &str) -> Option<RateLimit> {
        self.limits.get(provider).copied().or(self.default_limit)
    }

    /// Wait until a call to `provider` fits under its ceiling, then record it
    pub async fn acquire(&self, provider: &str) {
        loop {
            match self.try_acquire_at(provider, Instant::now()) {
                Ok(()) => return,
                Err(wait_until) => {
                    trace!(
                        provider,
                        wait_ms = wait_until.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "Rate limit reached, waiting for a slot"
                    );
                    tokio::time::sleep_until(wait_until).await;
                }
            }
        }
    }

    /// Grant a call now if possible, otherwise report when to try again
    pub fn try_acquire(&self, provider: &str) -> Result<(), Instant> {
        self.try_acquire_at(provider, Instant::now())
    }

    /// Hold back every call to `provider` for `cooldown` (the provider
    /// answered 429). Overlapping cooldowns keep the later end.
    pub fn penalize(&self, provider: &str, cooldown: Duration) {
        let until = Instant::now() + cooldown;
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(provider.to_string()).or_default();
        window.cooldown_until = Some(match window.cooldown_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
        warn!(
            provider,
            cooldown_ms = cooldown.as_millis() as u64,
            "Provider signalled rate limiting, cooling down"
        );
    }

    /// Number of grants still inside the provider's window
    pub fn in_window(&self, provider: &str) -> usize {
        let Some(limit) = self.limit_for(provider) else {
            return 0;
        };
        let now = Instant::now();
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.get(provider).map_or(0, |w| {
            w.grants
                .iter()
                .filter(|&&at| now.duration_since(at) < limit.window)
                .count()
        })
    }

    fn try_acquire_at(&self, provider: &str, now: Instant) -> Result<(), Instant> {
        let limit = self.limit_for(provider);
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if !windows.contains_key(provider) {
            if limit.is_none() {
                return Ok(());
            }
            windows.insert(provider.to_string(), ProviderWindow::default());
        }
        let Some(window) = windows.get_mut(provider) else {
            return Ok(());
        };

        if let Some(until) = window.cooldown_until {
            if now < until {
                return Err(until);
            }
            window.cooldown_until = None;
        }

        let Some(limit) = limit else {
            return Ok(());
        };

        while let Some(&oldest) = window.grants.front() {
            if now.duration_since(oldest) >= limit.window {
                window.grants.pop_front();
            } else {
                break;
            }
        }

        if window.grants.len() < limit.max_calls.max(1) as usize {
            window.grants.push_back(now);
            Ok(())
        } else {
            // full window: the front grant is the next to age out
            let oldest = window.grants.front().copied().unwrap_or(now);
            Err(oldest + limit.window)
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
