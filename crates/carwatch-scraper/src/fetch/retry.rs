//! Retry policy for the fetch layer.
//!
//! Every attempt is preceded by a random politeness delay. Responses are
//! classified into a body, a retryable failure (throttling, gateway errors,
//! transport faults), or a fatal status that is not worth repeating.
//! Retryable failures wait `backoff_base * 2^attempt`, capped at
//! `backoff_max`, before the next attempt.

use std::time::Duration;

use rand::Rng;

/// Statuses that signal a transient server-side condition.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub request_timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            jitter_min: Duration::from_millis(500),
            jitter_max: Duration::from_millis(1500),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl FetchPolicy {
    #[must_use]
    pub fn from_settings(settings: &carwatch_core::ScraperSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            jitter_min: settings.jitter_min,
            jitter_max: settings.jitter_max.max(settings.jitter_min),
            backoff_base: settings.backoff_base,
            backoff_max: settings.backoff_max,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    /// Delay after the failed attempt numbered `attempt` (0-based):
    /// `backoff_base * 2^attempt`, never above `backoff_max`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(20);
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_max)
    }

    /// Uniform random delay in `[jitter_min, jitter_max]`.
    #[must_use]
    pub fn jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        let secs = rand::rng()
            .random_range(self.jitter_min.as_secs_f64()..=self.jitter_max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Result of a single request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Body(String),
    Retryable(String),
    Fatal(u16),
}

/// Classifies a non-200 status as retryable or fatal.
#[must_use]
pub fn classify_status(status: u16) -> FetchOutcome {
    if RETRYABLE_STATUSES.contains(&status) {
        FetchOutcome::Retryable(format!("status {status}"))
    } else {
        FetchOutcome::Fatal(status)
    }
}
