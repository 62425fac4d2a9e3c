use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration for live model calls.
///
/// Two schedules share one attempt budget: rate-limited responses back off up to
/// `rate_limit_max_delay_ms` when the server does not say how long to wait, and
/// transport failures back off up to `transport_max_delay_ms`. Waits the server
/// asks for are honored up to `max_server_delay_ms`.
///
/// ```toml
/// [retry]
/// max_retries = 3
/// base_delay_ms = 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial request).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds, doubled on each attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap for backoff after a 429 that carried no retry hint.
    #[serde(default = "default_rate_limit_max_delay_ms")]
    pub rate_limit_max_delay_ms: u64,

    /// Ceiling for a server-supplied retry delay.
    #[serde(default = "default_max_server_delay_ms")]
    pub max_server_delay_ms: u64,

    /// Cap for backoff after a connection error or timeout.
    #[serde(default = "default_transport_max_delay_ms")]
    pub transport_max_delay_ms: u64,

    /// Add random jitter to computed delays (percentage, 0.0-1.0).
    /// Server-supplied delays are never jittered.
    #[serde(default)]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            rate_limit_max_delay_ms: default_rate_limit_max_delay_ms(),
            max_server_delay_ms: default_max_server_delay_ms(),
            transport_max_delay_ms: default_transport_max_delay_ms(),
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    /// Backoff for a rate-limited attempt (0-indexed) with no server hint.
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        self.delay_for_attempt(attempt, self.rate_limit_max_delay_ms)
    }

    /// A server-supplied delay, clamped to `max_server_delay_ms`.
    pub fn server_delay(&self, requested: Duration) -> Duration {
        requested.min(Duration::from_millis(self.max_server_delay_ms))
    }

    /// Backoff for a transport failure on the given attempt (0-indexed).
    pub fn transport_delay(&self, attempt: u32) -> Duration {
        self.delay_for_attempt(attempt, self.transport_max_delay_ms)
    }

    fn delay_for_attempt(&self, attempt: u32, max_delay_ms: u64) -> Duration {
        let base_delay = (self.base_delay_ms as f64) * 2f64.powi(attempt as i32);
        let capped_delay = base_delay.min(max_delay_ms as f64);

        let jitter_range = capped_delay * self.jitter;
        let jitter = if jitter_range > 0.0 {
            use rand::Rng;
            rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };

        let final_delay = (capped_delay + jitter).max(0.0);
        Duration::from_millis(final_delay as u64)
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_rate_limit_max_delay_ms() -> u64 {
    30_000
}

fn default_max_server_delay_ms() -> u64 {
    120_000
}

fn default_transport_max_delay_ms() -> u64 {
    10_000
}
