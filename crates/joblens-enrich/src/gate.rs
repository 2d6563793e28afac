//! Rate-limited call gate around the enrichment capability.
//!
//! Rate limiting and retry are orthogonal: the limiter throttles *issuance*
//! of every attempt uniformly, while exponential backoff governs spacing
//! *after* a failure. Both apply to every call; neither is configurable per
//! job.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::{Quota, RateLimiter};
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use joblens_core::{defaults, CompletionBackend, Error, Result};

/// Direct (not-keyed) rate limiter over the in-memory state store.
type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Call gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Maximum calls per rolling window.
    pub calls_per_window: u32,
    /// Rolling window length.
    pub window: Duration,
    /// Maximum attempts per call before giving up.
    pub max_attempts: u32,
    /// Total retry budget across all attempts of one call.
    pub max_elapsed: Duration,
    /// Base delay for the first backoff step; doubles each attempt.
    pub base_delay: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            calls_per_window: defaults::GATE_CALLS_PER_WINDOW,
            window: Duration::from_secs(defaults::GATE_WINDOW_SECS),
            max_attempts: defaults::GATE_MAX_ATTEMPTS,
            max_elapsed: Duration::from_secs(defaults::GATE_MAX_ELAPSED_SECS),
            base_delay: Duration::from_millis(defaults::GATE_BASE_DELAY_MS),
        }
    }
}

impl GateConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `GATE_CALLS_PER_WINDOW` | `50` | Calls per rolling window |
    /// | `GATE_WINDOW_SECS` | `60` | Window length |
    /// | `GATE_MAX_ATTEMPTS` | `5` | Attempts before permanent failure |
    /// | `GATE_MAX_ELAPSED_SECS` | `300` | Total retry budget per call |
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_u64("GATE_CALLS_PER_WINDOW") {
            config.calls_per_window = n.max(1) as u32;
        }
        if let Some(n) = env_u64("GATE_WINDOW_SECS") {
            config.window = Duration::from_secs(n.max(1));
        }
        if let Some(n) = env_u64("GATE_MAX_ATTEMPTS") {
            config.max_attempts = n.max(1) as u32;
        }
        if let Some(n) = env_u64("GATE_MAX_ELAPSED_SECS") {
            config.max_elapsed = Duration::from_secs(n);
        }
        config
    }

    /// Set calls allowed per rolling window.
    pub fn with_calls_per_window(mut self, calls: u32) -> Self {
        self.calls_per_window = calls.max(1);
        self
    }

    /// Set the rolling window length.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the maximum attempts per call.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the total retry budget per call.
    pub fn with_max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = elapsed;
        self
    }

    /// Set the base backoff delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Rate-limited, retrying wrapper around a [`CompletionBackend`].
pub struct CallGate {
    backend: Arc<dyn CompletionBackend>,
    limiter: DirectRateLimiter,
    config: GateConfig,
}

impl CallGate {
    /// Create a gate with default configuration.
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_config(backend, GateConfig::default())
    }

    /// Create a gate with custom configuration.
    pub fn with_config(backend: Arc<dyn CompletionBackend>, config: GateConfig) -> Self {
        let calls = NonZeroU32::new(config.calls_per_window.max(1)).expect("calls must be nonzero");
        // Replenish one permit per window/calls so a full window admits
        // exactly `calls` issuances, with bursts capped at the same number.
        let replenish = config.window / config.calls_per_window.max(1);
        let quota = Quota::with_period(replenish.max(Duration::from_nanos(1)))
            .expect("replenish period must be non-zero")
            .allow_burst(calls);

        Self {
            backend,
            limiter: RateLimiter::direct(quota),
            config,
        }
    }

    /// Get the gate configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Issue one completion through the gate.
    ///
    /// Every attempt (first issue and each retry) waits for a rate-limit
    /// permit. On failure, retries with exponential backoff and jitter until
    /// `max_attempts` or the `max_elapsed` budget is hit, whichever first;
    /// then fails permanently with [`Error::Enrichment`].
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let start = Instant::now();
        let mut attempt: u32 = 0;
        let mut last_error;

        loop {
            self.limiter.until_ready().await;
            attempt += 1;

            match self.backend.complete(system_prompt, user_prompt).await {
                Ok(response) => {
                    debug!(
                        subsystem = "enrich",
                        component = "gate",
                        attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Completion call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        subsystem = "enrich",
                        component = "gate",
                        attempt,
                        error = %e,
                        "Completion call failed"
                    );
                    last_error = e;
                }
            }

            if attempt >= self.config.max_attempts {
                return Err(Error::Enrichment(format!(
                    "call failed after {attempt} attempts: {last_error}"
                )));
            }

            let delay = self.backoff_delay(attempt);
            if start.elapsed() + delay >= self.config.max_elapsed {
                return Err(Error::Enrichment(format!(
                    "call retry budget of {}s exhausted after {attempt} attempts: {last_error}",
                    self.config.max_elapsed.as_secs()
                )));
            }
            sleep(delay).await;
        }
    }

    /// Exponential backoff with jitter: `base * 2^(attempt-1)` plus up to
    /// half of itself at random, so concurrent retries decorrelate.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .config
            .base_delay
            .saturating_mul(1u32 << (attempt - 1).min(16));
        let jitter_ms = exp.as_millis() as u64 / 2;
        if jitter_ms == 0 {
            return exp;
        }
        exp + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCompletionBackend;

    fn fast_config() -> GateConfig {
        GateConfig::default()
            .with_calls_per_window(10_000)
            .with_window(Duration::from_secs(1))
            .with_base_delay(Duration::from_millis(1))
            .with_max_elapsed(Duration::from_secs(10))
    }

    #[test]
    fn test_gate_config_default() {
        let config = GateConfig::default();
        assert_eq!(config.calls_per_window, 50);
        assert_eq!(config.window, Duration::from_secs(60));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.max_elapsed, Duration::from_secs(300));
    }

    #[test]
    fn test_gate_config_builder() {
        let config = GateConfig::default()
            .with_calls_per_window(5)
            .with_max_attempts(2)
            .with_window(Duration::from_secs(10));
        assert_eq!(config.calls_per_window, 5);
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.window, Duration::from_secs(10));
    }

    #[test]
    fn test_gate_config_zero_values_clamped() {
        let config = GateConfig::default()
            .with_calls_per_window(0)
            .with_max_attempts(0);
        assert_eq!(config.calls_per_window, 1);
        assert_eq!(config.max_attempts, 1);
    }

    #[tokio::test]
    async fn test_gate_passes_through_success() {
        let backend = MockCompletionBackend::new().with_default_response("{\"ok\":true}");
        let gate = CallGate::with_config(Arc::new(backend.clone()), fast_config());

        let out = gate.complete("sys", "user").await.unwrap();
        assert_eq!(out, "{\"ok\":true}");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_gate_retries_transient_failures() {
        let backend = MockCompletionBackend::new()
            .with_default_response("{\"ok\":true}")
            .with_failures(2);
        let gate = CallGate::with_config(Arc::new(backend.clone()), fast_config());

        let out = gate.complete("sys", "user").await.unwrap();
        assert_eq!(out, "{\"ok\":true}");
        assert_eq!(backend.call_count(), 3, "two failures then one success");
    }

    #[tokio::test]
    async fn test_gate_fails_after_max_attempts() {
        let backend = MockCompletionBackend::new()
            .with_default_response("{\"ok\":true}")
            .with_failures(100);
        let config = fast_config().with_max_attempts(3);
        let gate = CallGate::with_config(Arc::new(backend.clone()), config);

        let err = gate.complete("sys", "user").await.unwrap_err();
        assert!(matches!(err, Error::Enrichment(_)));
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_gate_respects_elapsed_budget() {
        let backend = MockCompletionBackend::new()
            .with_default_response("{\"ok\":true}")
            .with_failures(100);
        // Budget so small the first backoff would already exceed it.
        let config = fast_config()
            .with_max_attempts(10)
            .with_base_delay(Duration::from_millis(50))
            .with_max_elapsed(Duration::from_millis(10));
        let gate = CallGate::with_config(Arc::new(backend.clone()), config);

        let err = gate.complete("sys", "user").await.unwrap_err();
        assert!(matches!(err, Error::Enrichment(_)));
        assert_eq!(backend.call_count(), 1, "budget exhausted before retry");
    }

    #[tokio::test]
    async fn test_gate_throttles_issuance() {
        // 2 permits per 200ms window: the third call must wait.
        let backend = MockCompletionBackend::new().with_default_response("{}");
        let config = GateConfig::default()
            .with_calls_per_window(2)
            .with_window(Duration::from_millis(200))
            .with_base_delay(Duration::from_millis(1));
        let gate = CallGate::with_config(Arc::new(backend.clone()), config);

        let start = Instant::now();
        for _ in 0..3 {
            gate.complete("sys", "user").await.unwrap();
        }
        // Third issuance had to wait for a replenished permit (~100ms).
        assert!(start.elapsed() >= Duration::from_millis(80));
        assert_eq!(backend.call_count(), 3);
    }

    #[test]
    fn test_backoff_delay_grows_exponentially() {
        let backend = MockCompletionBackend::new();
        let config = GateConfig::default().with_base_delay(Duration::from_millis(100));
        let gate = CallGate::with_config(Arc::new(backend), config);

        let d1 = gate.backoff_delay(1);
        let d3 = gate.backoff_delay(3);
        assert!(d1 >= Duration::from_millis(100));
        assert!(d1 <= Duration::from_millis(150));
        assert!(d3 >= Duration::from_millis(400));
        assert!(d3 <= Duration::from_millis(600));
    }
}
