//! Centralized default constants for the joblens system.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates and binaries should reference these constants instead of
//! defining their own magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// SCHEDULER
// =============================================================================

/// Maximum number of concurrently processed jobs.
pub const WORKER_CONCURRENCY: usize = 5;

/// Polling interval in seconds when no eligible jobs are found.
pub const WORKER_POLL_INTERVAL_SECS: u64 = 60;

/// Eligible jobs fetched per scheduling cycle, as a multiple of concurrency.
pub const WORKER_BATCH_FACTOR: usize = 2;

// =============================================================================
// CALL GATE
// =============================================================================

/// Maximum enrichment calls per rolling window.
pub const GATE_CALLS_PER_WINDOW: u32 = 50;

/// Rolling rate-limit window in seconds.
pub const GATE_WINDOW_SECS: u64 = 60;

/// Maximum attempts per enrichment call before giving up.
pub const GATE_MAX_ATTEMPTS: u32 = 5;

/// Total retry budget in seconds across all attempts of one call.
pub const GATE_MAX_ELAPSED_SECS: u64 = 300;

/// Base delay in milliseconds for the first backoff step.
pub const GATE_BASE_DELAY_MS: u64 = 1000;

// =============================================================================
// ENRICHMENT BACKEND
// =============================================================================

/// Default base URL for the OpenAI-compatible chat completions API.
pub const LLM_BASE_URL: &str = "https://api.deepseek.com/v1";

/// Default chat model.
pub const LLM_MODEL: &str = "deepseek-chat";

/// Timeout for a single completion request (seconds).
pub const LLM_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// SEARCH ENGINE
// =============================================================================

/// Default Elasticsearch endpoint.
pub const ES_URL: &str = "http://localhost:9200";

/// Alias the read path addresses; generations hang off this name.
pub const ES_JOB_ALIAS: &str = "joblens_jobs";

/// Timeout for search engine requests (seconds).
pub const ES_TIMEOUT_SECS: u64 = 30;

/// Page size for bounded-memory full rebuilds.
pub const REBUILD_PAGE_SIZE: i64 = 1000;

// =============================================================================
// QUERY PLANNER
// =============================================================================

/// Default results per page.
pub const SEARCH_PER_PAGE: i64 = 10;

/// Maximum results per page.
pub const SEARCH_PER_PAGE_MAX: i64 = 100;

/// Minimum relevance score required under date sort. Tuned against real
/// traffic; configurable rather than a fixed law.
pub const DATE_SORT_MIN_SCORE: f64 = 1.0;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8000;

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_defaults() {
        assert_eq!(WORKER_CONCURRENCY, 5);
        assert_eq!(WORKER_BATCH_FACTOR, 2);
    }

    #[test]
    fn test_gate_defaults() {
        assert_eq!(GATE_CALLS_PER_WINDOW, 50);
        assert_eq!(GATE_WINDOW_SECS, 60);
        assert_eq!(GATE_MAX_ATTEMPTS, 5);
        assert_eq!(GATE_MAX_ELAPSED_SECS, 300);
    }

    #[test]
    fn test_search_defaults() {
        assert_eq!(REBUILD_PAGE_SIZE, 1000);
        assert!(DATE_SORT_MIN_SCORE > 0.0);
    }
}
