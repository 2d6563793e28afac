//! Mock completion backend for deterministic testing.
//!
//! Provides a scripted implementation of [`CompletionBackend`] with failure
//! injection and a call log for assertions.
//!
//! ## Usage
//!
//! ```rust
//! use joblens_enrich::mock::MockCompletionBackend;
//!
//! let backend = MockCompletionBackend::new()
//!     .with_default_response(r#"{"summary": "test"}"#)
//!     .with_failures(1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use joblens_core::{CompletionBackend, Error, Result};

/// One logged call for assertion.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Debug, Default)]
struct MockState {
    /// Responses consumed front-to-back; falls back to `default_response`.
    scripted: VecDeque<String>,
    /// Remaining calls to fail before succeeding.
    failures_remaining: u32,
    call_log: Vec<MockCall>,
}

/// Mock completion backend for testing.
#[derive(Clone, Default)]
pub struct MockCompletionBackend {
    state: Arc<Mutex<MockState>>,
    default_response: String,
}

impl MockCompletionBackend {
    /// Create a new mock backend with an empty default response.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            default_response: "{}".to_string(),
        }
    }

    /// Set the response returned when no scripted response remains.
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Queue a scripted response, consumed in FIFO order.
    pub fn with_scripted_response(self, response: impl Into<String>) -> Self {
        self.state.lock().unwrap().scripted.push_back(response.into());
        self
    }

    /// Fail the next `n` calls with a request error before succeeding.
    pub fn with_failures(self, n: u32) -> Self {
        self.state.lock().unwrap().failures_remaining = n;
        self
    }

    /// Number of calls made so far (including failed ones).
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().call_log.len()
    }

    /// All logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().call_log.clone()
    }
}

#[async_trait]
impl CompletionBackend for MockCompletionBackend {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.call_log.push(MockCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
        });

        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(Error::Request("mock backend failure".to_string()));
        }

        Ok(state
            .scripted
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone()))
    }
}
