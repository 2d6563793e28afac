//! # joblens-enrich
//!
//! LLM enrichment pipeline for joblens.
//!
//! This crate provides:
//! - An OpenAI-compatible chat completion backend
//! - The rate-limited call gate with exponential-backoff retries
//! - The enrichment worker: prompt construction plus strict, vocabulary-
//!   enforcing response parsing
//! - A mock backend for deterministic tests
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use joblens_enrich::{CallGate, ChatBackend, Enricher, GateConfig};
//!
//! let backend = ChatBackend::from_env()?;
//! let gate = CallGate::with_config(Arc::new(backend), GateConfig::from_env());
//! let enricher = Enricher::new(gate);
//!
//! let outcome = enricher.enrich(&job).await?;
//! ```

pub mod backend;
pub mod extractor;
pub mod gate;
pub mod mock;

// Re-export core types
pub use joblens_core::*;

pub use backend::{ChatBackend, ChatBackendConfig};
pub use extractor::{build_analysis_prompt, normalize_location, parse_outcome, Enricher};
pub use gate::{CallGate, GateConfig};
pub use mock::MockCompletionBackend;
