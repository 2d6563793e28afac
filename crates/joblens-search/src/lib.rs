//! # joblens-search
//!
//! Search engine integration for joblens.
//!
//! This crate provides:
//! - The Elasticsearch REST implementation of the search engine collaborator
//! - An in-memory engine for deterministic tests
//! - The document builder (job + completed analysis → search document)
//! - The index synchronization engine: steady-state upserts, blue-green
//!   mapping migrations, and bounded-memory full rebuilds
//! - The search query planner with typed result decoding
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use joblens_search::{EsClient, EsConfig, IndexSync, SearchPlanner};
//! use joblens_core::SearchRequest;
//!
//! let engine = Arc::new(EsClient::new(EsConfig::from_env())?);
//! let sync = IndexSync::new(engine.clone(), engine.alias());
//! sync.ensure_index().await?;
//!
//! let planner = SearchPlanner::new(engine);
//! let results = planner.search_jobs(&SearchRequest::new("rust engineer")).await?;
//! ```

pub mod document;
pub mod es;
pub mod mappings;
pub mod memory;
pub mod query;
pub mod sync;

// Re-export core types
pub use joblens_core::*;

pub use document::{build_document, format_posted_date};
pub use es::{EsClient, EsConfig};
pub use mappings::job_mapping;
pub use memory::InMemorySearchEngine;
pub use query::{build_search_query, decode_search_response, SearchPlanner};
pub use sync::IndexSync;
