//! # joblens-pipeline
//!
//! Enrichment pipeline scheduler for joblens.
//!
//! This crate provides:
//! - The worker pool scheduler: batch polling, bounded concurrency,
//!   claim/complete/fail lifecycle, event broadcasting
//! - The owned-analyses registry used for crash and shutdown recovery
//! - The `joblens-worker` and `joblens-rebuild` binaries
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use joblens_db::Database;
//! use joblens_enrich::{CallGate, ChatBackend, Enricher, GateConfig};
//! use joblens_search::{EsClient, IndexSync};
//! use joblens_pipeline::{OwnedAnalyses, Scheduler, SchedulerConfig};
//!
//! let db = Database::connect("postgres://...").await?;
//! let backend = ChatBackend::from_env()?;
//! let enricher = Arc::new(Enricher::new(CallGate::with_config(
//!     Arc::new(backend),
//!     GateConfig::from_env(),
//! )));
//! let engine = Arc::new(EsClient::from_env()?);
//! let sync = Arc::new(IndexSync::new(engine.clone(), engine.alias()));
//!
//! let scheduler = Scheduler::new(
//!     db,
//!     enricher,
//!     sync,
//!     OwnedAnalyses::new(),
//!     SchedulerConfig::from_env(),
//! );
//! let handle = scheduler.start();
//!
//! // ... later
//! handle.shutdown().await?;
//! ```

pub mod owned;
pub mod scheduler;

// Re-export core types
pub use joblens_core::*;

pub use owned::OwnedAnalyses;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerEvent, SchedulerHandle};
