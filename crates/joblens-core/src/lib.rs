//! # joblens-core
//!
//! Core types, traits, and abstractions for the joblens job aggregation
//! platform.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other joblens crates depend on: the stored job/analysis model, the
//! search document projection, the collaborator traits for storage, the
//! enrichment capability, and the search engine.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
