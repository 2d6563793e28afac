//! Core traits for joblens collaborators.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability. The relational
//! store owns job/analysis durability, the search engine owns document
//! durability; this process keeps no persistent state of its own.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// STORAGE COLLABORATOR
// =============================================================================

/// Read access to stored job postings.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Jobs whose analysis status is `pending` or `failed`, oldest first,
    /// bounded by `limit`.
    async fn fetch_eligible(&self, limit: i64) -> Result<Vec<JobRecord>>;

    /// Fetch one job with its company. `Ok(None)` when unknown.
    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>>;

    /// Page of (job, analysis) pairs ordered by id, for bounded-memory
    /// rebuilds.
    async fn fetch_page(&self, offset: i64, limit: i64)
        -> Result<Vec<(JobRecord, Option<Analysis>)>>;

    /// Total stored jobs.
    async fn count(&self) -> Result<i64>;
}

/// Persistence for the per-job analysis state machine.
///
/// `claim` is the concurrency-control token for work distribution: a single
/// status-conditioned write, never a read-then-write.
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// Create the pending analysis row accompanying a newly stored job.
    /// Idempotent: an existing row is left untouched.
    async fn create_pending(&self, job_id: Uuid) -> Result<()>;

    /// Fetch the analysis for a job, if any.
    async fn get(&self, job_id: Uuid) -> Result<Option<Analysis>>;

    /// Atomically transition `pending|failed → processing`. Returns whether
    /// this caller won the claim; exactly one concurrent claimant does.
    async fn claim(&self, job_id: Uuid) -> Result<bool>;

    /// Transition `processing → completed` and persist the enrichment result.
    async fn complete(&self, job_id: Uuid, outcome: &EnrichmentOutcome) -> Result<()>;

    /// Transition `processing → failed`; the job re-enters the eligible pool.
    async fn fail(&self, job_id: Uuid) -> Result<()>;

    /// Force every listed analysis still `processing` to `failed`. Crash and
    /// shutdown recovery over the in-process owned set; returns the number of
    /// rows swept.
    async fn fail_if_processing(&self, job_ids: &[Uuid]) -> Result<u64>;

    /// Per-status counts for observability.
    async fn status_counts(&self) -> Result<AnalysisStats>;
}

// =============================================================================
// ENRICHMENT CAPABILITY COLLABORATOR
// =============================================================================

/// One opaque, stateless call to the external enrichment capability.
///
/// Implementations return the model's raw response text; parsing and
/// vocabulary enforcement live with the caller. No state is assumed between
/// calls.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one chat completion and return the response content.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

// =============================================================================
// SEARCH ENGINE COLLABORATOR
// =============================================================================

/// Alias-and-generation index store with search.
///
/// Readers only ever address the alias; generation names are an internal
/// concern of the synchronization engine.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Create an index with the given mapping. Existing indices are left
    /// untouched.
    async fn create_index(&self, name: &str, mapping: &JsonValue) -> Result<()>;

    /// Whether an index (or alias) with this name exists.
    async fn index_exists(&self, name: &str) -> Result<bool>;

    /// Whether a document with this id exists behind the alias.
    async fn exists(&self, id: Uuid) -> Result<bool>;

    /// Index (create or overwrite) a document. `target` of `None` writes to
    /// the generation currently behind the alias.
    async fn index_document(
        &self,
        id: Uuid,
        document: &JsonValue,
        target: Option<&str>,
    ) -> Result<()>;

    /// Partial-update a document behind the alias.
    async fn update_document(&self, id: Uuid, document: &JsonValue) -> Result<()>;

    /// Delete a document behind the alias.
    async fn delete_document(&self, id: Uuid) -> Result<()>;

    /// Delete an index outright. Missing indices are not an error.
    async fn delete_index(&self, name: &str) -> Result<()>;

    /// Execute a query against the alias and return the engine's raw
    /// response body.
    async fn search(&self, query: &JsonValue) -> Result<JsonValue>;

    /// Document count in a specific index.
    async fn count(&self, index: &str) -> Result<i64>;

    /// Copy all documents from `source` into `dest`.
    async fn reindex(&self, source: &str, dest: &str) -> Result<()>;

    /// Bind `alias` to `index` (non-atomic; bootstrap only).
    async fn put_alias(&self, index: &str, alias: &str) -> Result<()>;

    /// Atomically repoint an alias: remove one binding and add another in a
    /// single action, so readers never observe zero or two generations.
    async fn update_alias_atomic(
        &self,
        remove: (&str, &str),
        add: (&str, &str),
    ) -> Result<()>;

    /// The index names an alias currently points at.
    async fn get_alias_targets(&self, alias: &str) -> Result<Vec<String>>;

    /// Make all prior writes to an index visible to search.
    async fn refresh(&self, index: &str) -> Result<()>;
}
