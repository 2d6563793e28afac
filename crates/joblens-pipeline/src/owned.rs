//! Registry of analyses currently claimed by this process.
//!
//! Used only for crash and shutdown cleanup: every id still registered when
//! the scheduler stops is swept back to `failed`. Passed into the scheduler
//! explicitly so tests can instantiate several schedulers independently; it
//! is not a process-wide singleton.
//!
//! Touched only at claim/release points. Critical sections are short and
//! never hold the lock across I/O.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// Mutex-guarded set of claimed analysis ids.
#[derive(Clone, Default)]
pub struct OwnedAnalyses {
    inner: Arc<Mutex<HashSet<Uuid>>>,
}

impl OwnedAnalyses {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a claimed analysis.
    pub fn insert(&self, job_id: Uuid) {
        self.inner.lock().unwrap().insert(job_id);
    }

    /// Release an analysis after completion or failure handling.
    pub fn remove(&self, job_id: Uuid) {
        self.inner.lock().unwrap().remove(&job_id);
    }

    /// Whether an analysis is currently registered.
    pub fn contains(&self, job_id: Uuid) -> bool {
        self.inner.lock().unwrap().contains(&job_id)
    }

    /// Number of currently registered analyses.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Snapshot of all registered ids, for the recovery sweep.
    pub fn snapshot(&self) -> Vec<Uuid> {
        self.inner.lock().unwrap().iter().copied().collect()
    }
}
