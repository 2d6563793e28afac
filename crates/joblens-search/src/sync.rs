//! Index synchronization engine.
//!
//! Owns the alias/generation lifecycle: steady-state upserts after
//! enrichment, zero-downtime mapping migrations via a blue-green generation
//! swap, and bounded-memory full rebuilds from the relational store.
//!
//! The alias pointer is the one piece of global shared mutable state here;
//! it only ever moves through a single atomic multi-action update, so
//! readers never observe zero or two generations.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{error, info, instrument, warn};

use joblens_core::{
    defaults, AnalysisStatus, Error, JobRepository, Result, SearchDocument, SearchEngine,
};

use crate::document::build_document;
use crate::mappings::job_mapping;

/// Index synchronization engine over a [`SearchEngine`].
pub struct IndexSync {
    engine: Arc<dyn SearchEngine>,
    alias: String,
    mapping: JsonValue,
    page_size: i64,
}

impl IndexSync {
    /// Create a sync engine for the given alias with the current mapping.
    pub fn new(engine: Arc<dyn SearchEngine>, alias: impl Into<String>) -> Self {
        Self {
            engine,
            alias: alias.into(),
            mapping: job_mapping(),
            page_size: defaults::REBUILD_PAGE_SIZE,
        }
    }

    /// Override the mapping used for new generations.
    pub fn with_mapping(mut self, mapping: JsonValue) -> Self {
        self.mapping = mapping;
        self
    }

    /// Override the rebuild page size.
    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The alias readers address.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Bootstrap the first generation and alias when absent.
    pub async fn ensure_index(&self) -> Result<()> {
        if self.engine.index_exists(&self.alias).await? {
            return Ok(());
        }
        let generation = self.next_generation_name().await?;
        self.engine.create_index(&generation, &self.mapping).await?;
        self.engine.put_alias(&generation, &self.alias).await?;
        info!(
            subsystem = "search",
            component = "sync",
            index = %generation,
            "Bootstrapped index generation behind alias {}",
            self.alias
        );
        Ok(())
    }

    /// Publish one document: update in place when it already exists in the
    /// active generation, insert otherwise.
    #[instrument(skip(self, document), fields(job_id = %document.id))]
    pub async fn upsert(&self, document: &SearchDocument) -> Result<()> {
        let value = serde_json::to_value(document)?;
        if self.engine.exists(document.id).await? {
            self.engine.update_document(document.id, &value).await?;
            info!(
                subsystem = "search",
                component = "sync",
                op = "update",
                "Updated job document"
            );
        } else {
            self.engine.index_document(document.id, &value, None).await?;
            info!(
                subsystem = "search",
                component = "sync",
                op = "index",
                "Indexed new job document"
            );
        }
        Ok(())
    }

    /// Migrate to a new mapping: build a fresh generation, copy every
    /// document from the generation behind the alias, verify the copy, then
    /// atomically repoint the alias and delete the old generation.
    ///
    /// All-or-nothing from the reader's perspective: any failure before the
    /// alias swap deletes the partial generation and leaves the old one
    /// untouched.
    pub async fn migrate(&self, new_mapping: JsonValue) -> Result<String> {
        let old = self
            .engine
            .get_alias_targets(&self.alias)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::IndexMigration(format!("alias {} has no generation behind it", self.alias))
            })?;

        let new = self.next_generation_name().await?;
        info!(
            subsystem = "search",
            component = "sync",
            op = "migrate",
            index = %new,
            "Migrating from generation {old}"
        );

        self.engine
            .create_index(&new, &new_mapping)
            .await
            .map_err(|e| Error::IndexMigration(format!("creating {new}: {e}")))?;

        if let Err(e) = self.copy_and_verify(&old, &new).await {
            self.cleanup_partial(&new).await;
            return Err(e);
        }

        if let Err(e) = self
            .engine
            .update_alias_atomic((&old, &self.alias), (&new, &self.alias))
            .await
        {
            self.cleanup_partial(&new).await;
            return Err(Error::IndexMigration(format!("alias swap to {new}: {e}")));
        }

        // Only after the swap succeeds is the old generation disposable.
        self.engine.delete_index(&old).await?;
        info!(
            subsystem = "search",
            component = "sync",
            op = "migrate",
            index = %new,
            "Migration complete, old generation {old} deleted"
        );
        Ok(new)
    }

    /// Full rebuild from the relational store into a fresh generation,
    /// followed by the same verified alias swap as [`migrate`](Self::migrate).
    ///
    /// Jobs are paged by id so memory stays bounded regardless of corpus
    /// size; only jobs with a completed analysis are indexed. Returns the new
    /// generation name and the number of documents written.
    pub async fn rebuild_from_store(&self, jobs: &dyn JobRepository) -> Result<(String, u64)> {
        let new = self.next_generation_name().await?;
        self.engine
            .create_index(&new, &self.mapping)
            .await
            .map_err(|e| Error::IndexMigration(format!("creating {new}: {e}")))?;

        let written = match self.import_pages(jobs, &new).await {
            Ok(written) => written,
            Err(e) => {
                self.cleanup_partial(&new).await;
                return Err(Error::IndexMigration(format!("rebuild into {new}: {e}")));
            }
        };

        if let Err(e) = self.engine.refresh(&new).await {
            self.cleanup_partial(&new).await;
            return Err(Error::IndexMigration(format!("refreshing {new}: {e}")));
        }

        let old = self
            .engine
            .get_alias_targets(&self.alias)
            .await?
            .into_iter()
            .next();

        let swap = match &old {
            Some(old) => {
                self.engine
                    .update_alias_atomic((old, &self.alias), (&new, &self.alias))
                    .await
            }
            None => self.engine.put_alias(&new, &self.alias).await,
        };
        if let Err(e) = swap {
            self.cleanup_partial(&new).await;
            return Err(Error::IndexMigration(format!("alias swap to {new}: {e}")));
        }

        if let Some(old) = old {
            self.engine.delete_index(&old).await?;
        }

        info!(
            subsystem = "search",
            component = "sync",
            op = "rebuild",
            index = %new,
            result_count = written,
            "Rebuild complete"
        );
        Ok((new, written))
    }

    async fn import_pages(&self, jobs: &dyn JobRepository, target: &str) -> Result<u64> {
        let mut offset = 0i64;
        let mut written = 0u64;
        loop {
            let page = jobs.fetch_page(offset, self.page_size).await?;
            let page_len = page.len() as i64;

            for (job, analysis) in page {
                let analysis = match analysis {
                    Some(analysis) if analysis.status == AnalysisStatus::Completed => analysis,
                    _ => continue,
                };
                let document = build_document(&job, &analysis);
                let value = serde_json::to_value(&document)?;
                self.engine
                    .index_document(document.id, &value, Some(target))
                    .await?;
                written += 1;
            }

            if page_len < self.page_size {
                break;
            }
            offset += self.page_size;
        }
        Ok(written)
    }

    async fn copy_and_verify(&self, old: &str, new: &str) -> Result<()> {
        self.engine
            .reindex(old, new)
            .await
            .map_err(|e| Error::IndexMigration(format!("reindex {old} -> {new}: {e}")))?;
        self.engine
            .refresh(new)
            .await
            .map_err(|e| Error::IndexMigration(format!("refreshing {new}: {e}")))?;

        let expected = self.engine.count(old).await?;
        let actual = self.engine.count(new).await?;
        if expected != actual {
            return Err(Error::IndexMigration(format!(
                "generation {new} has {actual} documents, expected {expected}"
            )));
        }
        Ok(())
    }

    /// Delete a partially built generation after a failed migration. Cleanup
    /// failures are logged, not surfaced: the original error matters more.
    async fn cleanup_partial(&self, name: &str) {
        warn!(
            subsystem = "search",
            component = "sync",
            index = name,
            "Cleaning up partially built generation"
        );
        if let Err(e) = self.engine.delete_index(name).await {
            error!(
                subsystem = "search",
                component = "sync",
                index = name,
                error = %e,
                "Failed to delete partial generation"
            );
        }
    }

    /// Timestamped generation name, de-duplicated when two operations land
    /// in the same second.
    async fn next_generation_name(&self) -> Result<String> {
        let base = format!("{}_{}", self.alias, Utc::now().format("%Y%m%d_%H%M%S"));
        let mut name = base.clone();
        let mut counter = 1;
        while self.engine.index_exists(&name).await? {
            name = format!("{base}_{counter}");
            counter += 1;
        }
        Ok(name)
    }
}
