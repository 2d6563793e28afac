//! Integration tests for the index synchronization engine over the
//! in-memory search engine.
//!
//! This test suite validates:
//! - Sync-001: upsert inserts new documents and updates existing ones in place
//! - Sync-002: migration preserves the document count and deletes the old generation
//! - Sync-003: a failed migration cleans up the partial generation and leaves
//!   the old one serving the alias
//! - Sync-004: rebuild pages the store and only indexes completed analyses

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use joblens_core::{
    Analysis, AnalysisStatus, CompanyBrief, Error, JobRecord, JobRepository, Result,
    SearchEngine,
};
use joblens_search::{build_document, job_mapping, IndexSync, InMemorySearchEngine};
use serde_json::json;
use uuid::Uuid;

fn sample_job(title: &str) -> JobRecord {
    JobRecord {
        id: Uuid::new_v4(),
        title: title.to_string(),
        url: format!("https://example.com/jobs/{title}"),
        full_description: format!("{title} long description"),
        company: CompanyBrief {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            icon_url: None,
        },
        location: Some("Austin, TX".to_string()),
        employment_type: Some("FULL_TIME".to_string()),
        is_remote: false,
        posted_date: Some("2026-06-01 12:00:00".to_string()),
        expired: false,
        created_at: Utc::now(),
    }
}

fn completed_analysis(job_id: Uuid, tags: &str) -> Analysis {
    let mut analysis = Analysis::pending(job_id);
    analysis.status = AnalysisStatus::Completed;
    analysis.skill_tags = Some(tags.to_string());
    analysis.summary = Some("Does things.".to_string());
    analysis
}

async fn engine_with_bootstrap() -> (Arc<InMemorySearchEngine>, IndexSync) {
    let engine = Arc::new(InMemorySearchEngine::new("jobs_test"));
    let sync = IndexSync::new(engine.clone(), "jobs_test");
    sync.ensure_index().await.unwrap();
    (engine, sync)
}

#[tokio::test]
async fn test_ensure_index_bootstraps_generation_and_alias() {
    let (engine, _sync) = engine_with_bootstrap().await;
    let targets = engine.get_alias_targets("jobs_test").await.unwrap();
    assert_eq!(targets.len(), 1);
    assert!(targets[0].starts_with("jobs_test_"));
}

#[tokio::test]
async fn test_ensure_index_is_idempotent() {
    let (engine, sync) = engine_with_bootstrap().await;
    sync.ensure_index().await.unwrap();
    assert_eq!(engine.index_names().len(), 1);
}

#[tokio::test]
async fn test_upsert_inserts_then_updates() {
    let (engine, sync) = engine_with_bootstrap().await;

    let job = sample_job("Platform Engineer");
    let mut doc = build_document(&job, &completed_analysis(job.id, "Go"));
    sync.upsert(&doc).await.unwrap();
    assert!(engine.exists(job.id).await.unwrap());
    assert_eq!(engine.count("jobs_test").await.unwrap(), 1);

    doc.title = "Staff Platform Engineer".to_string();
    sync.upsert(&doc).await.unwrap();
    assert_eq!(engine.count("jobs_test").await.unwrap(), 1, "updated in place");

    let response = engine
        .search(&json!({ "query": { "term": { "_id": job.id.to_string() } } }))
        .await
        .unwrap();
    assert_eq!(
        response["hits"]["hits"][0]["_source"]["title"],
        "Staff Platform Engineer"
    );
}

#[tokio::test]
async fn test_migration_round_trip_preserves_documents() {
    let (engine, sync) = engine_with_bootstrap().await;

    for i in 0..5 {
        let job = sample_job(&format!("Engineer {i}"));
        let doc = build_document(&job, &completed_analysis(job.id, "Go"));
        sync.upsert(&doc).await.unwrap();
    }

    let old = engine.get_alias_targets("jobs_test").await.unwrap()[0].clone();
    let new = sync.migrate(job_mapping()).await.unwrap();

    assert_ne!(old, new);
    assert_eq!(
        engine.get_alias_targets("jobs_test").await.unwrap(),
        vec![new.clone()]
    );
    assert!(
        !engine.index_exists(&old).await.unwrap(),
        "pre-migration generation must be gone"
    );

    // Searching through the alias still sees every document.
    let response = engine
        .search(&json!({ "query": { "match_all": {} }, "size": 100 }))
        .await
        .unwrap();
    assert_eq!(response["hits"]["total"]["value"], 5);
}

#[tokio::test]
async fn test_failed_migration_cleans_up_and_keeps_old_generation() {
    let (engine, sync) = engine_with_bootstrap().await;

    let job = sample_job("Engineer");
    let doc = build_document(&job, &completed_analysis(job.id, "Go"));
    sync.upsert(&doc).await.unwrap();

    let old = engine.get_alias_targets("jobs_test").await.unwrap()[0].clone();
    engine.fail_next_reindex();

    let err = sync.migrate(job_mapping()).await.unwrap_err();
    assert!(matches!(err, Error::IndexMigration(_)));

    // Old generation untouched, still behind the alias; no partial leftovers.
    assert_eq!(
        engine.get_alias_targets("jobs_test").await.unwrap(),
        vec![old.clone()]
    );
    assert_eq!(engine.index_names(), vec![old]);
    assert_eq!(engine.count("jobs_test").await.unwrap(), 1);
}

// =============================================================================
// REBUILD FROM STORE
// =============================================================================

/// Fixed-content job repository standing in for the relational store.
struct FixtureJobs {
    pairs: Vec<(JobRecord, Option<Analysis>)>,
}

#[async_trait]
impl JobRepository for FixtureJobs {
    async fn fetch_eligible(&self, _limit: i64) -> Result<Vec<JobRecord>> {
        Ok(Vec::new())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        Ok(self
            .pairs
            .iter()
            .map(|(job, _)| job)
            .find(|job| job.id == job_id)
            .cloned())
    }

    async fn fetch_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<(JobRecord, Option<Analysis>)>> {
        Ok(self
            .pairs
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.pairs.len() as i64)
    }
}

#[tokio::test]
async fn test_rebuild_pages_store_and_skips_incomplete() {
    let engine = Arc::new(InMemorySearchEngine::new("jobs_test"));
    // Page size 2 against 5 jobs forces three pages.
    let sync = IndexSync::new(engine.clone(), "jobs_test").with_page_size(2);

    let mut pairs = Vec::new();
    for i in 0..5 {
        let job = sample_job(&format!("Engineer {i}"));
        let analysis = if i % 2 == 0 {
            Some(completed_analysis(job.id, "Go"))
        } else {
            // Pending analyses must not be indexed.
            Some(Analysis::pending(job.id))
        };
        pairs.push((job, analysis));
    }
    let store = FixtureJobs { pairs };

    let (generation, written) = sync.rebuild_from_store(&store).await.unwrap();
    assert_eq!(written, 3);
    assert_eq!(engine.count(&generation).await.unwrap(), 3);
    assert_eq!(
        engine.get_alias_targets("jobs_test").await.unwrap(),
        vec![generation]
    );
}

#[tokio::test]
async fn test_rebuild_swaps_away_from_previous_generation() {
    let (engine, sync) = engine_with_bootstrap().await;
    let sync = sync.with_page_size(10);

    let stale = sample_job("Stale Engineer");
    sync.upsert(&build_document(&stale, &completed_analysis(stale.id, "Go")))
        .await
        .unwrap();
    let old = engine.get_alias_targets("jobs_test").await.unwrap()[0].clone();

    let fresh = sample_job("Fresh Engineer");
    let store = FixtureJobs {
        pairs: vec![(fresh.clone(), Some(completed_analysis(fresh.id, "Rust")))],
    };

    let (generation, written) = sync.rebuild_from_store(&store).await.unwrap();
    assert_eq!(written, 1);
    assert!(!engine.index_exists(&old).await.unwrap());
    assert_eq!(
        engine.get_alias_targets("jobs_test").await.unwrap(),
        vec![generation]
    );

    let response = engine
        .search(&json!({ "query": { "match_all": {} } }))
        .await
        .unwrap();
    assert_eq!(response["hits"]["total"]["value"], 1);
    assert_eq!(
        response["hits"]["hits"][0]["_source"]["title"],
        "Fresh Engineer"
    );
}
