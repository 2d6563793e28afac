//! joblens-worker - continuous enrichment worker.
//!
//! Runs the scheduling loop until SIGINT/SIGTERM, then drains in-flight
//! work and sweeps still-owned analyses back to the eligible pool.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use joblens_db::Database;
use joblens_enrich::{CallGate, ChatBackend, Enricher, GateConfig};
use joblens_pipeline::{OwnedAnalyses, Scheduler, SchedulerConfig};
use joblens_search::{EsClient, IndexSync};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/joblens".to_string());

    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    let backend = ChatBackend::from_env()?;
    let gate = CallGate::with_config(Arc::new(backend), GateConfig::from_env());
    let enricher = Arc::new(Enricher::new(gate));

    let engine = Arc::new(EsClient::from_env()?);
    let sync = Arc::new(IndexSync::new(engine.clone(), engine.alias().to_string()));
    sync.ensure_index().await?;

    let scheduler = Scheduler::new(
        db,
        enricher,
        sync,
        OwnedAnalyses::new(),
        SchedulerConfig::from_env(),
    );
    let handle = scheduler.start();

    wait_for_termination().await;
    info!("Termination signal received, shutting down");
    handle.shutdown().await?;
    info!("Worker exited cleanly");
    Ok(())
}

/// Block until SIGINT or SIGTERM.
async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
