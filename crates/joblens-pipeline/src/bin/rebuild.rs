//! joblens-rebuild - full reindex into a fresh generation plus alias swap.
//!
//! Pages every stored job, builds documents for completed analyses, and
//! atomically repoints the alias once the new generation is verified.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use joblens_db::Database;
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

    let engine = Arc::new(EsClient::from_env()?);
    let sync = IndexSync::new(engine.clone(), engine.alias().to_string());

    let total = joblens_core::JobRepository::count(&db.jobs).await?;
    info!(total, "Starting full rebuild");

    let (generation, written) = sync.rebuild_from_store(&db.jobs).await?;
    info!(
        index = %generation,
        result_count = written,
        "Rebuild finished; alias now serves the new generation"
    );
    Ok(())
}
