//! # joblens-db
//!
//! PostgreSQL storage layer for joblens.
//!
//! This crate provides:
//! - Connection pool management
//! - The job repository (read access to scraped postings)
//! - The analysis repository (state-machine persistence with atomic,
//!   status-conditioned claims)
//!
//! The relational store exclusively owns job and analysis durability; the
//! schema itself is managed externally.
//!
//! ## Example
//!
//! ```rust,ignore
//! use joblens_db::Database;
//! use joblens_core::{AnalysisRepository, JobRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/joblens").await?;
//!
//!     let eligible = db.jobs.fetch_eligible(10).await?;
//!     for job in &eligible {
//!         if db.analyses.claim(job.id).await? {
//!             println!("claimed {}", job.id);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod analyses;
pub mod jobs;
pub mod pool;

// Re-export core types
pub use joblens_core::*;

pub use analyses::PgAnalysisRepository;
pub use jobs::PgJobRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

/// Main database facade providing access to all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Job repository for reading stored postings.
    pub jobs: PgJobRepository,
    /// Analysis repository for state-machine persistence.
    pub analyses: PgAnalysisRepository,
}

impl Database {
    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build a database facade over an existing pool.
    pub fn from_pool(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            jobs: PgJobRepository::new(pool.clone()),
            analyses: PgAnalysisRepository::new(pool.clone()),
            pool,
        }
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::from_pool(self.pool.clone())
    }
}
