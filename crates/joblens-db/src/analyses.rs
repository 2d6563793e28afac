//! Analysis repository: persistence for the per-job analysis state machine.
//!
//! The `status` column is the concurrency-control token for work
//! distribution. Claiming is a single status-conditioned UPDATE, so two
//! schedulers racing on the same job can never both win.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use joblens_core::{
    Analysis, AnalysisRepository, AnalysisStats, AnalysisStatus, EnrichmentOutcome, Error,
    ExperienceLevel, JobLocation, Result, SalaryPeriod,
};

/// PostgreSQL implementation of [`AnalysisRepository`].
pub struct PgAnalysisRepository {
    pool: Pool<Postgres>,
}

impl PgAnalysisRepository {
    /// Create a new PgAnalysisRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Parse analysis columns out of a row that includes them (possibly joined
/// onto a job row). Expects the `a.*` column names from the queries in this
/// crate.
pub(crate) fn parse_analysis_columns(row: &sqlx::postgres::PgRow) -> Result<Analysis> {
    let status: String = row.get("status");
    let period: Option<String> = row.get("salary_period");
    let level: Option<String> = row.get("experience_level");
    let locations: Option<serde_json::Value> = row.get("locations");

    let locations: Option<Vec<JobLocation>> = match locations {
        Some(value) => Some(serde_json::from_value(value)?),
        None => None,
    };

    Ok(Analysis {
        job_id: row.get("analysis_job_id"),
        status: AnalysisStatus::from_str_lossy(&status),
        salary_min: row.get("salary_min"),
        salary_max: row.get("salary_max"),
        salary_fixed: row.get("salary_fixed"),
        salary_currency: row.get("salary_currency"),
        salary_period: period.as_deref().and_then(SalaryPeriod::parse),
        is_salary_estimated: row.get("is_salary_estimated"),
        skill_tags: row.get("skill_tags"),
        experience_level: level.as_deref().and_then(ExperienceLevel::parse),
        summary: row.get("summary"),
        locations,
        updated_at: row.get("updated_at"),
    })
}

const ANALYSIS_COLUMNS: &str = "a.job_id AS analysis_job_id, a.status, a.salary_min, \
     a.salary_max, a.salary_fixed, a.salary_currency, a.salary_period, \
     a.is_salary_estimated, a.skill_tags, a.experience_level, a.summary, \
     a.locations, a.updated_at";

#[async_trait]
impl AnalysisRepository for PgAnalysisRepository {
    async fn create_pending(&self, job_id: Uuid) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO job_analyses (job_id, status, is_salary_estimated, updated_at)
             VALUES ($1, 'pending', TRUE, $2)
             ON CONFLICT (job_id) DO NOTHING",
        )
        .bind(job_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Analysis>> {
        let query = format!("SELECT {ANALYSIS_COLUMNS} FROM job_analyses a WHERE a.job_id = $1");
        let row = sqlx::query(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(parse_analysis_columns).transpose()
    }

    async fn claim(&self, job_id: Uuid) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE job_analyses
             SET status = 'processing', updated_at = $1
             WHERE job_id = $2 AND status IN ('pending', 'failed')",
        )
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete(&self, job_id: Uuid, outcome: &EnrichmentOutcome) -> Result<()> {
        let now = Utc::now();
        let locations = outcome
            .locations
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let result = sqlx::query(
            "UPDATE job_analyses
             SET status = 'completed',
                 salary_min = $1, salary_max = $2, salary_fixed = $3,
                 salary_currency = $4, salary_period = $5,
                 is_salary_estimated = $6, skill_tags = $7,
                 experience_level = $8, summary = $9, locations = $10,
                 updated_at = $11
             WHERE job_id = $12 AND status = 'processing'",
        )
        .bind(outcome.salary_min)
        .bind(outcome.salary_max)
        .bind(outcome.salary_fixed)
        .bind(&outcome.salary_currency)
        .bind(outcome.salary_period.map(|p| p.as_str()))
        .bind(outcome.is_salary_estimated)
        .bind(&outcome.skill_tags)
        .bind(outcome.experience_level.map(|l| l.as_str()))
        .bind(&outcome.summary)
        .bind(locations)
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::Internal(format!(
                "complete on analysis {job_id} that is not processing"
            )));
        }
        Ok(())
    }

    async fn fail(&self, job_id: Uuid) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE job_analyses
             SET status = 'failed', updated_at = $1
             WHERE job_id = $2 AND status = 'processing'",
        )
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail_if_processing(&self, job_ids: &[Uuid]) -> Result<u64> {
        if job_ids.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE job_analyses
             SET status = 'failed', updated_at = $1
             WHERE job_id = ANY($2) AND status = 'processing'",
        )
        .bind(now)
        .bind(job_ids)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn status_counts(&self) -> Result<AnalysisStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) AS total
             FROM job_analyses",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(AnalysisStats {
            pending: row.get::<i64, _>("pending"),
            processing: row.get::<i64, _>("processing"),
            completed: row.get::<i64, _>("completed"),
            failed: row.get::<i64, _>("failed"),
            total: row.get::<i64, _>("total"),
        })
    }
}
