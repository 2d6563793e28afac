//! Job repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use joblens_core::{Analysis, CompanyBrief, Error, JobRecord, JobRepository, Result};

use crate::analyses::parse_analysis_columns;

/// Columns selected for every job row, with the company joined in.
const JOB_COLUMNS: &str = "j.id, j.title, j.url, j.full_description, j.location, \
     j.employment_type, j.is_remote, j.posted_date, j.expired, j.created_at, \
     c.id AS company_id, c.name AS company_name, c.icon_url AS company_icon_url";

/// PostgreSQL implementation of [`JobRepository`].
pub struct PgJobRepository {
    pool: Pool<Postgres>,
}

impl PgJobRepository {
    /// Create a new PgJobRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a joined job+company row into a JobRecord.
    pub(crate) fn parse_job_row(row: &sqlx::postgres::PgRow) -> JobRecord {
        JobRecord {
            id: row.get("id"),
            title: row.get("title"),
            url: row.get("url"),
            full_description: row.get("full_description"),
            company: CompanyBrief {
                id: row.get("company_id"),
                name: row.get("company_name"),
                icon_url: row.get("company_icon_url"),
            },
            location: row.get("location"),
            employment_type: row.get("employment_type"),
            is_remote: row.get("is_remote"),
            posted_date: row.get("posted_date"),
            expired: row.get("expired"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn fetch_eligible(&self, limit: i64) -> Result<Vec<JobRecord>> {
        let query = format!(
            "SELECT {JOB_COLUMNS}
             FROM jobs j
             JOIN companies c ON c.id = j.company_id
             JOIN job_analyses a ON a.job_id = j.id
             WHERE a.status IN ('pending', 'failed')
             ORDER BY j.created_at ASC
             LIMIT $1"
        );

        let rows = sqlx::query(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_job_row).collect())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        let query = format!(
            "SELECT {JOB_COLUMNS}
             FROM jobs j
             JOIN companies c ON c.id = j.company_id
             WHERE j.id = $1"
        );

        let row = sqlx::query(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_job_row))
    }

    async fn fetch_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<(JobRecord, Option<Analysis>)>> {
        let query = format!(
            "SELECT {JOB_COLUMNS},
                    a.job_id AS analysis_job_id, a.status, a.salary_min, a.salary_max,
                    a.salary_fixed, a.salary_currency, a.salary_period,
                    a.is_salary_estimated, a.skill_tags, a.experience_level,
                    a.summary, a.locations, a.updated_at
             FROM jobs j
             JOIN companies c ON c.id = j.company_id
             LEFT JOIN job_analyses a ON a.job_id = j.id
             ORDER BY j.id ASC
             OFFSET $1 LIMIT $2"
        );

        let rows = sqlx::query(&query)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in &rows {
            let job = Self::parse_job_row(row);
            let analysis: Option<Uuid> = row.get("analysis_job_id");
            let analysis = match analysis {
                Some(_) => Some(parse_analysis_columns(row)?),
                None => None,
            };
            pairs.push((job, analysis));
        }
        Ok(pairs)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }
}
