//! Worker pool scheduler for the enrichment pipeline.
//!
//! One scheduling loop plus a bounded pool of worker tasks. Each cycle
//! fetches up to `2 × concurrency` eligible jobs, fans them out, and waits
//! for the whole batch before fetching again. A job's lifecycle inside a
//! task: claim → enrich → complete + publish, or fail. A single bad job is
//! logged and failed; it never aborts siblings or the loop.
//!
//! Tasks share no mutable state: each acquires its own pooled connection,
//! and the only shared structure is the owned-analyses registry used for
//! shutdown recovery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use joblens_core::{
    defaults, Analysis, AnalysisRepository, AnalysisStatus, EnrichmentOutcome, Error, JobRecord,
    JobRepository, Result,
};
use joblens_db::Database;
use joblens_enrich::Enricher;
use joblens_search::{build_document, IndexSync};

use crate::owned::OwnedAnalyses;

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of concurrently processed jobs.
    pub concurrency: usize,
    /// Sleep between polls when no eligible jobs are found.
    pub poll_interval: Duration,
    /// Whether to process jobs at all.
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::WORKER_CONCURRENCY,
            poll_interval: Duration::from_secs(defaults::WORKER_POLL_INTERVAL_SECS),
            enabled: true,
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable processing |
    /// | `WORKER_CONCURRENCY` | `5` | Max concurrent jobs |
    /// | `WORKER_POLL_INTERVAL_SECS` | `60` | Polling interval when idle |
    pub fn from_env() -> Self {
        let enabled = std::env::var("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let concurrency = std::env::var("WORKER_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_CONCURRENCY)
            .max(1);

        let poll_interval_secs = std::env::var("WORKER_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::WORKER_POLL_INTERVAL_SECS);

        Self {
            concurrency,
            poll_interval: Duration::from_secs(poll_interval_secs),
            enabled,
        }
    }

    /// Set maximum concurrent jobs.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the idle polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable or disable processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Eligible jobs fetched per cycle.
    pub fn batch_size(&self) -> i64 {
        (self.concurrency * defaults::WORKER_BATCH_FACTOR) as i64
    }
}

/// Event emitted by the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// Scheduler started.
    Started,
    /// A job was claimed and is being enriched.
    JobStarted { job_id: Uuid },
    /// A job's analysis completed and its document was published.
    JobCompleted { job_id: Uuid },
    /// A job failed and re-entered the eligible pool.
    JobFailed { job_id: Uuid, error: String },
    /// Scheduler stopped; recovery sweep has run.
    Stopped,
}

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SchedulerEvent>,
    join: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the scheduler to stop issuing batches, let in-flight work
    /// drain, run the recovery sweep, and wait for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("scheduler already stopped".into()))?;
        self.join
            .await
            .map_err(|e| Error::Internal(format!("scheduler task panicked: {e}")))?;
        Ok(())
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_rx.resubscribe()
    }
}

/// The enrichment pipeline scheduler.
pub struct Scheduler {
    db: Database,
    enricher: Arc<Enricher>,
    sync: Arc<IndexSync>,
    owned: OwnedAnalyses,
    config: SchedulerConfig,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a new scheduler. The owned-analyses registry is injected so
    /// callers control its scope.
    pub fn new(
        db: Database,
        enricher: Arc<Enricher>,
        sync: Arc<IndexSync>,
        owned: OwnedAnalyses,
        config: SchedulerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            db,
            enricher,
            sync,
            owned,
            config,
            event_tx,
        }
    }

    /// Start the scheduling loop and return a control handle.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let scheduler = Arc::new(self);
        let join = tokio::spawn(async move {
            scheduler.run(&mut shutdown_rx).await;
        });

        SchedulerHandle {
            shutdown_tx,
            event_rx,
            join,
        }
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_tx.subscribe()
    }

    /// Run the scheduling loop until a shutdown signal arrives, then force
    /// every still-owned `processing` analysis back to `failed` so nothing
    /// stays invisibly stuck.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Scheduler is disabled, not starting");
            return;
        }

        info!(
            concurrency = self.config.concurrency,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Scheduler started"
        );
        let _ = self.event_tx.send(SchedulerEvent::Started);

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        loop {
            // Check for shutdown before issuing a new batch.
            if shutdown_rx.try_recv().is_ok() {
                info!("Scheduler received shutdown signal");
                break;
            }

            let batch = match self.db.jobs.fetch_eligible(self.config.batch_size()).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "Failed to fetch eligible jobs");
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("Scheduler received shutdown signal");
                            break;
                        }
                        _ = sleep(self.config.poll_interval) => {}
                    }
                    continue
                }
            };

            if batch.is_empty() {
                debug!("No eligible jobs, sleeping");
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                    _ = sleep(self.config.poll_interval) => continue,
                }
            }

            debug!(batch_size = batch.len(), "Dispatching job batch");
            let mut tasks = JoinSet::new();
            for job in batch {
                let ctx = self.task_ctx();
                let semaphore = semaphore.clone();
                tasks.spawn(async move {
                    // Bound actual parallelism at `concurrency` even though a
                    // full batch is dispatched.
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    ctx.process_job(job).await;
                });
            }

            // Wait for the whole batch before fetching the next one, so the
            // eligibility re-query always reflects committed state.
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    error!(error = ?e, "Job task panicked");
                }
            }
        }

        self.recover().await;
        let _ = self.event_tx.send(SchedulerEvent::Stopped);
        info!("Scheduler stopped");
    }

    /// Recovery sweep: every analysis still owned by this process and still
    /// `processing` is forced to `failed`.
    async fn recover(&self) {
        let owned = self.owned.snapshot();
        if owned.is_empty() {
            return;
        }
        match self.db.analyses.fail_if_processing(&owned).await {
            Ok(swept) => {
                warn!(
                    result_count = swept,
                    "Recovery sweep returned owned analyses to the eligible pool"
                );
            }
            Err(e) => {
                error!(error = %e, "Recovery sweep failed");
            }
        }
    }

    fn task_ctx(&self) -> TaskCtx {
        TaskCtx {
            db: self.db.clone(),
            enricher: self.enricher.clone(),
            sync: self.sync.clone(),
            owned: self.owned.clone(),
            event_tx: self.event_tx.clone(),
        }
    }
}

/// Reference bundle for processing a single job in a spawned task.
struct TaskCtx {
    db: Database,
    enricher: Arc<Enricher>,
    sync: Arc<IndexSync>,
    owned: OwnedAnalyses,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

impl TaskCtx {
    /// Process one claimed job end to end.
    async fn process_job(self, job: JobRecord) {
        let start = Instant::now();
        let job_id = job.id;

        // The claim is the atomic gate: losing the race is not an error.
        match self.db.analyses.claim(job_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(job_id = %job_id, "Lost claim race, skipping");
                return;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to claim job");
                return;
            }
        }

        self.owned.insert(job_id);
        let _ = self.event_tx.send(SchedulerEvent::JobStarted { job_id });
        info!(job_id = %job_id, "Processing job");

        let result = self.enrich_and_publish(&job).await;
        match result {
            Ok(()) => {
                info!(
                    job_id = %job_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Job enriched and indexed"
                );
                let _ = self.event_tx.send(SchedulerEvent::JobCompleted { job_id });
            }
            Err(e) => {
                warn!(
                    job_id = %job_id,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Job failed"
                );
                // `fail` is conditioned on `processing`: if the analysis
                // already completed and only publication failed, it stays
                // completed and a later rebuild will index it.
                if let Err(fail_err) = self.db.analyses.fail(job_id).await {
                    error!(job_id = %job_id, error = %fail_err, "Failed to mark job as failed");
                }
                let _ = self.event_tx.send(SchedulerEvent::JobFailed {
                    job_id,
                    error: e.to_string(),
                });
            }
        }

        self.owned.remove(job_id);
    }

    async fn enrich_and_publish(&self, job: &JobRecord) -> Result<()> {
        let outcome = self.enricher.enrich(job).await?;
        self.db.analyses.complete(job.id, &outcome).await?;

        let analysis = completed_analysis(job.id, outcome);
        let document = build_document(job, &analysis);
        self.sync.upsert(&document).await?;
        Ok(())
    }
}

/// Materialize the completed analysis row shape from a fresh outcome,
/// avoiding a re-read of what this task just wrote.
fn completed_analysis(job_id: Uuid, outcome: EnrichmentOutcome) -> Analysis {
    Analysis {
        job_id,
        status: AnalysisStatus::Completed,
        salary_min: outcome.salary_min,
        salary_max: outcome.salary_max,
        salary_fixed: outcome.salary_fixed,
        salary_currency: outcome.salary_currency,
        salary_period: outcome.salary_period,
        is_salary_estimated: outcome.is_salary_estimated,
        skill_tags: outcome.skill_tags,
        experience_level: outcome.experience_level,
        summary: outcome.summary,
        locations: outcome.locations,
        updated_at: Utc::now(),
    }
}
