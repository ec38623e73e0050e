//! Layered crawl orchestration over a shared endpoint pool.
//!
//! [`CrawlService`] walks each query down an ordered ladder of source tiers,
//! cheapest first, escalating only when a tier's whole attempt budget is
//! spent. Batches fan out onto the runtime but stay bounded by the executor's
//! slot semaphore, and their results come back in submission order no matter
//! which task finished first.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::adapter::SourceAdapter;
use crate::config::CrawlerConfig;
use crate::delay::DelaySource;
use crate::error::CrawlError;
use crate::executor::TaskExecutor;
use crate::pool::ProxyPool;
use crate::stats::PoolSnapshot;
use crate::task::{BatchReport, CrawlTask, QueryOutcome, QueryReport};

/// Coordinates queries across source tiers, the endpoint pool, and the
/// concurrency limiter. Cloning shares all state.
#[derive(Clone)]
pub struct CrawlService {
    executor: Arc<TaskExecutor>,
    tiers: Vec<Arc<dyn SourceAdapter>>,
    delays: Arc<DelaySource>,
}

impl CrawlService {
    /// Builds a service over `pool` with the given tier ladder. Tiers run in
    /// the order given.
    pub fn new(
        pool: ProxyPool,
        config: CrawlerConfig,
        tiers: Vec<Arc<dyn SourceAdapter>>,
    ) -> Self {
        Self::with_delays(pool, config, tiers, Arc::new(DelaySource::new()))
    }

    /// Like [`CrawlService::new`] but with an injected delay source, so tests
    /// can pin jitter and pacing to a seed.
    pub fn with_delays(
        pool: ProxyPool,
        config: CrawlerConfig,
        tiers: Vec<Arc<dyn SourceAdapter>>,
        delays: Arc<DelaySource>,
    ) -> Self {
        let executor = Arc::new(TaskExecutor::new(pool, config, Arc::clone(&delays)));
        Self {
            executor,
            tiers,
            delays,
        }
    }

    pub fn pool(&self) -> &ProxyPool {
        self.executor.pool()
    }

    /// Current pool statistics.
    pub fn snapshot(&self) -> PoolSnapshot {
        self.executor.pool().snapshot()
    }

    /// Resolves a batch of queries concurrently.
    ///
    /// Task launches are staggered by the configured pacing delay so a batch
    /// does not land on the target as one burst. The returned reports are in
    /// the same order as `queries`.
    pub async fn run_batch(&self, queries: Vec<String>) -> BatchReport {
        let started_at = Utc::now();
        let pacing = self.executor.config().pacing.clone();

        let mut handles: Vec<(CrawlTask, JoinHandle<QueryReport>)> =
            Vec::with_capacity(queries.len());
        for (index, query) in queries.into_iter().enumerate() {
            if index > 0 && !pacing.is_disabled() {
                let pause = self.delays.pacing(&pacing);
                tokio::time::sleep(pause).await;
            }

            let task = CrawlTask::new(query);
            let service = self.clone();
            let job = task.clone();
            let handle = tokio::spawn(async move { service.run_task(job).await });
            handles.push((task, handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (task, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(err) => {
                    tracing::error!(task_id = %task.id, error = %err, "Crawl task aborted abnormally");
                    QueryReport {
                        task_id: task.id,
                        query: task.query,
                        outcome: QueryOutcome::Failed {
                            error: format!("Task aborted: {err}"),
                            tiers_tried: Vec::new(),
                        },
                        elapsed_ms: 0,
                    }
                }
            };
            reports.push(report);
        }

        let report = BatchReport::collect(started_at, reports);
        tracing::info!(
            batch_id = %report.batch_id,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "Batch finished"
        );
        report
    }

    /// Convenience wrapper for a single query.
    pub async fn run_query(&self, query: impl Into<String>) -> QueryReport {
        self.run_task(CrawlTask::new(query)).await
    }

    /// Resolves one task through the tier ladder.
    ///
    /// The task deadline starts once a concurrency slot is held, so time
    /// spent queueing behind other tasks does not count against it.
    pub async fn run_task(&self, task: CrawlTask) -> QueryReport {
        let clock = self.executor.pool().clock();

        let (outcome, started) = match self.executor.acquire_slot().await {
            Ok(_permit) => {
                let started = clock.now();
                let deadline = started + self.executor.config().task_deadline;
                (self.run_tiers(&task, deadline).await, started)
            }
            Err(err) => (
                QueryOutcome::Failed {
                    error: err.to_string(),
                    tiers_tried: Vec::new(),
                },
                clock.now(),
            ),
        };

        let elapsed_ms = clock.now().saturating_duration_since(started).as_millis() as u64;
        QueryReport {
            task_id: task.id,
            query: task.query,
            outcome,
            elapsed_ms,
        }
    }

    async fn run_tiers(&self, task: &CrawlTask, deadline: Instant) -> QueryOutcome {
        let mut tiers_tried = Vec::new();
        let mut last_error: Option<CrawlError> = None;

        for adapter in &self.tiers {
            tiers_tried.push(adapter.name().to_string());

            match self
                .executor
                .run_tier(adapter.as_ref(), &task.query, deadline)
                .await
            {
                Ok(success) => {
                    return QueryOutcome::Success {
                        tier: adapter.name().to_string(),
                        attempts: success.attempts,
                        content: success.content,
                    };
                }
                // Nothing a higher tier could do about these.
                Err(err)
                    if err.is_pool_exhaustion()
                        || matches!(err, CrawlError::DeadlineExceeded(_)) =>
                {
                    tracing::warn!(
                        task_id = %task.id,
                        query = %task.query,
                        error = %err,
                        "Task aborted"
                    );
                    return QueryOutcome::Failed {
                        error: err.to_string(),
                        tiers_tried,
                    };
                }
                Err(err) => {
                    tracing::info!(
                        task_id = %task.id,
                        tier = adapter.name(),
                        error = %err,
                        "Tier gave up"
                    );
                    last_error = Some(err);
                }
            }
        }

        let error = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no source tiers configured".into());
        QueryOutcome::Failed { error, tiers_tried }
    }
}
