//! Retry engine: runs one tier's attempt loop under the global concurrency
//! limit.
//!
//! Each attempt leases a fresh endpoint, so retries naturally move across the
//! pool instead of hammering the endpoint that just failed. A concurrency slot
//! is held for the lifetime of a task, backoff sleeps included; slots bound
//! how many tasks are in flight, not how many sockets are open.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::adapter::{RawContent, SourceAdapter};
use crate::clock::SharedClock;
use crate::config::CrawlerConfig;
use crate::delay::DelaySource;
use crate::error::CrawlError;
use crate::pool::ProxyPool;

/// A tier run that produced content, with the attempts it cost.
#[derive(Debug)]
pub(crate) struct TierSuccess {
    pub content: RawContent,
    pub attempts: u32,
}

pub(crate) struct TaskExecutor {
    pool: ProxyPool,
    clock: SharedClock,
    config: CrawlerConfig,
    slots: Arc<Semaphore>,
    delays: Arc<DelaySource>,
}

impl TaskExecutor {
    pub(crate) fn new(pool: ProxyPool, config: CrawlerConfig, delays: Arc<DelaySource>) -> Self {
        let clock = pool.clock();
        let slots = Arc::new(Semaphore::new(config.concurrency));
        Self {
            pool,
            clock,
            config,
            slots,
            delays,
        }
    }

    pub(crate) fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub(crate) fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    /// Waits for a free task slot. The permit must stay alive until the task
    /// is fully done so that backoff and pacing time count against the limit.
    pub(crate) async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit, CrawlError> {
        Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| CrawlError::Generic("Concurrency limiter closed".into()))
    }

    /// Runs one adapter until it succeeds, its attempt budget runs out, or a
    /// non-local condition (pool exhaustion, task deadline) stops the task.
    ///
    /// Every failed attempt that implicates the endpoint is reported to the
    /// pool before the next lease, so a dying endpoint is quarantined while
    /// the loop is still running.
    pub(crate) async fn run_tier(
        &self,
        adapter: &dyn SourceAdapter,
        query: &str,
        deadline: Instant,
    ) -> Result<TierSuccess, CrawlError> {
        let tier = adapter.name();
        let max_attempts = adapter
            .max_attempts()
            .unwrap_or(self.config.retry.max_attempts);
        let mut last_error: Option<CrawlError> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let wait = self.delays.backoff(attempt - 2, &self.config.retry);
                tracing::debug!(
                    tier,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(wait).await;
            }
            if self.clock.now() >= deadline {
                return Err(self.deadline_error());
            }

            let lease = self.pool.lease()?;
            tracing::debug!(tier, attempt, endpoint = %lease.address, query, "Starting attempt");

            let result = match tokio::time::timeout(
                self.config.attempt_timeout,
                adapter.attempt(query, &lease, self.config.attempt_timeout),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(CrawlError::Timeout(self.config.attempt_timeout.as_secs())),
            };

            match result {
                Ok(content) => {
                    self.pool.record_outcome(lease.endpoint_id, true);
                    if self.clock.now() >= deadline {
                        // The fetch landed, but the task has already overrun;
                        // the endpoint keeps the credit, the caller does not.
                        tracing::warn!(
                            tier,
                            attempt,
                            "Discarding result finished past the task deadline"
                        );
                        return Err(self.deadline_error());
                    }
                    tracing::info!(tier, attempt, endpoint = %lease.address, "Fetch succeeded");
                    return Ok(TierSuccess { content, attempts: attempt });
                }
                Err(err) => {
                    if err.counts_against_endpoint() {
                        self.pool.record_outcome(lease.endpoint_id, false);
                    }
                    tracing::warn!(
                        tier,
                        attempt,
                        endpoint = %lease.address,
                        error = %err,
                        "Fetch attempt failed"
                    );
                    if !err.is_retryable() {
                        return Err(CrawlError::TierExhausted {
                            tier: tier.to_string(),
                            attempts: attempt,
                            last_error: err.to_string(),
                        });
                    }
                    last_error = Some(err);
                }
            }
        }

        let last_error = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no attempts made".into());
        Err(CrawlError::TierExhausted {
            tier: tier.to_string(),
            attempts: max_attempts,
            last_error,
        })
    }

    fn deadline_error(&self) -> CrawlError {
        CrawlError::DeadlineExceeded(self.config.task_deadline.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::clock::ManualClock;
    use crate::pool::Lease;
    use crate::testutil::{MockAdapter, fast_config, manual_pool};

    fn executor_over(pool: ProxyPool) -> TaskExecutor {
        TaskExecutor::new(pool, fast_config(), Arc::new(DelaySource::seeded(7)))
    }

    fn far_deadline(executor: &TaskExecutor) -> Instant {
        executor.clock.now() + Duration::from_secs(3600)
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let (pool, _clock) = manual_pool(2);
        let executor = executor_over(pool.clone());
        let adapter = MockAdapter::succeeding("http");

        let deadline = far_deadline(&executor);
        let success = executor.run_tier(&adapter, "solar cell", deadline).await.unwrap();

        assert_eq!(success.attempts, 1);
        assert_eq!(adapter.calls(), 1);
        assert_eq!(pool.snapshot().total_successes, 1);
    }

    #[tokio::test]
    async fn test_retries_with_fresh_lease_until_success() {
        let (pool, _clock) = manual_pool(3);
        let executor = executor_over(pool.clone());
        let adapter = MockAdapter::scripted(
            "http",
            vec![
                Err(CrawlError::NetworkError("connection reset".into())),
                Err(CrawlError::Blocked { status: 429 }),
                Ok("page".into()),
            ],
        );

        let deadline = far_deadline(&executor);
        let success = executor.run_tier(&adapter, "q", deadline).await.unwrap();

        assert_eq!(success.attempts, 3);
        assert_eq!(success.content, "page");
        assert_eq!(adapter.calls(), 3);

        // The two failures hit two different endpoints.
        let snapshot = pool.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.total_successes, 1);
    }

    #[tokio::test]
    async fn test_tier_exhausted_after_attempt_budget() {
        let (pool, _clock) = manual_pool(5);
        let executor = executor_over(pool);
        let adapter = MockAdapter::scripted(
            "http",
            vec![
                Err(CrawlError::Timeout(5)),
                Err(CrawlError::Timeout(5)),
                Err(CrawlError::Timeout(5)),
            ],
        );

        let deadline = far_deadline(&executor);
        let err = executor.run_tier(&adapter, "q", deadline).await.unwrap_err();

        assert_eq!(adapter.calls(), 3);
        match err {
            CrawlError::TierExhausted { tier, attempts, last_error } => {
                assert_eq!(tier, "http");
                assert_eq!(attempts, 3);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("expected TierExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pool_exhaustion_escalates_without_attempts() {
        let (pool, _clock) = manual_pool(1);
        for _ in 0..3 {
            pool.record_outcome(0, false);
        }
        let executor = executor_over(pool);
        let adapter = MockAdapter::succeeding("http");

        let deadline = far_deadline(&executor);
        let err = executor.run_tier(&adapter, "q", deadline).await.unwrap_err();

        assert!(matches!(err, CrawlError::PoolExhausted));
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_adapter_attempt_override_shrinks_budget() {
        let (pool, _clock) = manual_pool(2);
        let executor = executor_over(pool);
        let adapter = MockAdapter::scripted(
            "browser",
            vec![Err(CrawlError::BrowserError("tab crashed".into()))],
        )
        .with_max_attempts(1);

        let deadline = far_deadline(&executor);
        let err = executor.run_tier(&adapter, "q", deadline).await.unwrap_err();

        assert_eq!(adapter.calls(), 1);
        assert!(matches!(err, CrawlError::TierExhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_repeated_failures_quarantine_sole_endpoint() {
        let (pool, _clock) = manual_pool(1);
        let executor = executor_over(pool.clone());
        let adapter = MockAdapter::scripted(
            "http",
            vec![
                Err(CrawlError::NetworkError("reset".into())),
                Err(CrawlError::NetworkError("reset".into())),
                Err(CrawlError::NetworkError("reset".into())),
            ],
        );

        let deadline = far_deadline(&executor);
        let err = executor.run_tier(&adapter, "q", deadline).await.unwrap_err();

        assert!(matches!(err, CrawlError::TierExhausted { .. }));
        assert!(pool.list_healthy().is_empty());
    }

    #[tokio::test]
    async fn test_expired_deadline_stops_before_first_attempt() {
        let (pool, _clock) = manual_pool(2);
        let executor = executor_over(pool);
        let adapter = MockAdapter::succeeding("http");

        let deadline = executor.clock.now();
        let err = executor.run_tier(&adapter, "q", deadline).await.unwrap_err();

        assert!(matches!(err, CrawlError::DeadlineExceeded(_)));
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_retryable_error_ends_tier_early() {
        let (pool, _clock) = manual_pool(3);
        let executor = executor_over(pool.clone());
        let adapter = MockAdapter::scripted(
            "http",
            vec![Err(CrawlError::Generic("adapter misconfigured".into()))],
        );

        let deadline = far_deadline(&executor);
        let err = executor.run_tier(&adapter, "q", deadline).await.unwrap_err();

        assert_eq!(adapter.calls(), 1);
        assert!(matches!(err, CrawlError::TierExhausted { attempts: 1, .. }));
        // A generic failure says nothing about the endpoint.
        assert_eq!(pool.list_healthy().len(), 3);
    }

    /// Adapter that pushes the injected clock past the deadline while the
    /// request is "in flight", then succeeds.
    struct OverrunningAdapter {
        clock: ManualClock,
        advance: Duration,
    }

    #[async_trait]
    impl SourceAdapter for OverrunningAdapter {
        fn name(&self) -> &str {
            "http"
        }

        async fn attempt(
            &self,
            _query: &str,
            _lease: &Lease,
            _timeout: Duration,
        ) -> Result<RawContent, CrawlError> {
            self.clock.advance(self.advance);
            Ok("late page".into())
        }
    }

    #[tokio::test]
    async fn test_success_past_deadline_is_discarded_but_recorded() {
        let (pool, clock) = manual_pool(2);
        let executor = executor_over(pool.clone());
        let adapter = OverrunningAdapter {
            clock,
            advance: Duration::from_secs(120),
        };

        let deadline = executor.clock.now() + Duration::from_secs(60);
        let err = executor.run_tier(&adapter, "q", deadline).await.unwrap_err();

        assert!(matches!(err, CrawlError::DeadlineExceeded(_)));
        // The endpoint still gets credit for the completed fetch.
        let snapshot = pool.snapshot();
        assert_eq!(snapshot.total_successes, 1);
    }

    #[tokio::test]
    async fn test_slots_block_at_the_concurrency_limit() {
        let (pool, _clock) = manual_pool(2);
        let mut config = fast_config();
        config.concurrency = 2;
        let executor = TaskExecutor::new(pool, config, Arc::new(DelaySource::seeded(7)));

        let first = executor.acquire_slot().await.unwrap();
        let _second = executor.acquire_slot().await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(20), executor.acquire_slot()).await;
        assert!(blocked.is_err(), "third slot should not be granted");

        drop(first);
        let third = tokio::time::timeout(Duration::from_millis(100), executor.acquire_slot()).await;
        assert!(third.is_ok());
    }
}
