use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;

use proteus_core::{
    CrawlError, CrawlService, CrawlerConfig, EndpointDef, HealthConfig, Lease, PacingConfig,
    ProxyPool, ProxyProtocol, RawContent, RetryConfig, SourceAdapter,
};
use proteus_server::routes;
use proteus_server::state::AppState;

pub const TEST_API_TOKEN: &str = "test-secret-token";

/// Canned result page with one WO and one BR publication in it.
pub const STUB_PAGE: &str =
    "<html><body>Results: WO 2024/123456 A1 and BR 112023012345 B1.</body></html>";

/// Adapter that resolves every query with the same canned page.
pub struct StubAdapter;

#[async_trait]
impl SourceAdapter for StubAdapter {
    fn name(&self) -> &str {
        "stub"
    }

    async fn attempt(
        &self,
        _query: &str,
        _lease: &Lease,
        _timeout: Duration,
    ) -> Result<RawContent, CrawlError> {
        Ok(STUB_PAGE.to_string())
    }
}

/// Adapter whose every attempt fails with a network error.
pub struct DownAdapter;

#[async_trait]
impl SourceAdapter for DownAdapter {
    fn name(&self) -> &str {
        "down"
    }

    async fn attempt(
        &self,
        _query: &str,
        _lease: &Lease,
        _timeout: Duration,
    ) -> Result<RawContent, CrawlError> {
        Err(CrawlError::NetworkError("connection reset".to_string()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: ProxyPool,
}

/// Build the app router over a three-endpoint pool and the given tier ladder.
/// Pacing is disabled and backoff shrunk so batches finish in milliseconds.
pub fn setup_test_app(tiers: Vec<Arc<dyn SourceAdapter>>) -> TestApp {
    let endpoints = (1..=3)
        .map(|i| EndpointDef::new(format!("10.0.0.{i}:8080"), ProxyProtocol::Http))
        .collect();
    let pool = ProxyPool::new(endpoints, Vec::new(), HealthConfig::default());

    let config = CrawlerConfig {
        concurrency: 5,
        health: HealthConfig::default(),
        retry: RetryConfig {
            max_attempts: 3,
            base: Duration::from_millis(1),
            max_wait: Duration::from_millis(5),
        },
        attempt_timeout: Duration::from_secs(5),
        task_deadline: Duration::from_secs(30),
        pacing: PacingConfig::disabled(),
    };

    let service = CrawlService::new(pool.clone(), config, tiers);
    let state = Arc::new(AppState {
        service,
        api_token: TEST_API_TOKEN.to_string(),
    });

    TestApp {
        router: routes::router(state),
        pool,
    }
}

/// Drive every endpoint into quarantine through recorded failures.
pub fn quarantine_all(pool: &ProxyPool) {
    while let Ok(lease) = pool.lease() {
        for _ in 0..3 {
            pool.record_outcome(lease.endpoint_id, false);
        }
    }
}
