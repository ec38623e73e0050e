//! Test utilities: mock source adapters and pool builders.
//!
//! Handwritten mocks for dependency injection in unit tests. Adapters use
//! `Arc<Mutex<_>>` for interior mutability, allowing tests to script
//! responses and assert on recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::adapter::{RawContent, SourceAdapter};
use crate::clock::ManualClock;
use crate::config::{CrawlerConfig, CredentialDef, EndpointDef};
use crate::delay::{PacingConfig, RetryConfig};
use crate::endpoint::ProxyProtocol;
use crate::error::CrawlError;
use crate::health::HealthConfig;
use crate::pool::{Lease, ProxyPool};

// ---------------------------------------------------------------------------
// MockAdapter
// ---------------------------------------------------------------------------

/// Mock source tier with a scripted response queue.
pub struct MockAdapter {
    name: String,
    /// Queue of responses. Each attempt pops the first element; once empty,
    /// attempts succeed with a default page.
    responses: Arc<Mutex<Vec<Result<RawContent, CrawlError>>>>,
    calls: AtomicU32,
    max_attempts: Option<u32>,
}

impl MockAdapter {
    /// Adapter that succeeds on every attempt.
    pub fn succeeding(name: &str) -> Self {
        Self::scripted(name, Vec::new())
    }

    pub fn scripted(name: &str, responses: Vec<Result<RawContent, CrawlError>>) -> Self {
        Self {
            name: name.to_string(),
            responses: Arc::new(Mutex::new(responses)),
            calls: AtomicU32::new(0),
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Number of attempts made through this adapter.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    async fn attempt(
        &self,
        query: &str,
        _lease: &Lease,
        _timeout: Duration,
    ) -> Result<RawContent, CrawlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(format!("content for {query}"))
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// SleepyAdapter
// ---------------------------------------------------------------------------

/// Mock tier that holds each attempt open for a while and records how many
/// attempts overlapped, for assertions on the concurrency limit.
pub struct SleepyAdapter {
    name: String,
    default_delay: Duration,
    query_delays: HashMap<String, Duration>,
    active: AtomicU32,
    peak: AtomicU32,
}

impl SleepyAdapter {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            default_delay: delay,
            query_delays: HashMap::new(),
            active: AtomicU32::new(0),
            peak: AtomicU32::new(0),
        }
    }

    /// Overrides the hold time for one specific query.
    pub fn with_query_delay(mut self, query: &str, delay: Duration) -> Self {
        self.query_delays.insert(query.to_string(), delay);
        self
    }

    /// Highest number of attempts in flight at the same time.
    pub fn peak_concurrency(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for SleepyAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(
        &self,
        query: &str,
        _lease: &Lease,
        _timeout: Duration,
    ) -> Result<RawContent, CrawlError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        let delay = self
            .query_delays
            .get(query)
            .copied()
            .unwrap_or(self.default_delay);
        tokio::time::sleep(delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("content for {query}"))
    }
}

// ---------------------------------------------------------------------------
// Pool and config builders
// ---------------------------------------------------------------------------

/// Endpoint definitions 10.0.0.1:8080 through 10.0.0.<count>:8080.
pub fn endpoint_defs(count: usize) -> Vec<EndpointDef> {
    (1..=count)
        .map(|i| EndpointDef::new(format!("10.0.0.{i}:8080"), ProxyProtocol::Http))
        .collect()
}

/// Credential definitions cred-1 through cred-<count>, sharing one quota.
pub fn credential_defs(count: usize, quota: u32) -> Vec<CredentialDef> {
    (1..=count)
        .map(|i| CredentialDef {
            id: format!("cred-{i}"),
            provider: "acme".to_string(),
            username: None,
            key: format!("key-{i}"),
            quota,
        })
        .collect()
}

/// Pool over a manual clock, so the test controls the passage of time.
pub fn manual_pool(endpoints: usize) -> (ProxyPool, ManualClock) {
    manual_pool_with_credentials(endpoints, Vec::new())
}

pub fn manual_pool_with_credentials(
    endpoints: usize,
    credentials: Vec<CredentialDef>,
) -> (ProxyPool, ManualClock) {
    let clock = ManualClock::new();
    let pool = ProxyPool::with_clock(
        endpoint_defs(endpoints),
        credentials,
        HealthConfig::default(),
        Arc::new(clock.clone()),
    );
    (pool, clock)
}

/// Crawler config with delays shrunk so retry tests finish in milliseconds.
pub fn fast_config() -> CrawlerConfig {
    CrawlerConfig {
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
    }
}
