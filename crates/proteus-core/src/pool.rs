//! Shared registry of egress endpoints and access credentials.
//!
//! [`ProxyPool`] is the single object that crawl tasks consult before every
//! attempt. It owns the endpoint list, the credential list, the rotation
//! cursor, and the identity of the previously selected endpoint, all behind
//! one mutex. Every operation that reads endpoint health first sweeps the
//! pool for quarantine windows that have elapsed, so recovery needs no
//! background timer.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::clock::{SharedClock, SystemClock};
use crate::config::{CredentialDef, EndpointDef};
use crate::endpoint::{AccessCredential, EgressEndpoint, EndpointId, ProxyProtocol};
use crate::error::CrawlError;
use crate::health::{self, HealthConfig};
use crate::rotation::{self, Pick};
use crate::stats::PoolSnapshot;

struct PoolInner {
    endpoints: Vec<EgressEndpoint>,
    credentials: Vec<AccessCredential>,
    /// Next index to consider for credential round-robin.
    credential_cursor: usize,
    /// Endpoint handed out by the most recent lease, across all tasks.
    last_selected: Option<EndpointId>,
}

/// An endpoint/credential binding handed to one request attempt.
///
/// The lease is informational: the endpoint is not exclusively reserved and
/// there is nothing to release. Dropping the lease has no effect on the pool;
/// the caller reports how the attempt went via [`ProxyPool::record_outcome`].
#[derive(Debug, Clone)]
pub struct Lease {
    pub endpoint_id: EndpointId,
    pub address: String,
    pub protocol: ProxyProtocol,
    pub credential: Option<LeasedCredential>,
}

impl Lease {
    /// Scheme-qualified URL for handing to an HTTP or browser client.
    pub fn proxy_url(&self) -> String {
        format!("{}://{}", self.protocol.scheme(), self.address)
    }
}

/// Credential material cloned out of the pool for the duration of an attempt.
#[derive(Clone)]
pub struct LeasedCredential {
    pub id: String,
    pub provider: String,
    pub username: Option<String>,
    pub key: String,
}

impl fmt::Debug for LeasedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeasedCredential")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("username", &self.username)
            .field("key", &"***")
            .finish()
    }
}

/// Thread-safe endpoint pool with health tracking and rotation.
///
/// Cloning is cheap and all clones share the same state.
#[derive(Clone)]
pub struct ProxyPool {
    inner: Arc<Mutex<PoolInner>>,
    clock: SharedClock,
    config: HealthConfig,
}

impl ProxyPool {
    /// Builds a pool over the given definitions, using the system clock.
    pub fn new(
        endpoints: Vec<EndpointDef>,
        credentials: Vec<CredentialDef>,
        config: HealthConfig,
    ) -> Self {
        Self::with_clock(endpoints, credentials, config, Arc::new(SystemClock))
    }

    /// Builds a pool with an injected clock. Tests use this to step through
    /// quarantine windows without sleeping.
    pub fn with_clock(
        endpoints: Vec<EndpointDef>,
        credentials: Vec<CredentialDef>,
        config: HealthConfig,
        clock: SharedClock,
    ) -> Self {
        let endpoints = endpoints
            .into_iter()
            .enumerate()
            .map(|(id, def)| EgressEndpoint::new(id, def.address, def.protocol, def.credential))
            .collect();
        let credentials = credentials
            .into_iter()
            .map(|def| AccessCredential::new(def.id, def.provider, def.username, def.key, def.quota))
            .collect();

        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                endpoints,
                credentials,
                credential_cursor: 0,
                last_selected: None,
            })),
            clock,
            config,
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned pool mutex");
            poisoned.into_inner()
        })
    }

    /// The clock this pool reads time from.
    pub fn clock(&self) -> SharedClock {
        Arc::clone(&self.clock)
    }

    pub fn endpoint_count(&self) -> usize {
        self.lock_inner().endpoints.len()
    }

    pub fn credential_count(&self) -> usize {
        self.lock_inner().credentials.len()
    }

    /// Currently healthy endpoints, least-recently-used first.
    ///
    /// Elapsed quarantine windows are released before filtering, so an
    /// endpoint whose window has passed shows up here without any request
    /// having touched the pool in between.
    pub fn list_healthy(&self) -> Vec<EgressEndpoint> {
        let now = self.clock.now();
        let mut inner = self.lock_inner();
        release_due(&mut inner, now);

        let mut healthy: Vec<EgressEndpoint> = inner
            .endpoints
            .iter()
            .filter(|ep| ep.is_healthy())
            .cloned()
            .collect();
        healthy.sort_by(|a, b| rotation::cmp_last_used(a, b));
        healthy
    }

    /// Selects an endpoint and credential for one attempt.
    ///
    /// Fails with [`CrawlError::PoolExhausted`] when no endpoint is healthy
    /// and [`CrawlError::CredentialsExhausted`] when credentials are
    /// configured but every one has used up its quota. A pool configured
    /// without credentials leases with `credential: None`.
    pub fn lease(&self) -> Result<Lease, CrawlError> {
        let now = self.clock.now();
        let mut inner = self.lock_inner();
        release_due(&mut inner, now);

        let pick = {
            let healthy: Vec<&EgressEndpoint> =
                inner.endpoints.iter().filter(|ep| ep.is_healthy()).collect();
            rotation::pick_endpoint(&healthy, inner.last_selected)
        };
        let Some(pick) = pick else {
            return Err(CrawlError::PoolExhausted);
        };
        if let Pick::Repeated(id) = pick {
            tracing::warn!(
                endpoint = %inner.endpoints[id].address,
                "Sole healthy endpoint selected twice in a row"
            );
        }
        let endpoint_id = pick.endpoint_id();

        let credential = if inner.credentials.is_empty() {
            None
        } else {
            let Some(idx) = rotation::pick_credential(&inner.credentials, inner.credential_cursor)
            else {
                return Err(CrawlError::CredentialsExhausted);
            };
            inner.credential_cursor = idx + 1;
            let cred = &mut inner.credentials[idx];
            cred.quota_used += 1;
            cred.last_used = Some(now);
            Some(LeasedCredential {
                id: cred.id.clone(),
                provider: cred.provider.clone(),
                username: cred.username.clone(),
                key: cred.key.clone(),
            })
        };

        let (address, protocol) = {
            let ep = &mut inner.endpoints[endpoint_id];
            ep.last_used = Some(now);
            (ep.address.clone(), ep.protocol)
        };
        inner.last_selected = Some(endpoint_id);

        tracing::debug!(
            endpoint = %address,
            credential = credential.as_ref().map_or("-", |c| c.id.as_str()),
            "Leased endpoint"
        );

        Ok(Lease {
            endpoint_id,
            address,
            protocol,
            credential,
        })
    }

    /// Records the outcome of an attempt against the endpoint that served it.
    ///
    /// Success clears the endpoint's failure streak; reaching the configured
    /// failure threshold quarantines it. Outcomes reported for an unknown id
    /// are logged and dropped.
    pub fn record_outcome(&self, endpoint_id: EndpointId, success: bool) {
        let now = self.clock.now();
        let mut inner = self.lock_inner();
        let Some(ep) = inner.endpoints.get_mut(endpoint_id) else {
            tracing::warn!(endpoint_id, "Outcome recorded for unknown endpoint");
            return;
        };
        health::record_outcome(ep, success, &self.config, now);
    }

    /// Point-in-time view of the whole pool. Read-only apart from the
    /// quarantine release sweep; taking two snapshots back to back yields
    /// identical results.
    pub fn snapshot(&self) -> PoolSnapshot {
        let now = self.clock.now();
        let mut inner = self.lock_inner();
        release_due(&mut inner, now);
        PoolSnapshot::compute(&inner.endpoints, &inner.credentials, now)
    }
}

impl fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock_inner();
        f.debug_struct("ProxyPool")
            .field("endpoints", &inner.endpoints.len())
            .field("credentials", &inner.credentials.len())
            .field("last_selected", &inner.last_selected)
            .finish()
    }
}

fn release_due(inner: &mut PoolInner, now: Instant) {
    for ep in &mut inner.endpoints {
        health::release_if_due(ep, now);
    }
}
