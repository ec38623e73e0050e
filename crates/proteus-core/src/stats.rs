//! Read-only pool statistics.
//!
//! A snapshot is derived on demand from registry state under its lock; it is
//! a consistent point-in-time view and is never persisted.

use std::time::Instant;

use serde::Serialize;

use crate::endpoint::{AccessCredential, EgressEndpoint, EndpointStatus};

/// How many endpoints `top_performers` lists.
pub const TOP_PERFORMERS: usize = 5;

/// Point-in-time view of the pool for status surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolSnapshot {
    pub total_endpoints: usize,
    pub healthy: usize,
    pub quarantined: Vec<QuarantinedEntry>,
    pub total_requests: u64,
    pub total_successes: u64,
    /// Global success rate; 0.0 until any request is recorded.
    pub success_rate: f64,
    /// Best endpoints by success rate, among those with recorded traffic.
    pub top_performers: Vec<EndpointStats>,
    pub credentials: Vec<CredentialUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarantinedEntry {
    pub address: String,
    /// Seconds until the endpoint re-enters rotation.
    pub release_in_secs: u64,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointStats {
    pub address: String,
    pub requests: u64,
    pub successes: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialUsage {
    pub id: String,
    pub provider: String,
    pub used: u32,
    pub limit: u32,
}

impl PoolSnapshot {
    pub(crate) fn compute(
        endpoints: &[EgressEndpoint],
        credentials: &[AccessCredential],
        now: Instant,
    ) -> Self {
        let healthy = endpoints.iter().filter(|ep| ep.is_healthy()).count();

        let quarantined: Vec<QuarantinedEntry> = endpoints
            .iter()
            .filter_map(|ep| match ep.status {
                EndpointStatus::Quarantined { until } => Some(QuarantinedEntry {
                    address: ep.address.clone(),
                    release_in_secs: until.saturating_duration_since(now).as_secs(),
                    consecutive_failures: ep.consecutive_failures,
                }),
                EndpointStatus::Healthy => None,
            })
            .collect();

        let total_requests: u64 = endpoints.iter().map(|ep| ep.total_requests).sum();
        let total_successes: u64 = endpoints.iter().map(|ep| ep.total_successes).sum();
        let success_rate = if total_requests == 0 {
            0.0
        } else {
            total_successes as f64 / total_requests as f64
        };

        let mut top_performers: Vec<EndpointStats> = endpoints
            .iter()
            .filter(|ep| ep.total_requests > 0)
            .map(|ep| EndpointStats {
                address: ep.address.clone(),
                requests: ep.total_requests,
                successes: ep.total_successes,
                success_rate: ep.success_rate(),
            })
            .collect();
        top_performers.sort_by(|a, b| {
            b.success_rate
                .total_cmp(&a.success_rate)
                .then(b.requests.cmp(&a.requests))
        });
        top_performers.truncate(TOP_PERFORMERS);

        let credentials = credentials
            .iter()
            .map(|cred| CredentialUsage {
                id: cred.id.clone(),
                provider: cred.provider.clone(),
                used: cred.quota_used,
                limit: cred.quota_limit,
            })
            .collect();

        Self {
            total_endpoints: endpoints.len(),
            healthy,
            quarantined,
            total_requests,
            total_successes,
            success_rate,
            top_performers,
            credentials,
        }
    }
}
