//! Per-endpoint health tracking: a two-state circuit breaker.
//!
//! Protects the pool from burning attempts on a failing egress identity, and
//! protects the identity itself from accumulating abusive retry pressure
//! while the target is flagging it.
//!
//! # States
//!
//! ```text
//! HEALTHY --[threshold consecutive failures]--> QUARANTINED
//!    ^                                              |
//!    +----------[now >= release, lazily]-----------+
//! ```
//!
//! The Quarantined → Healthy transition is evaluated lazily, whenever the
//! endpoint is considered for selection; nothing wakes up to flip it.

use std::time::{Duration, Instant};

use crate::endpoint::{EgressEndpoint, EndpointStatus};

/// Configuration for the quarantine circuit breaker.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Consecutive failures before an endpoint is quarantined.
    pub failure_threshold: u32,

    /// How long a quarantined endpoint stays out of rotation.
    pub quarantine_duration: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            quarantine_duration: Duration::from_secs(300),
        }
    }
}

/// State change produced by recording an outcome or evaluating release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    Quarantined { until: Instant },
    Released,
}

/// Records one attempt outcome against an endpoint.
///
/// Success resets the consecutive-failure streak. Failure counts toward the
/// threshold only while Healthy: a quarantined endpoint is already out of
/// rotation, so further failures (from attempts that were in flight when it
/// tripped) update totals without re-extending the window.
pub(crate) fn record_outcome(
    endpoint: &mut EgressEndpoint,
    success: bool,
    config: &HealthConfig,
    now: Instant,
) -> Option<HealthTransition> {
    endpoint.total_requests += 1;

    if success {
        endpoint.total_successes += 1;
        endpoint.consecutive_failures = 0;
        return None;
    }

    match endpoint.status {
        EndpointStatus::Healthy => {
            endpoint.consecutive_failures += 1;
            if endpoint.consecutive_failures >= config.failure_threshold {
                let until = now + config.quarantine_duration;
                endpoint.status = EndpointStatus::Quarantined { until };
                tracing::warn!(
                    endpoint = %endpoint.address,
                    failures = endpoint.consecutive_failures,
                    quarantine_secs = config.quarantine_duration.as_secs(),
                    "Endpoint quarantined after consecutive failures"
                );
                return Some(HealthTransition::Quarantined { until });
            }
        }
        EndpointStatus::Quarantined { .. } => {}
    }

    None
}

/// Lazily releases a quarantined endpoint whose window has elapsed.
///
/// Returns the transition if one fired. The failure streak resets on
/// release: re-entry into rotation is a fresh start, not an accumulated
/// grudge.
pub(crate) fn release_if_due(
    endpoint: &mut EgressEndpoint,
    now: Instant,
) -> Option<HealthTransition> {
    if let EndpointStatus::Quarantined { until } = endpoint.status
        && now >= until
    {
        endpoint.status = EndpointStatus::Healthy;
        endpoint.consecutive_failures = 0;
        tracing::info!(
            endpoint = %endpoint.address,
            "Endpoint released from quarantine"
        );
        return Some(HealthTransition::Released);
    }
    None
}
