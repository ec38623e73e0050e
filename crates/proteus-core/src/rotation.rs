//! Rotation policy: pure selection over healthy candidates.
//!
//! Endpoint choice prefers the least-recently-used healthy endpoint and
//! never repeats the immediately preceding selection while an alternative
//! exists. Credential choice is an independent round-robin over credentials
//! with remaining quota.

use std::cmp::Ordering;

use crate::endpoint::{AccessCredential, EgressEndpoint, EndpointId};

/// Outcome of an endpoint selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pick {
    Fresh(EndpointId),
    /// The previous endpoint was reused because it is the sole healthy one.
    Repeated(EndpointId),
}

impl Pick {
    pub(crate) fn endpoint_id(&self) -> EndpointId {
        match self {
            Pick::Fresh(id) | Pick::Repeated(id) => *id,
        }
    }
}

/// Selects the next endpoint from the healthy candidates.
///
/// The endpoint used by the immediately preceding selection is excluded,
/// unless it is the only healthy endpoint left, in which case it is repeated
/// and the caller logs a warning. Among eligible candidates the oldest
/// `last_used` wins (never-used first); ties break toward the highest
/// success rate.
pub(crate) fn pick_endpoint(
    healthy: &[&EgressEndpoint],
    previous: Option<EndpointId>,
) -> Option<Pick> {
    let eligible: Vec<&&EgressEndpoint> = healthy
        .iter()
        .filter(|ep| previous != Some(ep.id))
        .collect();

    if eligible.is_empty() {
        // Either the pool has no healthy endpoint at all, or the only one
        // left is the previous pick.
        return healthy.first().map(|ep| Pick::Repeated(ep.id));
    }

    eligible
        .into_iter()
        .min_by(|a, b| {
            cmp_last_used(a, b).then_with(|| {
                b.success_rate()
                    .partial_cmp(&a.success_rate())
                    .unwrap_or(Ordering::Equal)
            })
        })
        .map(|ep| Pick::Fresh(ep.id))
}

/// Never-used sorts before any used timestamp; otherwise oldest first.
pub(crate) fn cmp_last_used(a: &EgressEndpoint, b: &EgressEndpoint) -> Ordering {
    match (a.last_used, b.last_used) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

/// Round-robin pick of the next credential with remaining quota, starting at
/// `cursor`. Returns the credential's index; the caller stores `index + 1` as
/// the next cursor.
pub(crate) fn pick_credential(credentials: &[AccessCredential], cursor: usize) -> Option<usize> {
    if credentials.is_empty() {
        return None;
    }
    (0..credentials.len())
        .map(|i| (cursor + i) % credentials.len())
        .find(|&idx| credentials[idx].has_quota())
}
