use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Index of an endpoint within the fixed-size pool.
///
/// The pool never grows or shrinks after initialization, so a plain index is
/// a stable identifier for the whole process lifetime.
pub type EndpointId = usize;

/// Proxy protocol spoken by an egress endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Socks5,
}

impl ProxyProtocol {
    /// URL scheme used when handing the endpoint to an HTTP client.
    pub fn scheme(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Socks5 => "socks5",
        }
    }
}

impl Default for ProxyProtocol {
    fn default() -> Self {
        ProxyProtocol::Http
    }
}

impl fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scheme())
    }
}

impl FromStr for ProxyProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(ProxyProtocol::Http),
            "socks5" => Ok(ProxyProtocol::Socks5),
            _ => Err(format!("Unknown proxy protocol: {}", s)),
        }
    }
}

/// Lifecycle state of an endpoint.
///
/// The release instant exists only while Quarantined; the transition back to
/// Healthy is evaluated lazily whenever the endpoint is considered for
/// selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    Healthy,
    Quarantined { until: Instant },
}

impl EndpointStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, EndpointStatus::Healthy)
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointStatus::Healthy => write!(f, "healthy"),
            EndpointStatus::Quarantined { .. } => write!(f, "quarantined"),
        }
    }
}

/// One egress identity (proxy) in the pool, with its live health state.
#[derive(Debug, Clone)]
pub struct EgressEndpoint {
    pub id: EndpointId,
    /// `host:port`, without a scheme.
    pub address: String,
    pub protocol: ProxyProtocol,
    /// Id of the credential this endpoint was provisioned under, if any.
    /// Provenance metadata only; selection rotates credentials
    /// independently.
    pub credential: Option<String>,
    pub status: EndpointStatus,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_successes: u64,
    pub last_used: Option<Instant>,
}

impl EgressEndpoint {
    pub fn new(
        id: EndpointId,
        address: impl Into<String>,
        protocol: ProxyProtocol,
        credential: Option<String>,
    ) -> Self {
        Self {
            id,
            address: address.into(),
            protocol,
            credential,
            status: EndpointStatus::Healthy,
            consecutive_failures: 0,
            total_requests: 0,
            total_successes: 0,
            last_used: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }

    /// Historical success rate. An endpoint with no recorded requests scores
    /// 1.0 so that unseen endpoints are preferred over known-flaky ones.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.total_successes as f64 / self.total_requests as f64
        }
    }

    /// Full proxy URL, e.g. `socks5://10.0.0.1:1080`.
    pub fn proxy_url(&self) -> String {
        format!("{}://{}", self.protocol.scheme(), self.address)
    }
}

/// One provider credential (API key) with quota accounting.
///
/// `Debug` redacts the key: credentials routinely end up in logs via
/// structured fields, and the secret must never travel with them.
#[derive(Clone)]
pub struct AccessCredential {
    pub id: String,
    pub provider: String,
    /// Username for proxy basic auth, when the provider requires it.
    pub username: Option<String>,
    pub key: String,
    pub quota_limit: u32,
    pub quota_used: u32,
    pub last_used: Option<Instant>,
}

impl AccessCredential {
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        username: Option<String>,
        key: impl Into<String>,
        quota_limit: u32,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            username,
            key: key.into(),
            quota_limit,
            quota_used: 0,
            last_used: None,
        }
    }

    pub fn has_quota(&self) -> bool {
        self.quota_used < self.quota_limit
    }

    pub fn remaining_quota(&self) -> u32 {
        self.quota_limit.saturating_sub(self.quota_used)
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredential")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("username", &self.username)
            .field("key", &"***")
            .field("quota_used", &self.quota_used)
            .field("quota_limit", &self.quota_limit)
            .finish()
    }
}
