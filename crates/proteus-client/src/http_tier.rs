use std::time::Duration;

use async_trait::async_trait;
use proteus_core::adapter::{RawContent, SourceAdapter};
use proteus_core::error::CrawlError;
use proteus_core::pool::Lease;
use reqwest::Client;

pub(crate) const DEFAULT_SEARCH_URL: &str = "https://patents.google.com/?q={query}";
const QUERY_PLACEHOLDER: &str = "{query}";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Marker phrases that identify a soft block: the target answered 200 but
/// served an interstitial instead of results.
const BLOCK_MARKERS: &[&str] = &[
    "detected unusual traffic",
    "id=\"captcha-form\"",
    "verify you are a human",
];

/// Plain HTTP fetch tier, routed through the leased endpoint.
///
/// Cheap enough to serve as the fallback behind the browser tier, and as
/// the whole ladder on builds without one. The client is rebuilt for every
/// attempt because the proxy differs per lease. Proxy credentials are
/// applied as basic auth when the leased credential carries a username;
/// otherwise the endpoint address is assumed to be self-authenticating.
#[derive(Debug, Clone)]
pub struct HttpTier {
    search_url: String,
    user_agent: String,
}

impl HttpTier {
    pub fn new() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Overrides the search URL template. The template must contain
    /// `{query}`, which is replaced with the URL-encoded query.
    pub fn with_search_url(mut self, template: impl Into<String>) -> Self {
        self.search_url = template.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn build_url(&self, query: &str) -> String {
        render_search_url(&self.search_url, query)
    }

    fn build_client(&self, lease: &Lease, timeout: Duration) -> Result<Client, CrawlError> {
        let mut proxy = reqwest::Proxy::all(lease.proxy_url()).map_err(|e| {
            CrawlError::NetworkError(format!("Invalid proxy {}: {e}", lease.address))
        })?;
        if let Some(cred) = &lease.credential
            && let Some(username) = &cred.username
        {
            proxy = proxy.basic_auth(username, &cred.key);
        }

        Client::builder()
            .user_agent(&self.user_agent)
            .timeout(timeout)
            .proxy(proxy)
            .build()
            .map_err(|e| CrawlError::NetworkError(format!("HTTP client build failed: {e}")))
    }
}

impl Default for HttpTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for HttpTier {
    fn name(&self) -> &str {
        "http"
    }

    async fn attempt(
        &self,
        query: &str,
        lease: &Lease,
        timeout: Duration,
    ) -> Result<RawContent, CrawlError> {
        let client = self.build_client(lease, timeout)?;
        let url = self.build_url(query);
        tracing::debug!(url = %url, proxy = %lease.address, "Fetching over HTTP");

        let response = client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                CrawlError::Timeout(timeout.as_secs())
            } else if e.is_connect() {
                CrawlError::NetworkError(format!("Connection failed: {e}"))
            } else {
                CrawlError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Blocked {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::NetworkError(format!("Failed to read response body: {e}")))?;

        if looks_blocked(&body) {
            return Err(CrawlError::Blocked {
                status: status.as_u16(),
            });
        }

        Ok(body)
    }
}

/// Fills `{query}` in a search URL template with the URL-encoded query.
pub(crate) fn render_search_url(template: &str, query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    template.replace(QUERY_PLACEHOLDER, &encoded)
}

/// Detects interstitial pages served with a success status.
pub(crate) fn looks_blocked(body: &str) -> bool {
    BLOCK_MARKERS.iter().any(|marker| body.contains(marker))
}
