//! Integration seam between the retry engine and concrete content sources.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CrawlError;
use crate::pool::Lease;

/// Raw page text as fetched by a source, before any record extraction.
pub type RawContent = String;

/// A strategy tier that can fetch content for a query through a leased
/// endpoint.
///
/// Implementations cover one escalation level each (plain HTTP client,
/// headless browser, ...). The retry engine owns endpoint selection, attempt
/// timeouts and backoff; an adapter only has to perform a single fetch and
/// map its transport failures onto [`CrawlError`] so the engine can tell
/// retryable attempts from fatal ones.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short tier name used in logs and reports, e.g. `"http"`.
    fn name(&self) -> &str;

    /// Per-tier override of the attempt budget. `None` means the engine's
    /// configured default applies.
    fn max_attempts(&self) -> Option<u32> {
        None
    }

    /// Performs one fetch attempt through the leased endpoint.
    ///
    /// `timeout` is the engine's per-attempt ceiling; implementations should
    /// pass it down to their transport so connections are not left dangling
    /// after the engine has already given up on the attempt.
    async fn attempt(
        &self,
        query: &str,
        lease: &Lease,
        timeout: Duration,
    ) -> Result<RawContent, CrawlError>;
}
