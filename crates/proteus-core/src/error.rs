use thiserror::Error;

/// Crawl-wide error types for Proteus.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Attempt exceeded its per-attempt timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error (reset, refused, DNS).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Explicit rejection from the target (sustained non-success status).
    #[error("Blocked by target (HTTP {status})")]
    Blocked { status: u16 },

    /// Headless browser failed to launch or drive the page.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// No healthy endpoint is available in the pool.
    #[error("No healthy endpoint available")]
    PoolExhausted,

    /// Every configured credential is at its quota ceiling.
    #[error("All credentials have exhausted their quota")]
    CredentialsExhausted,

    /// The task's overall deadline passed.
    #[error("Task deadline exceeded after {0} seconds")]
    DeadlineExceeded(u64),

    /// A tier spent its whole retry budget without a success.
    #[error("Tier '{tier}' exhausted after {attempts} attempts: {last_error}")]
    TierExhausted {
        tier: String,
        attempts: u32,
        last_error: String,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl CrawlError {
    /// Returns true if this error is transient and worth retrying within a
    /// tier's budget (with a different endpoint).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CrawlError::Timeout(_)
                | CrawlError::NetworkError(_)
                | CrawlError::Blocked { .. }
                | CrawlError::BrowserError(_)
        )
    }

    /// Returns true if this error counts as a failure of the endpoint it was
    /// attempted through. Blocks count equally with transient failures:
    /// any fetch failure moves the endpoint toward quarantine.
    pub fn counts_against_endpoint(&self) -> bool {
        matches!(
            self,
            CrawlError::Timeout(_)
                | CrawlError::NetworkError(_)
                | CrawlError::Blocked { .. }
                | CrawlError::BrowserError(_)
        )
    }

    /// Returns true for pool-level exhaustion that no local retry can fix.
    /// These escalate to the caller immediately.
    pub fn is_pool_exhaustion(&self) -> bool {
        matches!(
            self,
            CrawlError::PoolExhausted | CrawlError::CredentialsExhausted
        )
    }
}
