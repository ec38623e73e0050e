use proteus_core::CrawlService;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    /// Crawl service over the shared endpoint pool. Cloning it shares state,
    /// so concurrent requests drain the same quotas and health counters.
    pub service: CrawlService,
    /// Bearer token required on the `/v1` routes.
    pub api_token: String,
}
