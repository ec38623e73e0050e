use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use proteus_core::adapter::{RawContent, SourceAdapter};
use proteus_core::error::CrawlError;
use proteus_core::pool::Lease;

use crate::http_tier::{DEFAULT_SEARCH_URL, looks_blocked, render_search_url};

const DEFAULT_BROWSER_ATTEMPTS: u32 = 2;

/// Escalation tier: fetches through headless Chromium so JavaScript-rendered
/// results and script-based challenges resolve the way they would for a real
/// visitor.
///
/// Chromium pins its proxy at process start, so every attempt launches a
/// fresh browser pointed at that attempt's leased endpoint and tears it down
/// afterwards. That makes attempts expensive; the tier caps its own budget at
/// two instead of inheriting the engine default.
pub struct BrowserTier {
    search_url: String,
    max_attempts: Option<u32>,
}

impl BrowserTier {
    pub fn new() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            max_attempts: Some(DEFAULT_BROWSER_ATTEMPTS),
        }
    }

    /// Overrides the search URL template. The template must contain
    /// `{query}`, which is replaced with the URL-encoded query.
    pub fn with_search_url(mut self, template: impl Into<String>) -> Self {
        self.search_url = template.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    fn browser_config(&self, lease: &Lease) -> Result<BrowserConfig, CrawlError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();

        // Snap-packaged Chromium rejects standard Chrome CLI flags through
        // its wrapper; prefer the real binary when we can find one and let
        // chromiumoxide do its own lookup otherwise.
        if let Some(bin) = find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .arg(format!("--proxy-server={}", lease.proxy_url()))
            .build()
            .map_err(|e| CrawlError::BrowserError(format!("Browser config error: {e}")))
    }
}

impl Default for BrowserTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for BrowserTier {
    fn name(&self) -> &str {
        "browser"
    }

    fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    async fn attempt(
        &self,
        query: &str,
        lease: &Lease,
        timeout: Duration,
    ) -> Result<RawContent, CrawlError> {
        if lease.credential.is_some() {
            // Chromium takes no proxy credentials on the command line.
            tracing::debug!(
                endpoint = %lease.address,
                "Proxy credential not usable by the browser tier"
            );
        }

        let config = self.browser_config(lease)?;
        let url = render_search_url(&self.search_url, query);
        tracing::debug!(url = %url, proxy = %lease.address, "Fetching over headless browser");

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let result = tokio::time::timeout(timeout, fetch_rendered(&browser, &url)).await;

        let _ = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();

        match result {
            Ok(Ok(html)) if looks_blocked(&html) => Err(CrawlError::Blocked { status: 200 }),
            Ok(inner) => inner,
            Err(_) => Err(CrawlError::Timeout(timeout.as_secs())),
        }
    }
}

async fn fetch_rendered(browser: &Browser, url: &str) -> Result<RawContent, CrawlError> {
    // Open a tab, navigate, and wait for a minimal render signal before
    // reading the DOM back out.
    let page = browser
        .new_page(url)
        .await
        .map_err(|e| CrawlError::BrowserError(format!("Failed to navigate to {url}: {e}")))?;

    page.find_element("body")
        .await
        .map_err(|e| CrawlError::BrowserError(format!("Page did not render body: {e}")))?;

    let html = page
        .content()
        .await
        .map_err(|e| CrawlError::BrowserError(format!("Failed to read page content: {e}")))?;

    let _ = page.close().await;
    Ok(html)
}

/// Tries to locate the real Chrome/Chromium binary.
///
/// On systems where Chromium is installed via snap, the wrapper at
/// `/snap/bin/chromium` strips unknown CLI flags, breaking headless mode.
/// An explicit `CHROME_BIN` override wins; otherwise well-known install
/// locations are probed in order.
fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    let candidates: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];
    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}
