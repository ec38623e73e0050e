use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use proteus_client::HttpTier;
use proteus_core::{CrawlService, CrawlerConfig, PoolFile, ProxyPool, SourceAdapter};
use proteus_server::routes;
use proteus_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("proteus=info".parse()?))
        .with_target(false)
        .init();

    let api_token = std::env::var("PROTEUS_API_TOKEN").expect("PROTEUS_API_TOKEN must be set");
    let port = std::env::var("PROTEUS_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let config = CrawlerConfig::from_env().context("Invalid crawler configuration")?;

    let pool_path =
        std::env::var("PROTEUS_POOL_FILE").unwrap_or_else(|_| "pool.json".to_string());
    let file = PoolFile::load(&pool_path)
        .with_context(|| format!("Failed to load pool file {pool_path}"))?;
    file.validate().context("Invalid pool file")?;
    tracing::info!(
        endpoints = file.endpoints.len(),
        credentials = file.credentials.len(),
        "Pool loaded"
    );
    let pool = ProxyPool::new(file.endpoints, file.credentials, config.health.clone());

    let search_url = std::env::var("PROTEUS_SEARCH_URL").ok();
    let mut tiers: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    if env_flag("PROTEUS_BROWSER") {
        add_browser_tier(&mut tiers, search_url.as_deref())?;
    }
    let mut http = HttpTier::new();
    if let Some(template) = search_url.as_deref() {
        http = http.with_search_url(template);
    }
    tiers.push(Arc::new(http));

    let service = CrawlService::new(pool, config, tiers);
    let state = Arc::new(AppState { service, api_token });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(feature = "browser")]
fn add_browser_tier(
    tiers: &mut Vec<Arc<dyn SourceAdapter>>,
    search_url: Option<&str>,
) -> anyhow::Result<()> {
    let mut tier = proteus_client::BrowserTier::new();
    if let Some(template) = search_url {
        tier = tier.with_search_url(template);
    }
    tiers.push(Arc::new(tier));
    Ok(())
}

#[cfg(not(feature = "browser"))]
fn add_browser_tier(
    _tiers: &mut Vec<Arc<dyn SourceAdapter>>,
    _search_url: Option<&str>,
) -> anyhow::Result<()> {
    anyhow::bail!("This build has no browser support; rebuild with `--features browser`")
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    tracing::info!("Shutdown signal received");
}
