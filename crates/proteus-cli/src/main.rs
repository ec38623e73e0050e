use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use proteus_client::{HttpTier, extract_records};
use proteus_core::adapter::SourceAdapter;
use proteus_core::config::{CrawlerConfig, PoolFile};
use proteus_core::task::QueryOutcome;
use proteus_core::{CrawlService, HealthConfig, ProxyPool};

#[derive(Parser)]
#[command(name = "proteus", version, about = "Resilient patent crawler with rotating egress")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run queries through the tier ladder and print results as JSON
    Search {
        /// Queries to resolve (alternatively use --queries-file)
        queries: Vec<String>,

        /// File with one query per line; blank lines and #-comments skipped
        #[arg(long)]
        queries_file: Option<PathBuf>,

        /// Path to the endpoint pool definition
        #[arg(short, long, env = "PROTEUS_POOL_FILE", default_value = "pool.json")]
        pool: PathBuf,

        /// Lead with the headless-browser tier, falling back to plain HTTP
        #[arg(long, default_value_t = false)]
        browser: bool,

        /// Override the configured number of concurrent tasks
        #[arg(long)]
        concurrency: Option<usize>,

        /// Search URL template; {query} is replaced with the encoded query
        #[arg(long, env = "PROTEUS_SEARCH_URL")]
        search_url: Option<String>,
    },

    /// Validate a pool definition and print its statistics snapshot
    Pool {
        /// Path to the endpoint pool definition
        #[arg(short, long, env = "PROTEUS_POOL_FILE", default_value = "pool.json")]
        pool: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing; logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("proteus=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            queries,
            queries_file,
            pool,
            browser,
            concurrency,
            search_url,
        } => {
            cmd_search(queries, queries_file, &pool, browser, concurrency, search_url).await?;
        }
        Commands::Pool { pool } => {
            cmd_pool(&pool)?;
        }
    }

    Ok(())
}

async fn cmd_search(
    queries: Vec<String>,
    queries_file: Option<PathBuf>,
    pool_path: &Path,
    browser: bool,
    concurrency: Option<usize>,
    search_url: Option<String>,
) -> Result<()> {
    // 1. Collect queries from args and/or file
    let queries = collect_queries(queries, queries_file.as_deref())?;
    if queries.is_empty() {
        bail!("No queries given. Pass them as arguments or via --queries-file.");
    }

    // 2. Crawler configuration from the environment, with CLI overrides
    let mut config = CrawlerConfig::from_env().context("Invalid crawler configuration")?;
    if let Some(n) = concurrency {
        config.concurrency = n;
    }
    config.validate().context("Invalid crawler configuration")?;

    // 3. Endpoint pool from the pool file
    let file = PoolFile::load(pool_path)
        .with_context(|| format!("Failed to load pool file {}", pool_path.display()))?;
    file.validate().context("Invalid pool file")?;
    tracing::info!(
        endpoints = file.endpoints.len(),
        credentials = file.credentials.len(),
        "Pool loaded"
    );
    let pool = ProxyPool::new(file.endpoints, file.credentials, config.health.clone());

    // 4. Tier ladder: browser leads when enabled, HTTP is the fallback
    let mut tiers: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    if browser {
        add_browser_tier(&mut tiers, search_url.as_deref())?;
    }
    let mut http = HttpTier::new();
    if let Some(template) = search_url.as_deref() {
        http = http.with_search_url(template);
    }
    tiers.push(Arc::new(http));

    // 5. Run the batch
    let service = CrawlService::new(pool, config, tiers);
    tracing::info!(queries = queries.len(), "Starting batch");
    let batch = service.run_batch(queries).await;

    // 6. Results as JSON on stdout, records extracted per successful query
    let results: Vec<serde_json::Value> = batch
        .reports
        .iter()
        .map(|report| match &report.outcome {
            QueryOutcome::Success {
                tier,
                attempts,
                content,
            } => {
                let records = extract_records(content);
                serde_json::json!({
                    "query": report.query,
                    "status": "success",
                    "tier": tier,
                    "attempts": attempts,
                    "elapsed_ms": report.elapsed_ms,
                    "records": { "wo": records.wo, "br": records.br },
                })
            }
            QueryOutcome::Failed { error, tiers_tried } => serde_json::json!({
                "query": report.query,
                "status": "failed",
                "error": error,
                "tiers_tried": tiers_tried,
                "elapsed_ms": report.elapsed_ms,
            }),
        })
        .collect();

    let output = serde_json::json!({
        "batch_id": batch.batch_id,
        "started_at": batch.started_at,
        "total": batch.total,
        "succeeded": batch.succeeded,
        "failed": batch.failed,
        "results": results,
        "pool": service.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if batch.succeeded == 0 {
        bail!("All {} queries failed", batch.total);
    }
    Ok(())
}

fn cmd_pool(pool_path: &Path) -> Result<()> {
    let file = PoolFile::load(pool_path)
        .with_context(|| format!("Failed to load pool file {}", pool_path.display()))?;
    file.validate().context("Invalid pool file")?;

    let pool = ProxyPool::new(file.endpoints, file.credentials, HealthConfig::default());
    println!("{}", serde_json::to_string_pretty(&pool.snapshot())?);
    Ok(())
}

/// Merge queries passed on the command line with those from a file.
fn collect_queries(mut queries: Vec<String>, file: Option<&Path>) -> Result<Vec<String>> {
    if let Some(path) = file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read queries file {}", path.display()))?;
        queries.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(queries)
}

#[cfg(feature = "browser")]
fn add_browser_tier(
    tiers: &mut Vec<Arc<dyn SourceAdapter>>,
    search_url: Option<&str>,
) -> Result<()> {
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
) -> Result<()> {
    bail!("This build has no browser support; rebuild with `--features browser`")
}
