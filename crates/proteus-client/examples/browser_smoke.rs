//! Manual smoke check for the browser tier.
//!
//! Launches headless Chromium through a proxy of your choice and prints what
//! came back. Needs a Chromium binary on the machine and a reachable proxy:
//!
//! ```text
//! cargo run -p proteus-client --features browser --example browser_smoke -- \
//!     127.0.0.1:8888 "solid state battery"
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use proteus_client::{BrowserTier, extract_records};
use proteus_core::adapter::SourceAdapter;
use proteus_core::endpoint::ProxyProtocol;
use proteus_core::pool::Lease;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proteus=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let address = args
        .next()
        .context("usage: browser_smoke <proxy-address> [query]")?;
    let query = args.next().unwrap_or_else(|| "lithium battery".to_string());

    let lease = Lease {
        endpoint_id: 0,
        address,
        protocol: ProxyProtocol::Http,
        credential: None,
    };

    let tier = BrowserTier::new();
    let html = tier
        .attempt(&query, &lease, Duration::from_secs(45))
        .await
        .context("browser fetch failed")?;

    let records = extract_records(&html);
    println!("fetched {} bytes", html.len());
    println!("WO numbers: {:?}", records.wo);
    println!("BR numbers: {:?}", records.br);
    Ok(())
}
