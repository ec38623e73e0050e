pub mod adapter;
pub mod clock;
pub mod config;
pub mod delay;
pub mod endpoint;
pub mod error;
mod executor;
pub mod health;
pub mod orchestrator;
pub mod pool;
mod rotation;
pub mod stats;
pub mod task;
#[cfg(test)]
pub(crate) mod testutil;

pub use adapter::{RawContent, SourceAdapter};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{CrawlerConfig, CredentialDef, EndpointDef, PoolFile};
pub use delay::{DelaySource, PacingConfig, RetryConfig};
pub use endpoint::{AccessCredential, EgressEndpoint, EndpointId, ProxyProtocol};
pub use error::CrawlError;
pub use health::HealthConfig;
pub use orchestrator::CrawlService;
pub use pool::{Lease, LeasedCredential, ProxyPool};
pub use stats::PoolSnapshot;
pub use task::{BatchReport, CrawlTask, QueryOutcome, QueryReport};
