//! Runtime configuration: tuning knobs from the environment and the pool
//! inventory from a JSON file.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::delay::{PacingConfig, RetryConfig};
use crate::endpoint::ProxyProtocol;
use crate::error::CrawlError;
use crate::health::HealthConfig;

/// All tuning knobs for the crawler.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Concurrent task slots.
    pub concurrency: usize,
    pub health: HealthConfig,
    pub retry: RetryConfig,
    /// Hard timeout for one adapter attempt.
    pub attempt_timeout: Duration,
    /// Overall per-task deadline across all tiers and retries.
    pub task_deadline: Duration,
    pub pacing: PacingConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            health: HealthConfig::default(),
            retry: RetryConfig::default(),
            attempt_timeout: Duration::from_secs(45),
            task_deadline: Duration::from_secs(180),
            pacing: PacingConfig::default(),
        }
    }
}

impl CrawlerConfig {
    /// Read configuration from `PROTEUS_*` environment variables.
    ///
    /// Every variable is optional; missing ones take their defaults.
    pub fn from_env() -> Result<Self, CrawlError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), but over an injected lookup so
    /// tests do not have to mutate process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CrawlError> {
        let defaults = Self::default();

        let config = Self {
            concurrency: parse_var(&lookup, "PROTEUS_CONCURRENCY", defaults.concurrency)?,
            health: HealthConfig {
                failure_threshold: parse_var(
                    &lookup,
                    "PROTEUS_QUARANTINE_THRESHOLD",
                    defaults.health.failure_threshold,
                )?,
                quarantine_duration: Duration::from_secs(parse_var(
                    &lookup,
                    "PROTEUS_QUARANTINE_SECS",
                    defaults.health.quarantine_duration.as_secs(),
                )?),
            },
            retry: RetryConfig {
                max_attempts: parse_var(
                    &lookup,
                    "PROTEUS_MAX_ATTEMPTS",
                    defaults.retry.max_attempts,
                )?,
                base: Duration::from_millis(parse_var(
                    &lookup,
                    "PROTEUS_RETRY_BASE_MS",
                    defaults.retry.base.as_millis() as u64,
                )?),
                max_wait: Duration::from_millis(parse_var(
                    &lookup,
                    "PROTEUS_RETRY_MAX_MS",
                    defaults.retry.max_wait.as_millis() as u64,
                )?),
            },
            attempt_timeout: Duration::from_secs(parse_var(
                &lookup,
                "PROTEUS_ATTEMPT_TIMEOUT_SECS",
                defaults.attempt_timeout.as_secs(),
            )?),
            task_deadline: Duration::from_secs(parse_var(
                &lookup,
                "PROTEUS_TASK_DEADLINE_SECS",
                defaults.task_deadline.as_secs(),
            )?),
            pacing: PacingConfig {
                mean: Duration::from_millis(parse_var(
                    &lookup,
                    "PROTEUS_DELAY_MEAN_MS",
                    defaults.pacing.mean.as_millis() as u64,
                )?),
                std_dev: Duration::from_millis(parse_var(
                    &lookup,
                    "PROTEUS_DELAY_STD_MS",
                    defaults.pacing.std_dev.as_millis() as u64,
                )?),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks invariants between knobs. Called by [`from_env`](Self::from_env)
    /// automatically; call it again after overriding fields by hand.
    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.concurrency == 0 {
            return Err(CrawlError::ConfigError(
                "PROTEUS_CONCURRENCY must be at least 1".into(),
            ));
        }
        if self.health.failure_threshold == 0 {
            return Err(CrawlError::ConfigError(
                "PROTEUS_QUARANTINE_THRESHOLD must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(CrawlError::ConfigError(
                "PROTEUS_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }
        if self.retry.max_wait < self.retry.base {
            return Err(CrawlError::ConfigError(
                "PROTEUS_RETRY_MAX_MS must not be smaller than PROTEUS_RETRY_BASE_MS".into(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(CrawlError::ConfigError(
                "PROTEUS_ATTEMPT_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        if self.task_deadline.is_zero() {
            return Err(CrawlError::ConfigError(
                "PROTEUS_TASK_DEADLINE_SECS must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, CrawlError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CrawlError::ConfigError(format!("Invalid {name} '{raw}'"))),
    }
}

/// Endpoint/credential inventory, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolFile {
    #[serde(default)]
    pub endpoints: Vec<EndpointDef>,
    #[serde(default)]
    pub credentials: Vec<CredentialDef>,
}

/// One endpoint entry in the pool file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDef {
    /// `host:port`, without a scheme.
    pub address: String,
    #[serde(default)]
    pub protocol: ProxyProtocol,
    /// Id of the credential this endpoint was provisioned under.
    #[serde(default)]
    pub credential: Option<String>,
}

impl EndpointDef {
    pub fn new(address: impl Into<String>, protocol: ProxyProtocol) -> Self {
        Self {
            address: address.into(),
            protocol,
            credential: None,
        }
    }
}

/// One credential entry in the pool file.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialDef {
    pub id: String,
    pub provider: String,
    #[serde(default)]
    pub username: Option<String>,
    pub key: String,
    pub quota: u32,
}

impl fmt::Debug for CredentialDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialDef")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("username", &self.username)
            .field("key", &"***")
            .field("quota", &self.quota)
            .finish()
    }
}

impl PoolFile {
    /// Loads and validates the inventory from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CrawlError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CrawlError::ConfigError(format!("Cannot read pool file {}: {e}", path.display()))
        })?;
        let file: PoolFile = serde_json::from_str(&raw).map_err(|e| {
            CrawlError::ConfigError(format!("Invalid pool file {}: {e}", path.display()))
        })?;
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.endpoints.is_empty() {
            return Err(CrawlError::ConfigError(
                "Pool file defines no endpoints".into(),
            ));
        }

        for def in &self.endpoints {
            validate_address(&def.address)?;
            if let Some(cred_id) = &def.credential
                && !self.credentials.iter().any(|c| &c.id == cred_id)
            {
                return Err(CrawlError::ConfigError(format!(
                    "Endpoint {} references unknown credential '{cred_id}'",
                    def.address
                )));
            }
        }

        for (i, cred) in self.credentials.iter().enumerate() {
            if self.credentials[..i].iter().any(|c| c.id == cred.id) {
                return Err(CrawlError::ConfigError(format!(
                    "Duplicate credential id '{}'",
                    cred.id
                )));
            }
        }

        Ok(())
    }
}

fn validate_address(address: &str) -> Result<(), CrawlError> {
    if address.contains("://") {
        return Err(CrawlError::ConfigError(format!(
            "Endpoint address '{address}' must be host:port, without a scheme"
        )));
    }
    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(CrawlError::ConfigError(format!(
            "Endpoint address '{address}' must be host:port"
        )));
    };
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(CrawlError::ConfigError(format!(
            "Endpoint address '{address}' must be host:port"
        )));
    }
    Ok(())
}
