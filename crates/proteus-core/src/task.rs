//! Crawl tasks and the reports the service produces for them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::adapter::RawContent;

/// One query to resolve, as accepted by the crawl service.
#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub id: Uuid,
    pub query: String,
    pub created_at: DateTime<Utc>,
}

impl CrawlTask {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            created_at: Utc::now(),
        }
    }
}

/// Terminal result of one query after the tier ladder has run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Success {
        /// Tier that produced the content.
        tier: String,
        /// Attempts spent inside that tier.
        attempts: u32,
        /// Fetched page text. Not included in serialized reports.
        #[serde(skip)]
        content: RawContent,
    },
    Failed {
        error: String,
        /// Tier names tried before giving up, in order.
        tiers_tried: Vec<String>,
    },
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Success { .. })
    }

    /// Name of the tier that served the query, if one did.
    pub fn tier_used(&self) -> Option<&str> {
        match self {
            QueryOutcome::Success { tier, .. } => Some(tier),
            QueryOutcome::Failed { .. } => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            QueryOutcome::Success { content, .. } => Some(content),
            QueryOutcome::Failed { .. } => None,
        }
    }
}

/// Outcome of one query plus identifiers and timing.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub task_id: Uuid,
    pub query: String,
    #[serde(flatten)]
    pub outcome: QueryOutcome,
    pub elapsed_ms: u64,
}

/// Summary of one batch run. `reports` is in submission order regardless of
/// which query finished first.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Correlation id for this batch in logs and downstream reports.
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub reports: Vec<QueryReport>,
}

impl BatchReport {
    pub(crate) fn collect(started_at: DateTime<Utc>, reports: Vec<QueryReport>) -> Self {
        let succeeded = reports.iter().filter(|r| r.outcome.is_success()).count();
        Self {
            batch_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            total: reports.len(),
            succeeded,
            failed: reports.len() - succeeded,
            reports,
        }
    }

    /// Fraction of queries that succeeded; 0.0 for an empty batch.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64
    }
}
