use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use proteus_client::extract_records;
use proteus_core::{PoolSnapshot, QueryOutcome, QueryReport};

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SearchRequest {
    /// Queries to resolve, one crawl task each
    pub queries: Vec<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SearchResponse {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<QueryResult>,
    pub pool: PoolStatusResponse,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QueryResult {
    pub task_id: Uuid,
    pub query: String,
    pub status: String,
    pub tier: Option<String>,
    pub attempts: Option<u32>,
    pub records: Option<RecordSet>,
    pub error: Option<String>,
    pub tiers_tried: Option<Vec<String>>,
    pub elapsed_ms: u64,
}

/// Publication numbers extracted from a successful fetch.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RecordSet {
    pub wo: Vec<String>,
    pub br: Vec<String>,
}

impl From<QueryReport> for QueryResult {
    fn from(report: QueryReport) -> Self {
        match report.outcome {
            QueryOutcome::Success {
                tier,
                attempts,
                content,
            } => {
                let records = extract_records(&content);
                Self {
                    task_id: report.task_id,
                    query: report.query,
                    status: "success".to_string(),
                    tier: Some(tier),
                    attempts: Some(attempts),
                    records: Some(RecordSet {
                        wo: records.wo,
                        br: records.br,
                    }),
                    error: None,
                    tiers_tried: None,
                    elapsed_ms: report.elapsed_ms,
                }
            }
            QueryOutcome::Failed { error, tiers_tried } => Self {
                task_id: report.task_id,
                query: report.query,
                status: "failed".to_string(),
                tier: None,
                attempts: None,
                records: None,
                error: Some(error),
                tiers_tried: Some(tiers_tried),
                elapsed_ms: report.elapsed_ms,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PoolStatusResponse {
    pub total_endpoints: usize,
    pub healthy: usize,
    pub quarantined: Vec<QuarantinedEndpoint>,
    pub total_requests: u64,
    pub total_successes: u64,
    pub success_rate: f64,
    pub top_performers: Vec<EndpointPerformance>,
    pub credentials: Vec<CredentialQuota>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuarantinedEndpoint {
    pub address: String,
    pub release_in_secs: u64,
    pub consecutive_failures: u32,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EndpointPerformance {
    pub address: String,
    pub requests: u64,
    pub successes: u64,
    pub success_rate: f64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CredentialQuota {
    pub id: String,
    pub provider: String,
    pub used: u32,
    pub limit: u32,
}

impl From<PoolSnapshot> for PoolStatusResponse {
    fn from(snapshot: PoolSnapshot) -> Self {
        Self {
            total_endpoints: snapshot.total_endpoints,
            healthy: snapshot.healthy,
            quarantined: snapshot
                .quarantined
                .into_iter()
                .map(|q| QuarantinedEndpoint {
                    address: q.address,
                    release_in_secs: q.release_in_secs,
                    consecutive_failures: q.consecutive_failures,
                })
                .collect(),
            total_requests: snapshot.total_requests,
            total_successes: snapshot.total_successes,
            success_rate: snapshot.success_rate,
            top_performers: snapshot
                .top_performers
                .into_iter()
                .map(|ep| EndpointPerformance {
                    address: ep.address,
                    requests: ep.requests,
                    successes: ep.successes,
                    success_rate: ep.success_rate,
                })
                .collect(),
            credentials: snapshot
                .credentials
                .into_iter()
                .map(|cred| CredentialQuota {
                    id: cred.id,
                    provider: cred.provider,
                    used: cred.used,
                    limit: cred.limit,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub total_endpoints: usize,
    pub healthy_endpoints: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
