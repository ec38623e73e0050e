use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use proteus_core::CrawlError;

use crate::auth::require_api_token;
use crate::dto::{
    HealthResponse, PoolStatusResponse, QueryResult, SearchRequest, SearchResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Most queries one request may submit. Larger batches belong in the CLI,
/// where nothing holds a connection open for the whole run.
pub const MAX_BATCH_QUERIES: usize = 50;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/search", post(search))
        .route("/v1/pool", get(pool_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Batch finished; per-query outcomes in the body", body = SearchResponse),
        (status = 400, description = "Bad request", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "No healthy endpoint available", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "search"
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.queries.is_empty() {
        return Err(ApiError::Validation("queries must not be empty".to_string()));
    }
    if body.queries.len() > MAX_BATCH_QUERIES {
        return Err(ApiError::Validation(format!(
            "Batch too large: {} queries (max {MAX_BATCH_QUERIES})",
            body.queries.len()
        )));
    }

    // Refuse up front rather than pacing through a batch of doomed tasks.
    if state.service.snapshot().healthy == 0 {
        return Err(CrawlError::PoolExhausted.into());
    }

    let batch = state.service.run_batch(body.queries).await;

    let response = SearchResponse {
        batch_id: batch.batch_id,
        started_at: batch.started_at,
        finished_at: batch.finished_at,
        total: batch.total,
        succeeded: batch.succeeded,
        failed: batch.failed,
        results: batch.reports.into_iter().map(QueryResult::from).collect(),
        pool: PoolStatusResponse::from(state.service.snapshot()),
    };

    Ok(axum::Json(response))
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/pool",
    responses(
        (status = 200, description = "Current pool snapshot", body = PoolStatusResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "pool"
)]
pub async fn pool_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(PoolStatusResponse::from(state.service.snapshot()))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Whole pool is quarantined", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.service.snapshot();
    let degraded = snapshot.total_endpoints > 0 && snapshot.healthy == 0;

    let status = if degraded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let response = HealthResponse {
        status: if degraded { "degraded" } else { "healthy" },
        version: env!("CARGO_PKG_VERSION"),
        total_endpoints: snapshot.total_endpoints,
        healthy_endpoints: snapshot.healthy,
    };

    (status, axum::Json(response))
}
