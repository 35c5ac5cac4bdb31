//! HTTP search server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/search?query=<text>` | Tiered product search (≤ `final_limit` results) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Response Contract
//!
//! ```json
//! { "status": true, "results": [{ "ID": "17", "Name": "Apple Juice", "Description": null, "score": 0.87 }] }
//! { "status": false, "error": "Query text is required" }
//! ```
//!
//! | Condition | Status | `error` |
//! |-----------|--------|---------|
//! | blank or missing `query` | 400 | `Query text is required` |
//! | unknown route | 404 | `Endpoint not found` |
//! | embedding/store failure, deadline expiry | 500 | `Internal server error` |
//!
//! Internal failure detail is logged, never returned.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};

use product_search_core::error::{ErrorKind, SearchError};
use product_search_core::models::ResultItem;
use product_search_core::search::TieredSearcher;

use crate::config::Config;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    searcher: Arc<TieredSearcher>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(searcher: TieredSearcher, request_timeout: Duration) -> Self {
        Self {
            searcher: Arc::new(searcher),
            request_timeout,
        }
    }
}

/// Starts the search server with collaborators built from `config`.
///
/// Binds to `[server].bind` and runs until the process receives Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let searcher = crate::search::build_searcher(config).await?;
    tracing::info!(
        final_limit = searcher.params().final_limit,
        semantic_pool = searcher.params().semantic_pool,
        "search pipeline ready"
    );
    let state = AppState::new(
        searcher,
        Duration::from_millis(config.server.request_timeout_ms),
    );
    serve(&config.server.bind, state).await
}

/// Starts the server on `bind` with an already-assembled [`AppState`].
///
/// Lets callers inject their own embedding provider and candidate store.
pub async fn serve(bind: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "search server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

/// Build the router: `/search`, `/health`, and a JSON 404 fallback.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", get(handle_search))
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    status: bool,
    error: &'static str,
}

/// Request failure, classified once into a status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Endpoint not found")]
    NotFound,

    /// Carries diagnostic detail for the log only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err.kind() {
            ErrorKind::Validation => ApiError::Validation(err.to_string()),
            ErrorKind::Internal => ApiError::Internal(err.to_string()),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => QUERY_REQUIRED,
            ApiError::NotFound => "Endpoint not found",
            ApiError::Internal(_) => "Internal server error",
        }
    }
}

const QUERY_REQUIRED: &str = "Query text is required";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(detail) => tracing::error!(error = %detail, "search request failed"),
            ApiError::Validation(reason) => tracing::debug!(%reason, "rejected search request"),
            ApiError::NotFound => {}
        }
        let body = ErrorBody {
            status: false,
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchQuery {
    query: Option<String>,
}

/// JSON response body for a successful `GET /search`.
#[derive(Serialize)]
struct SearchResponse {
    status: bool,
    results: Vec<ResultItem>,
}

/// Handler for `GET /search`.
///
/// The whole tiered search runs under the configured deadline; on expiry
/// the request fails and no partial results are returned.
async fn handle_search(
    State(state): State<AppState>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = match params {
        Ok(Query(SearchQuery { query: Some(q) })) => q,
        _ => return Err(ApiError::Validation(QUERY_REQUIRED.to_string())),
    };

    let started = Instant::now();
    let outcome = tokio::time::timeout(state.request_timeout, state.searcher.search(&query))
        .await
        .map_err(|_| {
            ApiError::Internal(format!(
                "search deadline of {} ms exceeded",
                state.request_timeout.as_millis()
            ))
        })??;

    tracing::info!(
        query = %query,
        results = outcome.hits.len(),
        exact = outcome.stats.exact,
        prefix = outcome.stats.prefix,
        substr = outcome.stats.substr,
        rest = outcome.stats.rest,
        tiers = ?outcome.stats.tiers_run,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "search served"
    );

    Ok(Json(SearchResponse {
        status: true,
        results: outcome.into_results(),
    }))
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_not_found() -> ApiError {
    ApiError::NotFound
}
