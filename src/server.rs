//! Catalog HTTP server.
//!
//! Serves the catalog read API and the push webhook.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/projects` | Search: `q`, `tags` (comma list), `verified`, `contributors`, `sort` |
//! | `GET`  | `/projects/{slug}` | One record with its enrichment artifact and similar projects |
//! | `GET`  | `/tags` | Tag vocabulary across the catalog |
//! | `GET`  | `/index.json` | Full search index |
//! | `GET`  | `/radar` | Counts by state and city |
//! | `POST` | `/api/webhook` | Push webhook; invalidates the `projects` partition |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "project not found: ghost" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `server_config` (500), `webhook_failed` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients can
//! query the API directly.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fossradar_core::models::{EnrichmentCache, ProjectRecord, SearchIndexEntry};
use fossradar_core::radar::{aggregate, RadarSummary};
use fossradar_core::search::{available_tags, query, SearchFilters, SortMode};
use fossradar_core::similar::find_similar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::cache::{CatalogCache, CatalogSnapshot};
use crate::config::{Config, Secrets};
use crate::enrich::read_cache;
use crate::error::CatalogError;
use crate::webhook::{WebhookGate, SIGNATURE_HEADER};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    cache: Arc<CatalogCache>,
    gate: Arc<WebhookGate>,
}

/// Build the router without binding a socket.
pub fn router(config: &Config, secrets: &Secrets) -> anyhow::Result<Router> {
    if secrets.webhook_secret.is_none() {
        warn!("WEBHOOK_SECRET is not set; webhook deliveries will be refused");
    }
    let gate = WebhookGate::new(&config.webhook, secrets.webhook_secret.clone())?;
    let state = AppState {
        config: Arc::new(config.clone()),
        cache: Arc::new(CatalogCache::new(&config.catalog.records_dir)),
        gate: Arc::new(gate),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/projects", get(handle_search))
        .route("/projects/{slug}", get(handle_project))
        .route("/tags", get(handle_tags))
        .route("/index.json", get(handle_index))
        .route("/radar", get(handle_radar))
        .route(
            "/api/webhook",
            post(handle_webhook).layer(DefaultBodyLimit::max(config.webhook.max_body_bytes)),
        )
        .layer(cors)
        .with_state(state))
}

/// Starts the server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config, secrets: &Secrets) -> anyhow::Result<()> {
    let app = router(config, secrets)?;
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "catalog server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn internal(err: anyhow::Error) -> AppError {
    error!("request failed: {:#}", err);
    app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", format!("{:#}", err))
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::NotFound(_) => app_error(StatusCode::NOT_FOUND, "not_found", message),
            CatalogError::Authentication(_) => {
                app_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
            }
            CatalogError::Configuration(_) => {
                error!("{}", message);
                app_error(StatusCode::INTERNAL_SERVER_ERROR, "server_config", message)
            }
            CatalogError::WebhookPayload(_) => {
                app_error(StatusCode::INTERNAL_SERVER_ERROR, "webhook_failed", message)
            }
            _ => app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message),
        }
    }
}

fn snapshot(state: &AppState) -> Result<Arc<CatalogSnapshot>, AppError> {
    state.cache.snapshot().map_err(internal)
}

// ============ GET /health ============

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

// ============ GET /projects ============

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: Option<String>,
    /// Comma-separated; every tag must be present.
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    verified: Option<bool>,
    #[serde(default)]
    contributors: Option<bool>,
    #[serde(default)]
    sort: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    total: usize,
    results: Vec<SearchIndexEntry>,
    available_tags: Vec<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let sort = match params.sort.as_deref() {
        Some(s) => s.parse::<SortMode>().map_err(|e| bad_request(e.to_string()))?,
        None => SortMode::default(),
    };
    let filters = SearchFilters {
        verified_only: params.verified.unwrap_or(false),
        looking_for_contributors: params.contributors.unwrap_or(false),
        tags: params
            .tags
            .as_deref()
            .map(|t| {
                t.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    let snap = snapshot(&state)?;
    let results = query(
        &snap.index,
        params.q.as_deref().unwrap_or(""),
        &filters,
        sort,
        &state.config.search.params(),
    );

    Ok(Json(SearchResponse {
        total: results.len(),
        results,
        available_tags: available_tags(&snap.index),
    }))
}

// ============ GET /projects/{slug} ============

#[derive(Serialize)]
struct ProjectResponse {
    project: ProjectRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    enrichment: Option<EnrichmentCache>,
    similar: Vec<SearchIndexEntry>,
}

async fn handle_project(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProjectResponse>, AppError> {
    let snap = snapshot(&state)?;
    let record = snap.store.get_by_slug(&slug)?;

    let similar = find_similar(record, snap.store.records(), state.config.search.similar_limit)
        .into_iter()
        .map(SearchIndexEntry::from)
        .collect();

    Ok(Json(ProjectResponse {
        project: record.clone(),
        enrichment: read_cache(&state.config.catalog.cache_dir, &slug),
        similar,
    }))
}

// ============ GET /tags, /index.json, /radar ============

async fn handle_tags(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let snap = snapshot(&state)?;
    Ok(Json(available_tags(&snap.index)))
}

async fn handle_index(
    State(state): State<AppState>,
) -> Result<Json<Vec<SearchIndexEntry>>, AppError> {
    let snap = snapshot(&state)?;
    Ok(Json(snap.index.clone()))
}

async fn handle_radar(State(state): State<AppState>) -> Result<Json<RadarSummary>, AppError> {
    let snap = snapshot(&state)?;
    Ok(Json(aggregate(snap.store.records())))
}

// ============ POST /api/webhook ============

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .gate
        .handle(&body, signature, state.cache.as_ref())
        .map_err(|e| {
            warn!("webhook rejected: {}", e);
            AppError::from(e)
        })?;
    info!(?outcome, "webhook processed");

    Ok(Json(serde_json::json!({ "success": true })))
}
