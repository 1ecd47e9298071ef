//! Thin axum HTTP shell over `Searcher`/`UrlTracker`. Grounded on
//! `server/mod.rs`/`server/routes.rs`/`server/handlers/api.rs`'s
//! `AppState` + `Router` + handler-fn shape. The original's subprocess-
//! per-request design (`api_main.py` shelling out to `run_search.py`) is
//! explicitly replaced per spec §9 DESIGN NOTES: the handler calls
//! `Searcher` in-process.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::search::Searcher;
use crate::url_tracker::UrlTracker;

#[derive(Clone)]
pub struct AppState {
    pub searcher: Searcher,
    pub tracker: UrlTracker,
    pub default_search_limit: usize,
    pub max_search_limit: usize,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Bind and serve. Blocks until the listener is closed.
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr: SocketAddr = addr.parse()?;
    tracing::info!(%addr, "starting search API");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
    limit: Option<usize>,
    skip: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    urls: Vec<String>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// `GET /search?q=<str>&limit=<int>&skip=<int>` — matches the spec's
/// external HTTP query API exactly: `{"urls": [...], "count": N}`,
/// clamping `limit` into `[1, MAX_SEARCH_LIMIT]`.
async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let limit = params
        .limit
        .unwrap_or(state.default_search_limit)
        .clamp(1, state.max_search_limit.max(1));
    let skip = params.skip.unwrap_or(0);

    match state.searcher.search(&params.q, limit, skip).await {
        Ok(hits) => {
            let urls: Vec<String> = hits.into_iter().map(|h| h.url).collect();
            let count = urls.len();
            (StatusCode::OK, Json(SearchResponse { urls, count })).into_response()
        }
        Err(e) => {
            error!(error = %e, "search request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// `GET /stats` — the crawl-queue stats payload, shared with the CLI's
/// `stats` subcommand rather than duplicated (an ambient addition per
/// SPEC_FULL §6: a thin read endpoint over an already-specified value).
async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.tracker.stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => {
            error!(error = %e, "stats request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
