//! Operator endpoints: cache inspection, forced refresh, flush and the
//! manual scheduler trigger.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use market_core::{CacheStats, QuoteRecord};

use crate::quote_routes::SymbolsRequest;
use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Removed {
    removed: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Flushed {
    written: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Triggered {
    started: bool,
}

pub fn cache_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/refresh", post(force_refresh))
        .route("/api/cache/flush", post(flush))
        .route("/api/cache/clear", post(clear))
        .route("/api/scheduler/run", post(run_scheduler))
}

async fn cache_stats(State(state): State<AppState>) -> Json<ApiResponse<CacheStats>> {
    Json(ApiResponse::success(state.service.cache_stats()))
}

async fn force_refresh(
    State(state): State<AppState>,
    Json(request): Json<SymbolsRequest>,
) -> Result<Json<ApiResponse<Vec<QuoteRecord>>>, AppError> {
    let symbols = request.checked()?;
    tracing::info!("Forced refresh of {} symbols", symbols.len());
    Ok(Json(ApiResponse::success(state.service.force_refresh(&symbols).await)))
}

async fn flush(State(state): State<AppState>) -> Result<Json<ApiResponse<Flushed>>, AppError> {
    let written = state.service.flush().await?;
    Ok(Json(ApiResponse::success(Flushed { written })))
}

/// With a `symbol` drops that entry; with no body (or no symbol) empties the cache.
async fn clear(
    State(state): State<AppState>,
    request: Option<Json<ClearRequest>>,
) -> Json<ApiResponse<Removed>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let removed = match request.symbol.filter(|s| !s.trim().is_empty()) {
        Some(symbol) => state.service.invalidate(&[symbol]),
        None => state.service.clear_cache(),
    };
    Json(ApiResponse::success(Removed { removed }))
}

async fn run_scheduler(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<Triggered>>) {
    if state.scheduler.trigger() {
        (StatusCode::ACCEPTED, Json(ApiResponse::success(Triggered { started: true })))
    } else {
        (
            StatusCode::CONFLICT,
            Json(ApiResponse {
                success: false,
                data: Some(Triggered { started: false }),
                error: Some("A refresh is already running".to_string()),
            }),
        )
    }
}
