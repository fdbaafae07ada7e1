//! Quote reads used by the portfolio, watchlist and alert features.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use market_core::{PriceQuote, QuoteRecord, StockLookup};

use crate::{ApiResponse, AppError, AppState, MAX_SYMBOLS_PER_REQUEST};

#[derive(Debug, Deserialize)]
pub struct SymbolsRequest {
    pub symbols: Vec<String>,
}

impl SymbolsRequest {
    /// Reject oversized bodies before they reach the providers.
    pub fn checked(self) -> Result<Vec<String>, AppError> {
        if self.symbols.len() > MAX_SYMBOLS_PER_REQUEST {
            return Err(AppError::bad_request(format!(
                "At most {} symbols per request, got {}",
                MAX_SYMBOLS_PER_REQUEST,
                self.symbols.len()
            )));
        }
        Ok(self.symbols)
    }
}

pub fn quote_routes() -> Router<AppState> {
    Router::new()
        .route("/api/quotes/batch", post(batch_full_data))
        .route("/api/quotes/prices", post(batch_prices))
        .route("/api/quotes/:symbol", get(lookup_stock))
}

async fn batch_full_data(
    State(state): State<AppState>,
    Json(request): Json<SymbolsRequest>,
) -> Result<Json<ApiResponse<Vec<QuoteRecord>>>, AppError> {
    let symbols = request.checked()?;
    let records = state.service.batch_get_full_data(&symbols).await;
    Ok(Json(ApiResponse::success(records)))
}

async fn batch_prices(
    State(state): State<AppState>,
    Json(request): Json<SymbolsRequest>,
) -> Result<Json<ApiResponse<Vec<PriceQuote>>>, AppError> {
    let symbols = request.checked()?;
    let quotes = state.service.batch_get_quotes(&symbols).await;
    Ok(Json(ApiResponse::success(quotes)))
}

async fn lookup_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<StockLookup>>, AppError> {
    if symbol.trim().is_empty() {
        return Err(AppError::bad_request("Symbol is required"));
    }
    Ok(Json(ApiResponse::success(state.service.lookup_stock(&symbol).await)))
}
