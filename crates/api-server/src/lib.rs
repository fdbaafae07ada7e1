//! HTTP surface over the quote service: collaborator reads plus the
//! operator endpoints for the cache and the daily refresh.

mod cache_routes;
mod quote_routes;
mod request_id;
mod tracked;


use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use market_core::CacheStats;
use stock_service::scheduler::spawn_flush_loop;
use stock_service::{QuoteCache, RefreshScheduler, SchedulerConfig, ServiceConfig, SqliteQuoteStore, StockService};

pub use request_id::RequestId;
pub use tracked::SqlTrackedSymbols;

/// Most symbols accepted in one request body.
pub const MAX_SYMBOLS_PER_REQUEST: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<StockService>,
    pub scheduler: Arc<RefreshScheduler>,
}

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler error rendered as the JSON envelope.
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {}", self.message);
        }
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{:#}", err.into()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthStatus {
    status: &'static str,
    cache: CacheStats,
    refresh_running: bool,
}

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        cache: state.service.cache_stats(),
        refresh_running: state.scheduler.is_running(),
    }))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(quote_routes::quote_routes())
        .merge(cache_routes::cache_routes())
        .layer(TraceLayer::new_for_http().make_span_with(request_id::make_span))
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServiceConfig::from_env()?;
    tracing::info!("Starting market data service");

    let store = SqliteQuoteStore::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open quote store at {}", config.database_url))?;
    let tracked = SqlTrackedSymbols::new(store.pool().clone());
    tracked.init_tables().await?;

    let cache = Arc::new(QuoteCache::new(config.quote_ttl, config.rehydrated_ttl));
    let providers = market_providers::provider_chain_from_env();
    let service = Arc::new(StockService::new(providers, cache, &config).with_store(Arc::new(store)));
    service.load_from_store().await;

    let scheduler = Arc::new(RefreshScheduler::new(
        service.clone(),
        Arc::new(tracked),
        SchedulerConfig::from(&config),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let daily = scheduler.spawn_daily(shutdown_rx.clone());
    let flusher = spawn_flush_loop(service.clone(), config.flush_interval, shutdown_rx);

    let host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("API_PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .context("API_PORT must be a port number")?;
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid bind address {host}:{port}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    let state = AppState {
        service: service.clone(),
        scheduler,
    };
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_tx.send(true).ok();
    let _ = tokio::join!(daily, flusher);
    service.shutdown().await;
    tracing::info!("Market data service stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!("Could not install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received Ctrl-C");
    }
}
