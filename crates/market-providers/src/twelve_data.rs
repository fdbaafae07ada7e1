//! Twelve Data REST adapter (primary provider).
//!
//! One batch issues `/quote` and `/time_series` for the whole chunk in
//! parallel. With a single symbol Twelve Data answers with a bare object; with
//! several it answers with a map keyed by the requested symbol.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use market_core::{
    to_provider_format, FetchOutcome, MarketDataError, ProviderFormat, QuoteFragment,
    QuoteProvider, QuoteSource,
};

use crate::health::{HealthMemo, DEFAULT_HEALTH_TTL};
use crate::rate_limiter::RateLimiter;
use crate::wire::{flexible_f64, flexible_u64};
use crate::{batch_timeout, env_or};

pub const PROVIDER_ID: &str = "twelve_data";

const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";
const DEFAULT_RATE_LIMIT: usize = 8;
const MAX_BATCH_SIZE: usize = 8;
/// Enough daily bars for a 52-week range and the 200-day average.
const HISTORY_BARS: usize = 260;

#[derive(Debug, Clone)]
pub struct TwelveDataConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// API credits per `rate_window`. Every symbol in a `/quote` or
    /// `/time_series` call costs one credit.
    pub rate_limit: usize,
    pub rate_window: Duration,
    /// Fixed network deadline; `None` scales with the batch size.
    pub request_timeout: Option<Duration>,
    pub health_ttl: Duration,
}

impl Default for TwelveDataConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window: Duration::from_secs(60),
            request_timeout: None,
            health_ttl: DEFAULT_HEALTH_TTL,
        }
    }
}

impl TwelveDataConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("TWELVE_DATA_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("TWELVE_DATA_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            rate_limit: env_or("TWELVE_DATA_RATE_LIMIT", DEFAULT_RATE_LIMIT),
            rate_window: Duration::from_secs(60),
            request_timeout: None,
            health_ttl: Duration::from_secs(env_or("PROVIDER_HEALTH_TTL_SECS", DEFAULT_HEALTH_TTL.as_secs())),
        }
    }
}

pub struct TwelveDataProvider {
    config: TwelveDataConfig,
    client: Client,
    rate_limiter: RateLimiter,
    health: HealthMemo,
}

/// Error object Twelve Data embeds in a 200 response.
#[derive(Debug, Clone, PartialEq)]
struct ApiError {
    code: Option<i64>,
    message: String,
}

impl ApiError {
    /// Quota or credential problems affect every symbol, not just one.
    fn is_account_level(&self) -> bool {
        matches!(self.code, Some(401) | Some(403) | Some(429))
    }
}

#[derive(Debug, Deserialize)]
struct QuotePayload {
    name: Option<String>,
    #[serde(default, deserialize_with = "flexible_f64")]
    close: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    previous_close: Option<f64>,
    #[serde(default, deserialize_with = "flexible_u64")]
    volume: Option<u64>,
    fifty_two_week: Option<RangePayload>,
}

#[derive(Debug, Deserialize)]
struct RangePayload {
    #[serde(default, deserialize_with = "flexible_f64")]
    high: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    low: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SeriesPayload {
    #[serde(default)]
    values: Vec<BarPayload>,
}

#[derive(Debug, Deserialize)]
struct BarPayload {
    #[serde(default, deserialize_with = "flexible_f64")]
    close: Option<f64>,
}

impl TwelveDataProvider {
    pub fn new(config: TwelveDataConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            rate_limiter: RateLimiter::new(config.rate_limit, config.rate_window),
            health: HealthMemo::new("Twelve Data", config.health_ttl),
            config,
            client,
        }
    }

    pub fn from_env() -> Self {
        Self::new(TwelveDataConfig::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Network deadline for a call covering `symbols` symbols. Credit waits
    /// happen before it starts.
    fn request_timeout(&self, symbols: usize) -> Duration {
        self.config.request_timeout.unwrap_or_else(|| batch_timeout(symbols))
    }

    fn api_key(&self) -> Result<&str, MarketDataError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| MarketDataError::Unconfigured("TWELVE_DATA_API_KEY is not set".to_string()))
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, MarketDataError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apikey", api_key)])
            .send()
            .await
            .map_err(|e| MarketDataError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::Provider {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {status} from /{path}"),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| MarketDataError::InvalidResponse(e.to_string()))
    }

    async fn request_batch(&self, symbols: &[String]) -> Result<Vec<FetchOutcome>, MarketDataError> {
        let provider_symbols: Vec<String> = symbols
            .iter()
            .map(|s| to_provider_format(s, ProviderFormat::TwelveData))
            .collect();
        let joined = provider_symbols.join(",");

        let quote_params = [("symbol", joined.clone())];
        let series_params = [
            ("symbol", joined),
            ("interval", "1day".to_string()),
            ("outputsize", HISTORY_BARS.to_string()),
        ];

        let (quotes, series) = tokio::join!(
            self.get_json("quote", &quote_params),
            self.get_json("time_series", &series_params),
        );

        let quotes = match split_by_symbol(quotes?, &provider_symbols) {
            Ok(map) => map,
            Err(err) => {
                if err.is_account_level() {
                    self.health.mark_unhealthy().await;
                }
                let reason = format!("Twelve Data: {}", err.message);
                return Ok(symbols.iter().map(|s| FetchOutcome::failed(s, reason.clone())).collect());
            }
        };

        let mut series = match series.map(|payload| split_by_symbol(payload, &provider_symbols)) {
            Ok(Ok(map)) => map,
            Ok(Err(err)) => {
                tracing::debug!("Twelve Data time_series unavailable: {}", err.message);
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!("Twelve Data time_series request failed: {}", e);
                HashMap::new()
            }
        };

        let mut account_error = false;
        let outcomes = symbols
            .iter()
            .zip(provider_symbols.iter())
            .map(|(canonical, provider_symbol)| {
                let closes = series.remove(provider_symbol).map(parse_closes).unwrap_or_default();
                match quotes.get(provider_symbol) {
                    Some(element) => {
                        let outcome = parse_quote(canonical, element, closes);
                        if let Some(err) = api_error(element) {
                            account_error |= err.is_account_level();
                        }
                        outcome
                    }
                    None => FetchOutcome::failed(canonical, "missing from Twelve Data response"),
                }
            })
            .collect();

        if account_error {
            self.health.mark_unhealthy().await;
        } else {
            self.health.mark_healthy().await;
        }
        Ok(outcomes)
    }
}

#[async_trait]
impl QuoteProvider for TwelveDataProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    /// A batch spends two credits per symbol, so it must fit in one window.
    fn max_batch_size(&self) -> usize {
        (self.rate_limiter.budget() / 2).clamp(1, MAX_BATCH_SIZE)
    }

    async fn is_available(&self) -> bool {
        self.is_configured() && !self.health.is_tripped().await
    }

    async fn fetch_batch(&self, symbols: &[String]) -> Vec<FetchOutcome> {
        if symbols.is_empty() {
            return Vec::new();
        }

        if let Err(e) = self.api_key() {
            let reason = e.to_string();
            return symbols.iter().map(|s| FetchOutcome::failed(s, reason.clone())).collect();
        }

        // quote + time_series, one credit per symbol each
        self.rate_limiter.acquire_n(2 * symbols.len()).await;

        let limit = self.request_timeout(symbols.len());
        let result = match tokio::time::timeout(limit, self.request_batch(symbols)).await {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::Timeout(limit.as_secs())),
        };

        match result {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::warn!("Twelve Data batch of {} failed: {}", symbols.len(), e);
                self.health.mark_unhealthy().await;
                let reason = e.to_string();
                symbols.iter().map(|s| FetchOutcome::failed(s, reason.clone())).collect()
            }
        }
    }

    async fn fetch_closes(&self, symbol: &str, days: usize) -> Result<Vec<f64>, MarketDataError> {
        let provider_symbol = to_provider_format(symbol, ProviderFormat::TwelveData);
        let params = [
            ("symbol", provider_symbol),
            ("interval", "1day".to_string()),
            ("outputsize", days.to_string()),
        ];

        self.api_key()?;
        self.rate_limiter.acquire_n(1).await;

        let limit = self.request_timeout(1);
        let payload = tokio::time::timeout(limit, self.get_json("time_series", &params))
            .await
            .map_err(|_| MarketDataError::Timeout(limit.as_secs()))??;

        if let Some(err) = api_error(&payload) {
            return Err(MarketDataError::Provider {
                provider: PROVIDER_ID.to_string(),
                message: err.message,
            });
        }
        Ok(parse_closes(payload))
    }
}

fn api_error(value: &Value) -> Option<ApiError> {
    let is_error = value.get("status").and_then(Value::as_str) == Some("error")
        || value.get("code").and_then(Value::as_i64).is_some_and(|c| c >= 400);
    if !is_error {
        return None;
    }

    Some(ApiError {
        code: value.get("code").and_then(Value::as_i64),
        message: value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    })
}

/// Key a response by provider symbol, normalizing the single-object shape.
fn split_by_symbol(payload: Value, provider_symbols: &[String]) -> Result<HashMap<String, Value>, ApiError> {
    if let Some(err) = api_error(&payload) {
        return Err(err);
    }

    match (provider_symbols, payload) {
        ([only], payload) => Ok(HashMap::from([(only.clone(), payload)])),
        (_, Value::Object(map)) => Ok(map.into_iter().collect()),
        (_, other) => Err(ApiError {
            code: None,
            message: format!("unexpected payload shape: {}", type_name(&other)),
        }),
    }
}

fn parse_quote(canonical: &str, element: &Value, closes: Vec<f64>) -> FetchOutcome {
    if let Some(err) = api_error(element) {
        return FetchOutcome::failed(canonical, format!("Twelve Data: {}", err.message));
    }

    let quote: QuotePayload = match serde_json::from_value(element.clone()) {
        Ok(quote) => quote,
        Err(e) => return FetchOutcome::failed(canonical, format!("unparsable quote: {e}")),
    };

    let price = match quote.close.filter(|p| *p > 0.0) {
        Some(price) => price,
        None => return FetchOutcome::failed(canonical, "no price in Twelve Data quote"),
    };

    let (high_52w, low_52w) = quote
        .fifty_two_week
        .map(|range| (range.high, range.low))
        .unwrap_or((None, None));

    FetchOutcome::Resolved(QuoteFragment {
        name: quote.name.filter(|n| !n.is_empty()),
        prev_close: quote.previous_close,
        volume: quote.volume,
        high_52w,
        low_52w,
        closes,
        ..QuoteFragment::new(canonical, price, QuoteSource::TwelveData)
    })
}

/// Closes, most-recent-first as Twelve Data returns them. Errors yield no history.
fn parse_closes(element: Value) -> Vec<f64> {
    if api_error(&element).is_some() {
        return Vec::new();
    }
    serde_json::from_value::<SeriesPayload>(element)
        .map(|series| series.values.into_iter().filter_map(|bar| bar.close).collect())
        .unwrap_or_default()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
