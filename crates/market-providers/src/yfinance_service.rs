//! Adapter for the companion yfinance HTTP service (secondary provider).
//!
//! `POST /batch_full` answers with an array aligned to the request. Each
//! element already carries beta, 30-day volatility, RSI, moving averages and
//! an oldest-first sparkline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use market_core::{
    to_provider_format, FetchOutcome, MarketDataError, ProvidedTechnicals, ProviderFormat,
    QuoteFragment, QuoteProvider, QuoteSource,
};

use crate::health::{HealthMemo, DEFAULT_HEALTH_TTL};
use crate::wire::{flexible_f64, flexible_u64};
use crate::{batch_timeout, env_or};

pub const PROVIDER_ID: &str = "yfinance_service";

const DEFAULT_BASE_URL: &str = "http://localhost:5001";
const MAX_BATCH_SIZE: usize = 20;
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct YfinanceServiceConfig {
    pub base_url: String,
    pub health_ttl: Duration,
}

impl Default for YfinanceServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            health_ttl: DEFAULT_HEALTH_TTL,
        }
    }
}

impl YfinanceServiceConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("YFINANCE_SERVICE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            health_ttl: Duration::from_secs(env_or("PROVIDER_HEALTH_TTL_SECS", DEFAULT_HEALTH_TTL.as_secs())),
        }
    }
}

pub struct YfinanceServiceProvider {
    base_url: String,
    client: Client,
    health: HealthMemo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullQuote {
    name: Option<String>,
    sector: Option<String>,
    #[serde(default, deserialize_with = "flexible_f64")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    prev_close: Option<f64>,
    #[serde(default, deserialize_with = "flexible_u64")]
    volume: Option<u64>,
    #[serde(default, rename = "high52w", deserialize_with = "flexible_f64")]
    high_52w: Option<f64>,
    #[serde(default, rename = "low52w", deserialize_with = "flexible_f64")]
    low_52w: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    ma50: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    ma200: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    rsi: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pe: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    div_yield: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    market_cap: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    earnings_growth: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    target_price: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    beta: Option<f64>,
    #[serde(default, rename = "volatility30d", deserialize_with = "flexible_f64")]
    volatility_30d: Option<f64>,
    #[serde(default)]
    sparkline: Vec<f64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SparklineResponse {
    #[serde(default)]
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

impl YfinanceServiceProvider {
    pub fn new(config: YfinanceServiceConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            health: HealthMemo::new("yfinance service", config.health_ttl),
        }
    }

    pub fn from_env() -> Self {
        Self::new(YfinanceServiceConfig::from_env())
    }

    async fn probe(&self) -> bool {
        let request = self.client.get(format!("{}/health", self.base_url)).send();
        let response = match tokio::time::timeout(PROBE_TIMEOUT, request).await {
            Ok(Ok(response)) if response.status().is_success() => response,
            Ok(Ok(response)) => {
                tracing::warn!("yfinance service health returned HTTP {}", response.status());
                return false;
            }
            Ok(Err(e)) => {
                tracing::warn!("yfinance service unreachable: {}", e);
                return false;
            }
            Err(_) => {
                tracing::warn!("yfinance service health probe timed out");
                return false;
            }
        };

        matches!(response.json::<HealthResponse>().await, Ok(body) if body.status == "ok")
    }

    async fn request_batch(&self, symbols: &[String]) -> Result<Vec<FullQuote>, MarketDataError> {
        let wire_symbols: Vec<String> = symbols
            .iter()
            .map(|s| to_provider_format(s, ProviderFormat::Yahoo))
            .collect();

        let response = self
            .client
            .post(format!("{}/batch_full", self.base_url))
            .json(&json!({ "symbols": wire_symbols }))
            .send()
            .await
            .map_err(|e| MarketDataError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::Provider {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {status} from /batch_full"),
            });
        }

        // elements are decoded one by one so a malformed entry fails only its slot
        let raw: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| MarketDataError::InvalidResponse(e.to_string()))?;

        Ok(raw
            .into_iter()
            .map(|element| {
                serde_json::from_value(element).unwrap_or_else(|e| FullQuote {
                    error: Some(format!("unparsable element: {e}")),
                    ..FullQuote::default()
                })
            })
            .collect())
    }
}

#[async_trait]
impl QuoteProvider for YfinanceServiceProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    async fn is_available(&self) -> bool {
        self.health.check(move || self.probe()).await
    }

    async fn fetch_batch(&self, symbols: &[String]) -> Vec<FetchOutcome> {
        if symbols.is_empty() {
            return Vec::new();
        }

        let limit = batch_timeout(symbols.len());
        let result = match tokio::time::timeout(limit, self.request_batch(symbols)).await {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::Timeout(limit.as_secs())),
        };

        let elements = match result {
            Ok(elements) => elements,
            Err(e) => {
                tracing::warn!("yfinance service batch of {} failed: {}", symbols.len(), e);
                self.health.mark_unhealthy().await;
                let reason = e.to_string();
                return symbols.iter().map(|s| FetchOutcome::failed(s, reason.clone())).collect();
            }
        };

        self.health.mark_healthy().await;

        let mut elements = elements.into_iter();
        symbols
            .iter()
            .map(|symbol| match elements.next() {
                Some(element) => into_outcome(symbol, element),
                None => FetchOutcome::failed(symbol, "missing from yfinance service response"),
            })
            .collect()
    }

    async fn fetch_closes(&self, symbol: &str, days: usize) -> Result<Vec<f64>, MarketDataError> {
        let wire_symbol = to_provider_format(symbol, ProviderFormat::Yahoo);
        let request = self
            .client
            .get(format!("{}/sparkline/{}", self.base_url, wire_symbol))
            .send();

        let response = tokio::time::timeout(batch_timeout(1), request)
            .await
            .map_err(|_| MarketDataError::Timeout(batch_timeout(1).as_secs()))?
            .map_err(|e| MarketDataError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MarketDataError::Provider {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {} from /sparkline", response.status()),
            });
        }

        let body: SparklineResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::InvalidResponse(e.to_string()))?;

        Ok(body.data.into_iter().rev().take(days).collect())
    }
}

fn into_outcome(symbol: &str, quote: FullQuote) -> FetchOutcome {
    if let Some(error) = quote.error {
        return FetchOutcome::failed(symbol, format!("yfinance service: {error}"));
    }

    let price = match quote.price.filter(|p| *p > 0.0) {
        Some(price) => price,
        None => return FetchOutcome::failed(symbol, "no price from yfinance service"),
    };

    let recent_first: Vec<f64> = quote.sparkline.into_iter().rev().collect();
    let sparkline = (!recent_first.is_empty()).then(|| recent_first.clone());

    FetchOutcome::Resolved(QuoteFragment {
        name: quote.name.filter(|n| !n.is_empty()),
        sector: quote.sector.filter(|s| !s.is_empty()),
        prev_close: quote.prev_close,
        volume: quote.volume,
        high_52w: quote.high_52w,
        low_52w: quote.low_52w,
        pe: quote.pe,
        div_yield: quote.div_yield,
        market_cap: quote.market_cap,
        earnings_growth: quote.earnings_growth,
        target_price: quote.target_price,
        closes: recent_first,
        technicals: ProvidedTechnicals {
            ma50: quote.ma50,
            ma200: quote.ma200,
            rsi: quote.rsi,
            beta: quote.beta,
            volatility_30d: quote.volatility_30d,
            sparkline,
        },
        ..QuoteFragment::new(symbol, price, QuoteSource::YfinanceService)
    })
}
