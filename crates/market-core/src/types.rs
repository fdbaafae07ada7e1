use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::symbols::{Currency, Market};

/// Coarse volatility bucket shown next to a holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolCategory {
    High,
    Medium,
    Low,
}

/// Where a quote record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    TwelveData,
    YfinanceService,
    Fallback,
}

/// Enriched quote for one symbol, as returned to dashboard callers.
///
/// `price == 0.0` marks a symbol that no provider could resolve. Technical
/// fields at 0 (`ma50`, `ma200`, `high52w`, `low52w`) mean "unavailable".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub market: Market,
    pub currency: Currency,
    pub price: f64,
    pub prev_close: f64,
    pub change: f64,
    pub change_pct: f64,
    #[serde(rename = "high52w")]
    pub high_52w: f64,
    #[serde(rename = "low52w")]
    pub low_52w: f64,
    pub ma50: f64,
    pub ma200: f64,
    pub rsi: f64,
    pub volume: Option<u64>,
    pub pe: Option<f64>,
    pub div_yield: Option<f64>,
    pub market_cap: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub target_price: Option<f64>,
    pub beta: f64,
    #[serde(rename = "volatility30d")]
    pub volatility_30d: f64,
    pub vol_category: VolCategory,
    /// Recent closes, most-recent-first.
    pub sparkline: Vec<f64>,
    pub source: QuoteSource,
    pub updated_at: DateTime<Utc>,
}

impl QuoteRecord {
    pub fn is_resolved(&self) -> bool {
        self.price > 0.0
    }
}

/// Technicals a provider computed upstream; used in preference to local computation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvidedTechnicals {
    pub ma50: Option<f64>,
    pub ma200: Option<f64>,
    pub rsi: Option<f64>,
    pub beta: Option<f64>,
    pub volatility_30d: Option<f64>,
    /// Most-recent-first.
    pub sparkline: Option<Vec<f64>>,
}

/// Raw per-symbol data parsed out of a provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteFragment {
    /// Canonical symbol the caller asked for.
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub price: f64,
    pub prev_close: Option<f64>,
    pub volume: Option<u64>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
    pub pe: Option<f64>,
    pub div_yield: Option<f64>,
    pub market_cap: Option<f64>,
    pub earnings_growth: Option<f64>,
    pub target_price: Option<f64>,
    /// Daily closes, most-recent-first.
    pub closes: Vec<f64>,
    pub technicals: ProvidedTechnicals,
    pub source: QuoteSource,
}

impl QuoteFragment {
    pub fn new(symbol: impl Into<String>, price: f64, source: QuoteSource) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            sector: None,
            price,
            prev_close: None,
            volume: None,
            high_52w: None,
            low_52w: None,
            pe: None,
            div_yield: None,
            market_cap: None,
            earnings_growth: None,
            target_price: None,
            closes: Vec::new(),
            technicals: ProvidedTechnicals::default(),
            source,
        }
    }
}

/// Per-symbol result of an adapter batch call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Resolved(QuoteFragment),
    Failed { symbol: String, reason: String },
}

impl FetchOutcome {
    pub fn failed(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        FetchOutcome::Failed {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            FetchOutcome::Resolved(fragment) => &fragment.symbol,
            FetchOutcome::Failed { symbol, .. } => symbol,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, FetchOutcome::Resolved(_))
    }
}

/// Single-symbol identity lookup used when enriching holdings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLookup {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub market: Market,
    pub currency: Currency,
    pub price: f64,
}

/// Quotes-only projection consumed by the price-alert checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub live_entries: usize,
}
