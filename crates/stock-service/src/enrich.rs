//! Turns provider fragments into complete quote records.

use chrono::Utc;

use market_core::directory::{self, DEFAULT_SECTOR};
use market_core::{detect_market, QuoteFragment, QuoteRecord, QuoteSource};
use technical_analysis::{IndicatorConfig, TechnicalSnapshot};

/// Build a full record. Provider technicals win; the rest come from `closes`.
pub fn build_record(fragment: QuoteFragment, benchmark: Option<&[f64]>, config: &IndicatorConfig) -> QuoteRecord {
    let info = detect_market(&fragment.symbol);
    let known = directory::lookup(&fragment.symbol);
    let technicals =
        TechnicalSnapshot::compute_with(&fragment.closes, &fragment.technicals, benchmark, config);

    let price = fragment.price;
    let prev_close = fragment.prev_close.filter(|p| *p > 0.0).unwrap_or(price);
    let change = price - prev_close;
    let change_pct = if prev_close > 0.0 { change / prev_close * 100.0 } else { 0.0 };

    let high_52w = fragment
        .high_52w
        .filter(|v| *v > 0.0)
        .unwrap_or(technicals.high_52w);
    let low_52w = fragment
        .low_52w
        .filter(|v| *v > 0.0)
        .unwrap_or(technicals.low_52w);

    QuoteRecord {
        name: fragment
            .name
            .or_else(|| known.map(|e| e.name.to_string()))
            .unwrap_or_else(|| fragment.symbol.clone()),
        sector: fragment
            .sector
            .or_else(|| known.map(|e| e.sector.to_string()))
            .unwrap_or_else(|| DEFAULT_SECTOR.to_string()),
        symbol: fragment.symbol,
        market: info.market,
        currency: info.currency,
        price,
        prev_close,
        change: round4(change),
        change_pct: round4(change_pct),
        high_52w,
        low_52w,
        ma50: technicals.ma50,
        ma200: technicals.ma200,
        rsi: technicals.rsi,
        volume: fragment.volume,
        pe: fragment.pe,
        div_yield: fragment.div_yield,
        market_cap: fragment.market_cap,
        earnings_growth: fragment.earnings_growth,
        target_price: fragment.target_price,
        beta: technicals.beta,
        volatility_30d: technicals.volatility_30d,
        vol_category: technicals.vol_category,
        sparkline: technicals.sparkline,
        source: fragment.source,
        updated_at: Utc::now(),
    }
}

/// Placeholder for a symbol no provider could price (`price == 0`).
pub fn fallback_record(symbol: &str, config: &IndicatorConfig) -> QuoteRecord {
    let info = detect_market(symbol);
    let known = directory::lookup(symbol);
    let neutral = TechnicalSnapshot::neutral(config);

    QuoteRecord {
        symbol: symbol.to_string(),
        name: known.map_or_else(|| symbol.to_string(), |e| e.name.to_string()),
        sector: known.map_or(DEFAULT_SECTOR, |e| e.sector).to_string(),
        market: info.market,
        currency: info.currency,
        price: 0.0,
        prev_close: 0.0,
        change: 0.0,
        change_pct: 0.0,
        high_52w: neutral.high_52w,
        low_52w: neutral.low_52w,
        ma50: neutral.ma50,
        ma200: neutral.ma200,
        rsi: neutral.rsi,
        volume: None,
        pe: None,
        div_yield: None,
        market_cap: None,
        earnings_growth: None,
        target_price: None,
        beta: neutral.beta,
        volatility_30d: neutral.volatility_30d,
        vol_category: neutral.vol_category,
        sparkline: neutral.sparkline,
        source: QuoteSource::Fallback,
        updated_at: Utc::now(),
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
