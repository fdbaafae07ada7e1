//! Ticker notation handling across providers and markets.
//!
//! The canonical form is the only cache key in the system: US tickers are bare
//! (`AAPL`, `BRK.B`), Taiwan tickers always carry `.TW` (TWSE listed) or `.TWO`
//! (TPEx over-the-counter). Provider qualifiers such as `2330:TWSE` or
//! `NASDAQ:AAPL` are stripped.

use serde::{Deserialize, Serialize};

const TW_LISTED_SUFFIX: &str = ".TW";
const TW_OTC_SUFFIX: &str = ".TWO";

/// Exchange qualifiers that may appear on either side of a `:`.
const EXCHANGE_QUALIFIERS: &[&str] = &[
    "TWSE", "TPE", "TPEX", "TWO", "NASDAQ", "NYSE", "AMEX", "ARCA", "BATS", "NYSEARCA", "OTC",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "TW")]
    Taiwan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Twd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub market: Market,
    pub currency: Currency,
}

/// Symbol notation expected by an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFormat {
    /// `2330:TWSE`, `6488:TPEX`, `BRK.B`
    TwelveData,
    /// `2330.TW`, `6488.TWO`, `BRK-B`
    Yahoo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaiwanBoard {
    Listed,
    Otc,
}

/// Canonicalize any ticker notation. Never fails; `canonicalize(canonicalize(x)) == canonicalize(x)`.
pub fn canonicalize(raw: &str) -> String {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return String::new();
    }

    let (base, qualifier) = split_qualifier(&upper);

    let (code, board) = if let Some(code) = base.strip_suffix(TW_OTC_SUFFIX) {
        (code, Some(TaiwanBoard::Otc))
    } else if let Some(code) = base.strip_suffix(TW_LISTED_SUFFIX) {
        (code, Some(TaiwanBoard::Listed))
    } else {
        match qualifier {
            Some("TPEX") | Some("TWO") => (base, Some(TaiwanBoard::Otc)),
            Some("TWSE") | Some("TPE") => (base, Some(TaiwanBoard::Listed)),
            _ if is_taiwan_code(base) => (base, Some(TaiwanBoard::Listed)),
            _ => (base, None),
        }
    };

    match board {
        Some(TaiwanBoard::Listed) => format!("{code}{TW_LISTED_SUFFIX}"),
        Some(TaiwanBoard::Otc) => format!("{code}{TW_OTC_SUFFIX}"),
        None => code.replace('-', "."),
    }
}

/// Render a canonical symbol in the notation a provider expects.
pub fn to_provider_format(symbol: &str, format: ProviderFormat) -> String {
    let canonical = canonicalize(symbol);
    let board = taiwan_board(&canonical);

    match (format, board) {
        (ProviderFormat::TwelveData, Some((code, TaiwanBoard::Listed))) => format!("{code}:TWSE"),
        (ProviderFormat::TwelveData, Some((code, TaiwanBoard::Otc))) => format!("{code}:TPEX"),
        (ProviderFormat::TwelveData, None) => canonical,
        (ProviderFormat::Yahoo, Some(_)) => canonical,
        (ProviderFormat::Yahoo, None) => canonical.replace('.', "-"),
    }
}

pub fn detect_market(symbol: &str) -> MarketInfo {
    if taiwan_board(&canonicalize(symbol)).is_some() {
        MarketInfo {
            market: Market::Taiwan,
            currency: Currency::Twd,
        }
    } else {
        MarketInfo {
            market: Market::Us,
            currency: Currency::Usd,
        }
    }
}

fn split_qualifier(symbol: &str) -> (&str, Option<&str>) {
    match symbol.split_once(':') {
        Some((left, right)) if EXCHANGE_QUALIFIERS.contains(&left) => {
            (right.split(':').next().unwrap_or(right), Some(left))
        }
        Some((left, right)) => (left, Some(right)),
        None => (symbol, None),
    }
}

fn taiwan_board(canonical: &str) -> Option<(&str, TaiwanBoard)> {
    if let Some(code) = canonical.strip_suffix(TW_OTC_SUFFIX) {
        Some((code, TaiwanBoard::Otc))
    } else {
        canonical
            .strip_suffix(TW_LISTED_SUFFIX)
            .map(|code| (code, TaiwanBoard::Listed))
    }
}

fn is_taiwan_code(code: &str) -> bool {
    (4..=6).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_digit())
}
