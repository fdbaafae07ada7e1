//! Static name/sector tables for commonly held US and Taiwan symbols.
//!
//! Used to keep unpriced symbols identifiable when every provider is down.

use crate::symbols::{canonicalize, Market};

pub const DEFAULT_SECTOR: &str = "Other";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub symbol: &'static str,
    pub name: &'static str,
    pub sector: &'static str,
}

const US_STOCKS: &[(&str, &str, &str)] = &[
    ("AAPL", "Apple Inc.", "Technology"),
    ("MSFT", "Microsoft Corporation", "Technology"),
    ("NVDA", "NVIDIA Corporation", "Technology"),
    ("AMD", "Advanced Micro Devices, Inc.", "Technology"),
    ("INTC", "Intel Corporation", "Technology"),
    ("AVGO", "Broadcom Inc.", "Technology"),
    ("GOOGL", "Alphabet Inc.", "Communication Services"),
    ("META", "Meta Platforms, Inc.", "Communication Services"),
    ("NFLX", "Netflix, Inc.", "Communication Services"),
    ("AMZN", "Amazon.com, Inc.", "Consumer Discretionary"),
    ("TSLA", "Tesla, Inc.", "Consumer Discretionary"),
    ("JPM", "JPMorgan Chase & Co.", "Financials"),
    ("V", "Visa Inc.", "Financials"),
    ("BRK.B", "Berkshire Hathaway Inc.", "Financials"),
    ("UNH", "UnitedHealth Group Incorporated", "Healthcare"),
    ("JNJ", "Johnson & Johnson", "Healthcare"),
    ("LLY", "Eli Lilly and Company", "Healthcare"),
    ("XOM", "Exxon Mobil Corporation", "Energy"),
    ("PG", "The Procter & Gamble Company", "Consumer Staples"),
    ("KO", "The Coca-Cola Company", "Consumer Staples"),
    ("HD", "The Home Depot, Inc.", "Consumer Discretionary"),
    ("TSM", "Taiwan Semiconductor Manufacturing (ADR)", "Technology"),
    ("SPY", "SPDR S&P 500 ETF Trust", "ETF"),
    ("QQQ", "Invesco QQQ Trust", "ETF"),
    ("VOO", "Vanguard S&P 500 ETF", "ETF"),
    ("VTI", "Vanguard Total Stock Market ETF", "ETF"),
];

const TW_STOCKS: &[(&str, &str, &str)] = &[
    ("2330.TW", "Taiwan Semiconductor Manufacturing", "Semiconductors"),
    ("2303.TW", "United Microelectronics", "Semiconductors"),
    ("2454.TW", "MediaTek", "Semiconductors"),
    ("3711.TW", "ASE Technology Holding", "Semiconductors"),
    ("2317.TW", "Hon Hai Precision Industry", "Electronics"),
    ("2308.TW", "Delta Electronics", "Electronics"),
    ("2382.TW", "Quanta Computer", "Electronics"),
    ("2357.TW", "ASUSTeK Computer", "Electronics"),
    ("3008.TW", "Largan Precision", "Electronics"),
    ("2412.TW", "Chunghwa Telecom", "Telecommunications"),
    ("2881.TW", "Fubon Financial Holding", "Financials"),
    ("2882.TW", "Cathay Financial Holding", "Financials"),
    ("2891.TW", "CTBC Financial Holding", "Financials"),
    ("2886.TW", "Mega Financial Holding", "Financials"),
    ("1301.TW", "Formosa Plastics", "Materials"),
    ("2002.TW", "China Steel", "Materials"),
    ("2603.TW", "Evergreen Marine", "Shipping"),
    ("2609.TW", "Yang Ming Marine Transport", "Shipping"),
    ("0050.TW", "Yuanta Taiwan Top 50 ETF", "ETF"),
    ("0056.TW", "Yuanta Taiwan High Dividend ETF", "ETF"),
    ("00878.TW", "Cathay Sustainable High Dividend ETF", "ETF"),
    ("006208.TW", "Fubon Taiwan 50 ETF", "ETF"),
    ("6488.TWO", "GlobalWafers", "Semiconductors"),
];

/// Find a symbol in the static tables. Accepts any notation.
pub fn lookup(symbol: &str) -> Option<DirectoryEntry> {
    let canonical = canonicalize(symbol);
    US_STOCKS
        .iter()
        .chain(TW_STOCKS.iter())
        .find(|(s, _, _)| *s == canonical)
        .map(|&(symbol, name, sector)| DirectoryEntry { symbol, name, sector })
}

/// Reference index used for beta in each market.
pub fn benchmark_symbol(market: Market) -> &'static str {
    match market {
        Market::Us => "SPY",
        Market::Taiwan => "0050.TW",
    }
}
