//! Indicators over daily closes ordered most-recent-first.
//!
//! Every function accepts any slice, including empty ones, and never panics.
//! The `try_*` variants return `None` when history is too short so callers
//! can substitute their own neutral value; the plain variants substitute the
//! defaults from [`IndicatorConfig::default`].

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use market_core::VolCategory;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const MIN_VOLATILITY_SAMPLES: usize = 5;
const MIN_BETA_PAIRS: usize = 10;

/// Periods, neutral defaults and category thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub ma_short_period: usize,
    pub ma_long_period: usize,
    pub rsi_period: usize,
    pub volatility_days: usize,
    pub beta_days: usize,
    pub sparkline_len: usize,
    pub range_52w_days: usize,
    pub neutral_rsi: f64,
    pub neutral_beta: f64,
    pub neutral_volatility: f64,
    pub high_vol_threshold: f64,
    pub medium_vol_threshold: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_short_period: 50,
            ma_long_period: 200,
            rsi_period: 14,
            volatility_days: 30,
            beta_days: 60,
            sparkline_len: 20,
            range_52w_days: 252,
            neutral_rsi: 50.0,
            neutral_beta: 1.0,
            neutral_volatility: 20.0,
            high_vol_threshold: 35.0,
            medium_vol_threshold: 20.0,
        }
    }
}

impl IndicatorConfig {
    pub fn categorize(&self, volatility: f64) -> VolCategory {
        if volatility >= self.high_vol_threshold {
            VolCategory::High
        } else if volatility >= self.medium_vol_threshold {
            VolCategory::Medium
        } else {
            VolCategory::Low
        }
    }
}

/// Mean of the most recent `period` closes.
pub fn try_moving_average(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    Some(closes[..period].iter().sum::<f64>() / period as f64)
}

/// Simple moving average; 0 when history is shorter than `period`.
pub fn moving_average(closes: &[f64], period: usize) -> f64 {
    try_moving_average(closes, period).unwrap_or(0.0)
}

/// Relative Strength Index over the first `period` deltas.
///
/// `None` with fewer than `period + 1` closes. All-gain windows give 100.
pub fn try_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let (gains, losses) = closes
        .windows(2)
        .take(period)
        .map(|pair| pair[0] - pair[1])
        .fold((0.0, 0.0), |(gains, losses), delta| {
            if delta > 0.0 {
                (gains + delta, losses)
            } else {
                (gains, losses - delta)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    if rsi.is_finite() {
        Some(rsi.clamp(0.0, 100.0))
    } else {
        None
    }
}

pub fn rsi(closes: &[f64], period: usize) -> f64 {
    try_rsi(closes, period).unwrap_or(IndicatorConfig::default().neutral_rsi)
}

/// Annualized volatility of log returns, in percent.
///
/// Uses up to `days` returns; pairs with a non-positive or non-finite price
/// are skipped. `None` with fewer than five usable returns.
pub fn try_volatility(closes: &[f64], days: usize) -> Option<f64> {
    let returns: Vec<f64> = closes
        .windows(2)
        .take(days)
        .filter(|pair| is_usable_price(pair[0]) && is_usable_price(pair[1]))
        .map(|pair| (pair[0] / pair[1]).ln())
        .collect();

    if returns.len() < MIN_VOLATILITY_SAMPLES {
        return None;
    }

    let std_dev = returns.as_slice().std_dev();
    let annualized = std_dev * TRADING_DAYS_PER_YEAR.sqrt() * 100.0;
    annualized.is_finite().then_some(annualized)
}

pub fn volatility(closes: &[f64], days: usize) -> f64 {
    try_volatility(closes, days).unwrap_or(IndicatorConfig::default().neutral_volatility)
}

/// Beta of a symbol against a benchmark from paired simple daily returns.
///
/// Both series are most-recent-first and paired by position. `None` with fewer
/// than ten pairs or a flat benchmark.
pub fn try_beta(closes: &[f64], benchmark: &[f64], days: usize) -> Option<f64> {
    let (returns, benchmark_returns): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .zip(benchmark.windows(2))
        .take(days)
        .filter(|(a, b)| a.iter().chain(b.iter()).all(|&p| is_usable_price(p)))
        .map(|(a, b)| (a[0] / a[1] - 1.0, b[0] / b[1] - 1.0))
        .unzip();

    if returns.len() < MIN_BETA_PAIRS {
        return None;
    }

    let variance = benchmark_returns.as_slice().variance();
    if !variance.is_finite() || variance == 0.0 {
        return None;
    }

    let covariance = returns.as_slice().covariance(benchmark_returns.as_slice());
    let beta = covariance / variance;
    beta.is_finite().then_some(beta)
}

pub fn beta(closes: &[f64], benchmark: &[f64], days: usize) -> f64 {
    try_beta(closes, benchmark, days).unwrap_or(IndicatorConfig::default().neutral_beta)
}

/// Bucket a volatility percentage: >=35 high, >=20 medium, else low.
pub fn volatility_category(volatility: f64) -> VolCategory {
    IndicatorConfig::default().categorize(volatility)
}

/// Highest and lowest close inside the window; `None` for an empty window.
pub fn try_range(closes: &[f64], days: usize) -> Option<(f64, f64)> {
    closes
        .iter()
        .take(days)
        .copied()
        .filter(|&p| is_usable_price(p))
        .fold(None, |acc, p| match acc {
            None => Some((p, p)),
            Some((high, low)) => Some((high.max(p), low.min(p))),
        })
}

fn is_usable_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}
