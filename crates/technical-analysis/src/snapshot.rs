use serde::{Deserialize, Serialize};

use market_core::{ProvidedTechnicals, VolCategory};

use crate::indicators::{
    try_beta, try_moving_average, try_range, try_rsi, try_volatility, IndicatorConfig,
};

/// Every technical field of a quote record, computed in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalSnapshot {
    pub ma50: f64,
    pub ma200: f64,
    pub rsi: f64,
    pub beta: f64,
    #[serde(rename = "volatility30d")]
    pub volatility_30d: f64,
    pub vol_category: VolCategory,
    #[serde(rename = "high52w")]
    pub high_52w: f64,
    #[serde(rename = "low52w")]
    pub low_52w: f64,
    /// Most-recent-first.
    pub sparkline: Vec<f64>,
}

impl TechnicalSnapshot {
    /// Values used when nothing is known about a symbol.
    pub fn neutral(config: &IndicatorConfig) -> Self {
        Self {
            ma50: 0.0,
            ma200: 0.0,
            rsi: config.neutral_rsi,
            beta: config.neutral_beta,
            volatility_30d: config.neutral_volatility,
            vol_category: config.categorize(config.neutral_volatility),
            high_52w: 0.0,
            low_52w: 0.0,
            sparkline: Vec::new(),
        }
    }

    pub fn compute(closes: &[f64], benchmark: Option<&[f64]>, config: &IndicatorConfig) -> Self {
        Self::compute_with(closes, &ProvidedTechnicals::default(), benchmark, config)
    }

    /// Like [`compute`](Self::compute), but values a provider already computed
    /// win over local ones. Beta is only computed when not provided.
    pub fn compute_with(
        closes: &[f64],
        provided: &ProvidedTechnicals,
        benchmark: Option<&[f64]>,
        config: &IndicatorConfig,
    ) -> Self {
        let ma50 = provided
            .ma50
            .filter(|v| v.is_finite() && *v > 0.0)
            .or_else(|| try_moving_average(closes, config.ma_short_period))
            .unwrap_or(0.0);
        let ma200 = provided
            .ma200
            .filter(|v| v.is_finite() && *v > 0.0)
            .or_else(|| try_moving_average(closes, config.ma_long_period))
            .unwrap_or(0.0);

        let rsi = provided
            .rsi
            .filter(|v| v.is_finite())
            .or_else(|| try_rsi(closes, config.rsi_period))
            .unwrap_or(config.neutral_rsi)
            .clamp(0.0, 100.0);

        let volatility_30d = provided
            .volatility_30d
            .filter(|v| v.is_finite() && *v >= 0.0)
            .or_else(|| try_volatility(closes, config.volatility_days))
            .unwrap_or(config.neutral_volatility);

        let beta = provided
            .beta
            .filter(|v| v.is_finite())
            .or_else(|| benchmark.and_then(|b| try_beta(closes, b, config.beta_days)))
            .unwrap_or(config.neutral_beta);

        let (high_52w, low_52w) = try_range(closes, config.range_52w_days).unwrap_or((0.0, 0.0));

        let sparkline = match &provided.sparkline {
            Some(points) if !points.is_empty() => points.iter().take(config.sparkline_len).copied().collect(),
            _ => closes.iter().take(config.sparkline_len).copied().collect(),
        };

        let rsi = round_to(rsi, 2);
        let volatility_30d = round_to(volatility_30d, 2);

        Self {
            ma50: round_to(ma50, 2),
            ma200: round_to(ma200, 2),
            rsi,
            beta: round_to(beta, 3),
            volatility_30d,
            vol_category: config.categorize(volatility_30d),
            high_52w,
            low_52w,
            sparkline,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
