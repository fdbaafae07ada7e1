pub mod health;
pub mod rate_limiter;
pub mod twelve_data;
mod wire;
pub mod yfinance_service;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use market_core::QuoteProvider;

pub use health::{HealthMemo, HealthState};
pub use rate_limiter::RateLimiter;
pub use twelve_data::{TwelveDataConfig, TwelveDataProvider};
pub use yfinance_service::{YfinanceServiceConfig, YfinanceServiceProvider};

const BASE_TIMEOUT: Duration = Duration::from_secs(15);
const PER_SYMBOL_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound for one adapter call covering `symbols` symbols.
pub fn batch_timeout(symbols: usize) -> Duration {
    let per_symbol = PER_SYMBOL_TIMEOUT.saturating_mul(u32::try_from(symbols).unwrap_or(u32::MAX));
    BASE_TIMEOUT.saturating_add(per_symbol).min(MAX_TIMEOUT)
}

/// Primary first, then the secondary service.
pub fn provider_chain_from_env() -> Vec<Arc<dyn QuoteProvider>> {
    let twelve_data = TwelveDataProvider::from_env();
    if twelve_data.is_configured() {
        tracing::info!("Twelve Data configured as primary quote provider");
    } else {
        tracing::warn!("TWELVE_DATA_API_KEY not set, quotes will come from the yfinance service only");
    }

    vec![
        Arc::new(twelve_data) as Arc<dyn QuoteProvider>,
        Arc::new(YfinanceServiceProvider::from_env()),
    ]
}

pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
