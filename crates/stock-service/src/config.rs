use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveTime;

use technical_analysis::IndicatorConfig;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    // Cache tiers
    pub quote_ttl: Duration,            // 30s
    pub rehydrated_ttl: Duration,       // 24h
    pub benchmark_ttl: Duration,        // 1h
    pub flush_interval: Duration,       // 5 min

    // Provider fan-out
    pub max_concurrent_batches: usize,  // 4

    // Daily refresh
    pub refresh_batch_size: usize,      // 5
    pub refresh_batch_pause: Duration,  // 3s
    pub refresh_at: NaiveTime,          // 06:00 local

    pub database_url: String,

    pub indicators: IndicatorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            quote_ttl: Duration::from_secs(30),
            rehydrated_ttl: Duration::from_secs(86_400),
            benchmark_ttl: Duration::from_secs(3600),
            flush_interval: Duration::from_secs(300),
            max_concurrent_batches: 4,
            refresh_batch_size: 5,
            refresh_batch_pause: Duration::from_secs(3),
            refresh_at: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            database_url: "sqlite://market_cache.db?mode=rwc".to_string(),
            indicators: IndicatorConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            quote_ttl: secs_var("QUOTE_TTL_SECS", defaults.quote_ttl)?,
            rehydrated_ttl: secs_var("REHYDRATED_TTL_SECS", defaults.rehydrated_ttl)?,
            benchmark_ttl: secs_var("BENCHMARK_TTL_SECS", defaults.benchmark_ttl)?,
            flush_interval: secs_var("CACHE_FLUSH_INTERVAL_SECS", defaults.flush_interval)?,
            max_concurrent_batches: env::var("MAX_CONCURRENT_BATCHES")
                .unwrap_or_else(|_| defaults.max_concurrent_batches.to_string())
                .parse()
                .context("MAX_CONCURRENT_BATCHES must be an integer")?,
            refresh_batch_size: env::var("REFRESH_BATCH_SIZE")
                .unwrap_or_else(|_| defaults.refresh_batch_size.to_string())
                .parse()
                .context("REFRESH_BATCH_SIZE must be an integer")?,
            refresh_batch_pause: secs_var("REFRESH_BATCH_PAUSE_SECS", defaults.refresh_batch_pause)?,
            refresh_at: match env::var("REFRESH_AT") {
                Ok(value) => NaiveTime::parse_from_str(value.trim(), "%H:%M")
                    .with_context(|| format!("REFRESH_AT must be HH:MM, got {value:?}"))?,
                Err(_) => defaults.refresh_at,
            },
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            indicators: defaults.indicators,
        })
    }
}

fn secs_var(key: &str, default: Duration) -> Result<Duration> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .with_context(|| format!("{key} must be a whole number of seconds")),
        Err(_) => Ok(default),
    }
}
