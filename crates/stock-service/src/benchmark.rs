//! Per-market reference series used for beta.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use market_core::directory::benchmark_symbol;
use market_core::{Market, QuoteProvider};

pub const DEFAULT_BENCHMARK_TTL: Duration = Duration::from_secs(3600);
/// How long a failed fetch suppresses retries.
const FAILURE_BACKOFF: Duration = Duration::from_secs(300);

struct BenchmarkEntry {
    closes: Option<Arc<Vec<f64>>>,
    expires_at: Instant,
}

pub struct BenchmarkCache {
    entries: DashMap<Market, BenchmarkEntry>,
    ttl: Duration,
    days: usize,
}

impl BenchmarkCache {
    /// `days` is how many closes to request per series.
    pub fn new(ttl: Duration, days: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            days,
        }
    }

    /// Closes for the market's benchmark, most-recent-first, fetching through
    /// the provider chain when missing or stale.
    pub async fn get(&self, market: Market, providers: &[Arc<dyn QuoteProvider>]) -> Option<Arc<Vec<f64>>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(&market) {
            if now < entry.expires_at {
                return entry.closes.clone();
            }
        }

        let symbol = benchmark_symbol(market);
        for provider in providers {
            if !provider.is_available().await {
                continue;
            }
            match provider.fetch_closes(symbol, self.days).await {
                Ok(closes) if !closes.is_empty() => {
                    tracing::debug!("Benchmark {} refreshed from {} ({} closes)", symbol, provider.id(), closes.len());
                    let closes = Arc::new(closes);
                    self.entries.insert(
                        market,
                        BenchmarkEntry {
                            closes: Some(closes.clone()),
                            expires_at: Instant::now() + self.ttl,
                        },
                    );
                    return Some(closes);
                }
                Ok(_) => tracing::debug!("{} returned no history for benchmark {}", provider.id(), symbol),
                Err(e) => tracing::debug!("{} could not load benchmark {}: {}", provider.id(), symbol, e),
            }
        }

        tracing::warn!("Benchmark {} unavailable, beta falls back to neutral", symbol);
        // keep a stale series if there is one, otherwise remember the miss
        let mut entry = self.entries.entry(market).or_insert(BenchmarkEntry {
            closes: None,
            expires_at: now,
        });
        entry.expires_at = Instant::now() + FAILURE_BACKOFF;
        entry.closes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use market_core::{FetchOutcome, MarketDataError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct HistoryOnly {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl QuoteProvider for HistoryOnly {
        fn id(&self) -> &'static str {
            "history_only"
        }

        fn max_batch_size(&self) -> usize {
            1
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn fetch_batch(&self, symbols: &[String]) -> Vec<FetchOutcome> {
            symbols.iter().map(|s| FetchOutcome::failed(s, "unused")).collect()
        }

        async fn fetch_closes(&self, symbol: &str, days: usize) -> Result<Vec<f64>, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MarketDataError::Http("down".to_string()));
            }
            assert!(symbol == "SPY" || symbol == "0050.TW");
            Ok((0..days).map(|i| 100.0 + i as f64).collect())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_series_cached_per_market_until_ttl() {
        let provider = Arc::new(HistoryOnly { calls: AtomicUsize::new(0), fail: false });
        let providers: Vec<Arc<dyn QuoteProvider>> = vec![provider.clone()];
        let cache = BenchmarkCache::new(Duration::from_secs(3600), 61);

        assert_eq!(cache.get(Market::Us, &providers).await.map(|c| c.len()), Some(61));
        assert!(cache.get(Market::Us, &providers).await.is_some());
        assert!(cache.get(Market::Taiwan, &providers).await.is_some());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(3601)).await;
        cache.get(Market::Us, &providers).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_backs_off() {
        let provider = Arc::new(HistoryOnly { calls: AtomicUsize::new(0), fail: true });
        let providers: Vec<Arc<dyn QuoteProvider>> = vec![provider.clone()];
        let cache = BenchmarkCache::new(Duration::from_secs(3600), 61);

        assert!(cache.get(Market::Us, &providers).await.is_none());
        assert!(cache.get(Market::Us, &providers).await.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
