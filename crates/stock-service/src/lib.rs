//! Quote aggregation for the portfolio dashboard.
//!
//! [`StockService`] answers "full data for these symbols" from the memory
//! cache, an ordered chain of upstream providers, and finally per-symbol
//! fallbacks, so callers always get one record per requested symbol.

pub mod benchmark;
pub mod cache;
pub mod config;
pub mod enrich;
pub mod scheduler;
pub mod store;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use market_core::{
    canonicalize, detect_market, CacheStats, FetchOutcome, Market, MarketDataError, PriceQuote,
    QuoteFragment, QuoteProvider, QuoteRecord, StockLookup,
};
use technical_analysis::IndicatorConfig;

pub use benchmark::BenchmarkCache;
pub use cache::{CacheOrigin, QuoteCache};
pub use config::ServiceConfig;
pub use scheduler::{RefreshOutcome, RefreshReport, RefreshScheduler, SchedulerConfig, TrackedSymbols};
pub use store::{QuoteStore, SqliteQuoteStore};

pub struct StockService {
    providers: Vec<Arc<dyn QuoteProvider>>,
    cache: Arc<QuoteCache>,
    store: Option<Arc<dyn QuoteStore>>,
    benchmarks: BenchmarkCache,
    indicators: IndicatorConfig,
    max_concurrent_batches: usize,
}

impl StockService {
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>, cache: Arc<QuoteCache>, config: &ServiceConfig) -> Self {
        Self {
            providers,
            cache,
            store: None,
            benchmarks: BenchmarkCache::new(config.benchmark_ttl, config.indicators.beta_days + 1),
            indicators: config.indicators.clone(),
            max_concurrent_batches: config.max_concurrent_batches.max(1),
        }
    }

    /// Attach the durable mirror used by [`flush`](Self::flush) and
    /// [`load_from_store`](Self::load_from_store).
    pub fn with_store(mut self, store: Arc<dyn QuoteStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    /// One record per input symbol, in input order. Never fails: unresolved
    /// symbols come back as fallback records with `price == 0`.
    pub async fn batch_get_full_data(&self, symbols: &[String]) -> Vec<QuoteRecord> {
        self.resolve(symbols, true).await
    }

    /// Same as [`batch_get_full_data`](Self::batch_get_full_data) but skips
    /// the cache read.
    pub async fn force_refresh(&self, symbols: &[String]) -> Vec<QuoteRecord> {
        self.resolve(symbols, false).await
    }

    pub async fn lookup_stock(&self, symbol: &str) -> StockLookup {
        let record = self
            .batch_get_full_data(&[symbol.to_string()])
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| self.fallback_for(&canonicalize(symbol)));

        StockLookup {
            symbol: record.symbol,
            name: record.name,
            sector: record.sector,
            market: record.market,
            currency: record.currency,
            price: record.price,
        }
    }

    /// Prices only, for the alert checker.
    pub async fn batch_get_quotes(&self, symbols: &[String]) -> Vec<PriceQuote> {
        self.batch_get_full_data(symbols)
            .await
            .into_iter()
            .map(|record| PriceQuote {
                symbol: record.symbol,
                price: record.price,
            })
            .collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn invalidate(&self, symbols: &[String]) -> usize {
        symbols
            .iter()
            .filter(|s| self.cache.invalidate(&canonicalize(s)))
            .count()
    }

    pub fn clear_cache(&self) -> usize {
        let removed = self.cache.clear();
        tracing::info!("Cleared {} cached quotes", removed);
        removed
    }

    /// Write every unexpired, priced record to the durable store.
    pub async fn flush(&self) -> Result<usize, MarketDataError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        // a fallback must never replace the last good snapshot
        let records: Vec<QuoteRecord> = self
            .cache
            .snapshot_unexpired()
            .into_iter()
            .filter(QuoteRecord::is_resolved)
            .collect();

        let written = store.upsert_many(&records).await?;
        tracing::debug!("Flushed {} quotes to the durable store", written);
        Ok(written)
    }

    /// Seed the memory cache from the durable store. Failures are logged and
    /// leave the cache empty.
    pub async fn load_from_store(&self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };

        match store.load_all().await {
            Ok(records) => {
                let loaded = records
                    .into_iter()
                    .filter(|record| self.cache.insert_rehydrated(record.clone()))
                    .count();
                tracing::info!("Rehydrated {} quotes from the durable store", loaded);
                loaded
            }
            Err(e) => {
                tracing::warn!("Could not load cached quotes, starting cold: {}", e);
                0
            }
        }
    }

    /// Final flush before the process exits.
    pub async fn shutdown(&self) {
        match self.flush().await {
            Ok(written) => tracing::info!("Shutdown flush wrote {} quotes", written),
            Err(e) => tracing::warn!("Shutdown flush failed: {}", e),
        }
    }

    async fn resolve(&self, symbols: &[String], use_cache: bool) -> Vec<QuoteRecord> {
        let canonical: Vec<String> = symbols.iter().map(|s| canonicalize(s)).collect();

        let mut records: HashMap<String, QuoteRecord> = HashMap::new();
        let mut misses: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for symbol in &canonical {
            if !seen.insert(symbol.as_str()) {
                continue;
            }
            match use_cache.then(|| self.cache.get_live(symbol)).flatten() {
                Some(record) => {
                    records.insert(symbol.clone(), record);
                }
                None if symbol.is_empty() => {}
                None => misses.push(symbol.clone()),
            }
        }

        if !misses.is_empty() {
            tracing::debug!(
                "{} cache hits, fetching {} symbols",
                records.len(),
                misses.len()
            );
            records.extend(self.run_provider_chain(&misses).await);
        }

        canonical
            .iter()
            .map(|symbol| {
                records
                    .entry(symbol.clone())
                    .or_insert_with(|| self.fallback_for(symbol))
                    .clone()
            })
            .collect()
    }

    /// Try providers in order until one pass resolves at least one symbol.
    async fn run_provider_chain(&self, misses: &[String]) -> HashMap<String, QuoteRecord> {
        for provider in &self.providers {
            if !provider.is_available().await {
                tracing::debug!("Provider {} unavailable, skipping", provider.id());
                continue;
            }

            let mut fragments: Vec<QuoteFragment> = Vec::new();
            let mut failed = 0usize;
            for outcome in self.fetch_pass(provider, misses).await {
                match outcome {
                    FetchOutcome::Resolved(fragment) => fragments.push(fragment),
                    FetchOutcome::Failed { symbol, reason } => {
                        failed += 1;
                        tracing::debug!("{} failed for {}: {}", provider.id(), symbol, reason);
                    }
                }
            }

            if fragments.is_empty() {
                tracing::warn!(
                    "Provider {} resolved none of {} symbols, trying next provider",
                    provider.id(),
                    misses.len()
                );
                continue;
            }

            if failed > 0 {
                tracing::info!("Provider {} resolved {}/{} symbols", provider.id(), fragments.len(), misses.len());
            }
            return self.enrich_fragments(fragments).await;
        }

        tracing::warn!("No provider resolved any of {} symbols, serving fallbacks", misses.len());
        HashMap::new()
    }

    /// Split into the provider's batch size and fan out with bounded concurrency.
    async fn fetch_pass(&self, provider: &Arc<dyn QuoteProvider>, symbols: &[String]) -> Vec<FetchOutcome> {
        let chunk_size = provider.max_batch_size().max(1);
        let requested: HashSet<&str> = symbols.iter().map(String::as_str).collect();

        // owned chunks keep the spawned refresh futures Send
        let chunks: Vec<Vec<String>> = symbols.chunks(chunk_size).map(<[String]>::to_vec).collect();
        let provider = Arc::clone(provider);
        let outcomes: Vec<Vec<FetchOutcome>> = stream::iter(chunks)
            .map(move |chunk| {
                let provider = Arc::clone(&provider);
                async move { provider.fetch_batch(&chunk).await }
            })
            .buffer_unordered(self.max_concurrent_batches)
            .collect()
            .await;

        outcomes
            .into_iter()
            .flatten()
            .filter(|outcome| requested.contains(outcome.symbol()))
            .collect()
    }

    async fn enrich_fragments(&self, fragments: Vec<QuoteFragment>) -> HashMap<String, QuoteRecord> {
        let mut needs_benchmark: Vec<Market> = Vec::new();
        for fragment in &fragments {
            let market = detect_market(&fragment.symbol).market;
            if fragment.technicals.beta.is_none() && !needs_benchmark.contains(&market) {
                needs_benchmark.push(market);
            }
        }

        let mut benchmarks: HashMap<Market, Arc<Vec<f64>>> = HashMap::new();
        for market in needs_benchmark {
            if let Some(series) = self.benchmarks.get(market, &self.providers).await {
                benchmarks.insert(market, series);
            }
        }

        fragments
            .into_iter()
            .map(|fragment| {
                let market = detect_market(&fragment.symbol).market;
                let benchmark = benchmarks.get(&market).map(|series| series.as_slice());
                let record = enrich::build_record(fragment, benchmark, &self.indicators);
                self.cache.insert_live(record.clone());
                (record.symbol.clone(), record)
            })
            .collect()
    }

    /// The cached record if one is unexpired, else a synthesized placeholder.
    /// Either way the answer holds for one live TTL.
    fn fallback_for(&self, symbol: &str) -> QuoteRecord {
        if let Some(record) = self.cache.serve_stale(symbol) {
            return record;
        }
        let record = enrich::fallback_record(symbol, &self.indicators);
        if !symbol.is_empty() {
            self.cache.insert_live(record.clone());
        }
        record
    }
}

#[cfg(test)]
mod tests;
