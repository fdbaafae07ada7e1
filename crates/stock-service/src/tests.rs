use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;

use market_core::{Currency, FetchOutcome, Market, ProvidedTechnicals, QuoteFragment, QuoteProvider, QuoteSource};

use super::*;

/// Scripted provider that counts batch calls and records what it was asked for.
pub(crate) struct FakeProvider {
    id: &'static str,
    source: QuoteSource,
    max_batch: usize,
    available: bool,
    /// Symbols this provider knows. `None` resolves everything at 100.0.
    prices: Option<HashMap<String, f64>>,
    batch_calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub(crate) fn new(id: &'static str, source: QuoteSource, max_batch: usize) -> Self {
        Self {
            id,
            source,
            max_batch,
            available: true,
            prices: None,
            batch_calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_prices(mut self, prices: &[(&str, f64)]) -> Self {
        self.prices = Some(prices.iter().map(|(s, p)| (s.to_string(), *p)).collect());
        self
    }

    fn down(mut self) -> Self {
        self.available = false;
        self
    }

    pub(crate) fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteProvider for FakeProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn fetch_batch(&self, symbols: &[String]) -> Vec<FetchOutcome> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().extend(symbols.iter().cloned());

        symbols
            .iter()
            .map(|symbol| {
                let price = match &self.prices {
                    Some(prices) => prices.get(symbol).copied(),
                    None => Some(100.0),
                };
                match price {
                    Some(price) => FetchOutcome::Resolved(QuoteFragment {
                        prev_close: Some(price * 0.99),
                        closes: (0..60).map(|i| price - i as f64 * 0.1).collect(),
                        technicals: ProvidedTechnicals {
                            beta: Some(1.1),
                            ..Default::default()
                        },
                        ..QuoteFragment::new(symbol.as_str(), price, self.source)
                    }),
                    None => FetchOutcome::failed(symbol, "symbol not found"),
                }
            })
            .collect()
    }
}

pub(crate) fn fake_record_provider(max_batch: usize) -> Arc<FakeProvider> {
    Arc::new(FakeProvider::new("fake", QuoteSource::TwelveData, max_batch))
}

fn service_with(providers: Vec<Arc<FakeProvider>>) -> StockService {
    let providers = providers
        .into_iter()
        .map(|p| p as Arc<dyn QuoteProvider>)
        .collect();
    StockService::new(providers, Arc::new(QuoteCache::default()), &ServiceConfig::default())
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

async fn memory_store() -> Arc<SqliteQuoteStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteQuoteStore::new(pool);
    store.init_tables().await.unwrap();
    Arc::new(store)
}

#[tokio::test(start_paused = true)]
async fn test_cache_hit_within_ttl_skips_provider() {
    let provider = fake_record_provider(8);
    let service = service_with(vec![provider.clone()]);

    let first = service.batch_get_full_data(&symbols(&["AAPL"])).await;
    let second = service.batch_get_full_data(&symbols(&["aapl"])).await;

    assert_eq!(provider.batch_calls(), 1);
    assert_eq!(first, second);

    tokio::time::advance(Duration::from_secs(31)).await;
    service.batch_get_full_data(&symbols(&["AAPL"])).await;
    assert_eq!(provider.batch_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_force_refresh_bypasses_cache() {
    let provider = fake_record_provider(8);
    let service = service_with(vec![provider.clone()]);

    service.batch_get_full_data(&symbols(&["MSFT"])).await;
    service.force_refresh(&symbols(&["MSFT"])).await;

    assert_eq!(provider.batch_calls(), 2);
}

#[tokio::test]
async fn test_mixed_request_keeps_order_and_length() {
    let primary = Arc::new(
        FakeProvider::new("primary", QuoteSource::TwelveData, 8)
            .with_prices(&[("AAPL", 187.25), ("2330.TW", 1045.0)]),
    );
    let secondary = Arc::new(FakeProvider::new("secondary", QuoteSource::YfinanceService, 20));
    let service = service_with(vec![primary.clone(), secondary.clone()]);

    let records = service
        .batch_get_full_data(&symbols(&["AAPL", "2330", "BADSYM"]))
        .await;

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].symbol, "AAPL");
    assert_eq!(records[0].price, 187.25);
    assert_eq!(records[0].currency, Currency::Usd);
    assert_eq!(records[0].name, "Apple Inc.");

    assert_eq!(records[1].symbol, "2330.TW");
    assert_eq!(records[1].price, 1045.0);
    assert_eq!(records[1].market, Market::Taiwan);
    assert_eq!(records[1].currency, Currency::Twd);

    assert_eq!(records[2].symbol, "BADSYM");
    assert_eq!(records[2].price, 0.0);
    assert_eq!(records[2].source, QuoteSource::Fallback);
    assert_eq!(records[2].sector, "Other");

    // the primary resolved something, so the chain stopped there
    assert_eq!(secondary.batch_calls(), 0);
}

#[tokio::test]
async fn test_duplicates_and_empty_symbols() {
    let provider = fake_record_provider(8);
    let service = service_with(vec![provider.clone()]);

    let records = service
        .batch_get_full_data(&symbols(&["aapl", "", "AAPL", " msft "]))
        .await;

    let returned: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(returned, vec!["AAPL", "", "AAPL", "MSFT"]);
    assert_eq!(records[0], records[2]);
    assert_eq!(records[1].price, 0.0);
    assert_eq!(provider.requested(), vec!["AAPL", "MSFT"]);
}

#[tokio::test]
async fn test_empty_request() {
    let provider = fake_record_provider(8);
    let service = service_with(vec![provider.clone()]);

    assert!(service.batch_get_full_data(&[]).await.is_empty());
    assert_eq!(provider.batch_calls(), 0);
}

#[tokio::test]
async fn test_chain_falls_through_to_secondary() {
    let primary = Arc::new(FakeProvider::new("primary", QuoteSource::TwelveData, 8).with_prices(&[]));
    let secondary = Arc::new(FakeProvider::new("secondary", QuoteSource::YfinanceService, 20));
    let service = service_with(vec![primary.clone(), secondary.clone()]);

    let records = service.batch_get_full_data(&symbols(&["AAPL", "MSFT"])).await;

    assert_eq!(primary.batch_calls(), 1);
    assert_eq!(secondary.batch_calls(), 1);
    assert!(records.iter().all(|r| r.source == QuoteSource::YfinanceService));
    assert!(records.iter().all(|r| r.price > 0.0));
}

#[tokio::test]
async fn test_unavailable_provider_is_skipped() {
    let primary = Arc::new(FakeProvider::new("primary", QuoteSource::TwelveData, 8).down());
    let secondary = Arc::new(FakeProvider::new("secondary", QuoteSource::YfinanceService, 20));
    let service = service_with(vec![primary.clone(), secondary.clone()]);

    service.batch_get_full_data(&symbols(&["AAPL"])).await;

    assert_eq!(primary.batch_calls(), 0);
    assert_eq!(secondary.batch_calls(), 1);
}

#[tokio::test]
async fn test_all_providers_down_returns_fallbacks() {
    let primary = Arc::new(FakeProvider::new("primary", QuoteSource::TwelveData, 8).down());
    let secondary = Arc::new(FakeProvider::new("secondary", QuoteSource::YfinanceService, 20).down());
    let service = service_with(vec![primary, secondary]);

    let records = service
        .batch_get_full_data(&symbols(&["AAPL", "2330.TW", "BADSYM"]))
        .await;

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.price == 0.0 && r.source == QuoteSource::Fallback));
    assert_eq!(records[0].name, "Apple Inc.");
    assert_eq!(records[1].currency, Currency::Twd);
    assert_eq!(records[2].rsi, 50.0);
}

#[tokio::test]
async fn test_large_request_is_chunked_by_batch_size() {
    let provider = fake_record_provider(8);
    let service = service_with(vec![provider.clone()]);
    let many: Vec<String> = (0..20).map(|i| format!("SYM{i}")).collect();

    let records = service.batch_get_full_data(&many).await;

    assert_eq!(records.len(), 20);
    assert_eq!(provider.batch_calls(), 3);
    for (record, symbol) in records.iter().zip(&many) {
        assert_eq!(&record.symbol, symbol);
    }
}

#[tokio::test]
async fn test_lookup_and_quotes_projection() {
    let provider = Arc::new(
        FakeProvider::new("primary", QuoteSource::TwelveData, 8).with_prices(&[("2330.TW", 1045.0)]),
    );
    let service = service_with(vec![provider]);

    let lookup = service.lookup_stock("2330").await;
    assert_eq!(lookup.symbol, "2330.TW");
    assert_eq!(lookup.name, "Taiwan Semiconductor Manufacturing");
    assert_eq!(lookup.currency, Currency::Twd);
    assert_eq!(lookup.price, 1045.0);

    let quotes = service.batch_get_quotes(&symbols(&["2330.TW", "NOPE"])).await;
    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes[0].price, 1045.0);
    assert_eq!(quotes[1].symbol, "NOPE");
    assert_eq!(quotes[1].price, 0.0);
}

#[tokio::test]
async fn test_flush_and_rehydrate_round_trip() {
    let store = memory_store().await;

    let primary = Arc::new(FakeProvider::new("primary", QuoteSource::TwelveData, 8).with_prices(&[("AAPL", 187.25)]));
    let service = service_with(vec![primary]).with_store(store.clone());
    service.batch_get_full_data(&symbols(&["AAPL", "BADSYM"])).await;

    // the BADSYM fallback is cached but never written
    assert_eq!(service.flush().await.unwrap(), 1);

    let offline = Arc::new(FakeProvider::new("primary", QuoteSource::TwelveData, 8).down());
    let restarted = service_with(vec![offline]).with_store(store.clone());
    assert_eq!(restarted.load_from_store().await, 1);

    let records = restarted.batch_get_full_data(&symbols(&["AAPL", "BADSYM"])).await;
    assert_eq!(records[0].price, 187.25);
    assert_eq!(records[0].source, QuoteSource::TwelveData);
    assert_eq!(records[1].price, 0.0);
}

#[tokio::test]
async fn test_rehydrated_snapshot_does_not_skip_fetch() {
    let store = memory_store().await;
    let seeded = service_with(vec![fake_record_provider(8)]).with_store(store.clone());
    seeded.batch_get_full_data(&symbols(&["AAPL"])).await;
    seeded.flush().await.unwrap();

    let provider = Arc::new(FakeProvider::new("primary", QuoteSource::TwelveData, 8).with_prices(&[("AAPL", 190.0)]));
    let service = service_with(vec![provider.clone()]).with_store(store.clone());
    service.load_from_store().await;

    let records = service.batch_get_full_data(&symbols(&["AAPL"])).await;
    assert_eq!(provider.batch_calls(), 1);
    assert_eq!(records[0].price, 190.0);
}

#[tokio::test(start_paused = true)]
async fn test_served_snapshot_answers_for_live_ttl() {
    let provider = Arc::new(FakeProvider::new("primary", QuoteSource::TwelveData, 8).with_prices(&[]));
    let service = service_with(vec![provider.clone()]);
    service.cache().insert_rehydrated(QuoteRecord {
        price: 100.0,
        source: QuoteSource::TwelveData,
        ..enrich::fallback_record("AAPL", &IndicatorConfig::default())
    });

    for _ in 0..3 {
        let records = service.batch_get_full_data(&symbols(&["AAPL"])).await;
        assert_eq!(records[0].price, 100.0);
        assert_eq!(records[0].source, QuoteSource::TwelveData);
    }
    assert_eq!(provider.batch_calls(), 1);
    assert_eq!(
        service.cache().get_any("AAPL").map(|(_, origin)| origin),
        Some(CacheOrigin::Rehydrated)
    );

    tokio::time::advance(Duration::from_secs(31)).await;
    let records = service.batch_get_full_data(&symbols(&["AAPL"])).await;
    assert_eq!(records[0].price, 100.0);
    assert_eq!(provider.batch_calls(), 2);
}

#[tokio::test]
async fn test_flush_without_store_is_noop() {
    let service = service_with(vec![fake_record_provider(8)]);
    service.batch_get_full_data(&symbols(&["AAPL"])).await;

    assert_eq!(service.flush().await.unwrap(), 0);
    assert_eq!(service.load_from_store().await, 0);
}

#[tokio::test]
async fn test_invalidate_and_clear() {
    let provider = fake_record_provider(8);
    let service = service_with(vec![provider.clone()]);
    service.batch_get_full_data(&symbols(&["AAPL", "MSFT", "NVDA"])).await;
    assert_eq!(service.cache_stats().total_entries, 3);

    assert_eq!(service.invalidate(&symbols(&["aapl", "UNKNOWN"])), 1);
    service.batch_get_full_data(&symbols(&["AAPL"])).await;
    assert_eq!(provider.batch_calls(), 2);

    assert_eq!(service.clear_cache(), 3);
    assert!(service.cache().is_empty());
}
