use async_trait::async_trait;

use crate::{FetchOutcome, MarketDataError};

/// An upstream market-data source.
///
/// `fetch_batch` returns exactly one outcome per requested symbol, in request
/// order. A failing symbol, or a failing request, is reported as
/// `FetchOutcome::Failed`; implementations never error out of a batch.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn id(&self) -> &'static str;

    /// Largest number of symbols sent in one upstream request.
    fn max_batch_size(&self) -> usize;

    /// Configured and not known to be unhealthy.
    async fn is_available(&self) -> bool;

    async fn fetch_batch(&self, symbols: &[String]) -> Vec<FetchOutcome>;

    /// Daily closes, most-recent-first. Used for benchmark series.
    async fn fetch_closes(&self, _symbol: &str, _days: usize) -> Result<Vec<f64>, MarketDataError> {
        Err(MarketDataError::Unsupported(self.id().to_string()))
    }
}
