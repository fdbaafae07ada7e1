//! Daily pre-market refresh of every tracked symbol, plus the periodic flush.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use market_core::{canonicalize, QuoteRecord, QuoteSource};

use crate::config::ServiceConfig;
use crate::StockService;

/// Source of the symbols users hold or watch.
#[async_trait]
pub trait TrackedSymbols: Send + Sync {
    async fn tracked_symbols(&self) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub run_at: NaiveTime,
}

impl From<&ServiceConfig> for SchedulerConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            batch_size: config.refresh_batch_size.max(1),
            batch_pause: config.refresh_batch_pause,
            run_at: config.refresh_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub symbols: usize,
    pub batches: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another run was in progress; this request was dropped.
    AlreadyRunning,
    Completed(RefreshReport),
}

pub struct RefreshScheduler {
    service: Arc<StockService>,
    tracked: Arc<dyn TrackedSymbols>,
    config: SchedulerConfig,
    running: AtomicBool,
}

/// Clears the running flag however the run ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RefreshScheduler {
    pub fn new(service: Arc<StockService>, tracked: Arc<dyn TrackedSymbols>, config: SchedulerConfig) -> Self {
        Self {
            service,
            tracked,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Refresh every tracked symbol in small batches, then flush.
    pub async fn run_refresh(&self) -> RefreshOutcome {
        if !self.try_claim() {
            tracing::info!("Quote refresh already running, skipping this trigger");
            return RefreshOutcome::AlreadyRunning;
        }
        RefreshOutcome::Completed(self.run_claimed().await)
    }

    /// Start a run in the background. Returns false if one is already going.
    pub fn trigger(self: &Arc<Self>) -> bool {
        if !self.try_claim() {
            return false;
        }
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_claimed().await;
        });
        true
    }

    fn try_claim(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// The run itself. The caller must hold the running flag.
    async fn run_claimed(&self) -> RefreshReport {
        let _guard = RunningGuard(&self.running);

        let symbols = match self.tracked.tracked_symbols().await {
            Ok(symbols) => dedupe_canonical(symbols),
            Err(e) => {
                tracing::warn!("Could not list tracked symbols: {:#}", e);
                return RefreshReport::default();
            }
        };

        let mut report = RefreshReport {
            symbols: symbols.len(),
            ..RefreshReport::default()
        };
        tracing::info!("Refreshing {} tracked symbols", symbols.len());

        for (i, batch) in symbols.chunks(self.config.batch_size.max(1)).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.batch_pause).await;
            }
            let started = Utc::now();
            let records = self.service.force_refresh(batch).await;
            // an older cached record served as the fallback does not count
            let resolved = records.iter().filter(|r| fetched_since(r, started)).count();
            report.batches += 1;
            report.resolved += resolved;
            report.unresolved += records.len() - resolved;
        }

        if let Err(e) = self.service.flush().await {
            tracing::warn!("Flush after refresh failed: {}", e);
        }

        tracing::info!(
            "Quote refresh done: {} resolved, {} unresolved in {} batches",
            report.resolved,
            report.unresolved,
            report.batches
        );
        report
    }

    /// Run once a day at the configured local time until `shutdown` flips.
    pub fn spawn_daily(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let delay = next_run_delay(&Local::now(), scheduler.config.run_at);
                tracing::info!("Next quote refresh in {}m", delay.as_secs() / 60);

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        scheduler.run_refresh().await;
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Quote refresh scheduler stopping");
                        break;
                    }
                }
            }
        })
    }
}

/// Flush the memory cache to the durable store every `interval`.
pub fn spawn_flush_loop(
    service: Arc<StockService>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // first tick fires immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = service.flush().await {
                        tracing::warn!("Periodic cache flush failed: {}", e);
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

/// Time from `now` until the next `at` wall-clock time (tomorrow if already past).
pub fn next_run_delay<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> Duration {
    let now = now.naive_local();
    let mut target = now.date().and_time(at);
    if target <= now {
        target += chrono::Duration::days(1);
    }
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

fn fetched_since(record: &QuoteRecord, started: DateTime<Utc>) -> bool {
    record.is_resolved() && record.source != QuoteSource::Fallback && record.updated_at >= started
}

fn dedupe_canonical(symbols: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .iter()
        .map(|s| canonicalize(s))
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}
