//! In-process TTL cache of quote records keyed by canonical symbol.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use market_core::{CacheStats, QuoteRecord};

pub const DEFAULT_LIVE_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_REHYDRATED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOrigin {
    /// Produced by a provider fetch, or a fallback synthesized for one.
    Live,
    /// Loaded from the durable store at startup.
    Rehydrated,
}

struct CacheEntry {
    record: QuoteRecord,
    /// Reads before this instant count as hits and skip the fetch.
    fresh_until: Instant,
    expires_at: Instant,
    origin: CacheOrigin,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.fresh_until && !self.is_expired(now)
    }
}

pub struct QuoteCache {
    entries: DashMap<String, CacheEntry>,
    live_ttl: Duration,
    rehydrated_ttl: Duration,
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new(DEFAULT_LIVE_TTL, DEFAULT_REHYDRATED_TTL)
    }
}

impl QuoteCache {
    pub fn new(live_ttl: Duration, rehydrated_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            live_ttl,
            rehydrated_ttl,
        }
    }

    /// Entry still inside its live TTL. A rehydrated snapshot only counts
    /// once it has been served through [`serve_stale`](Self::serve_stale).
    pub fn get_live(&self, symbol: &str) -> Option<QuoteRecord> {
        let now = Instant::now();
        {
            let entry = self.entries.get(symbol)?;
            if entry.is_fresh(now) {
                return Some(entry.record.clone());
            }
            if !entry.is_expired(now) {
                return None;
            }
        }
        self.entries.remove_if(symbol, |_, entry| entry.is_expired(now));
        None
    }

    /// Any unexpired entry. An expired entry is evicted by the read that finds it.
    pub fn get_any(&self, symbol: &str) -> Option<(QuoteRecord, CacheOrigin)> {
        let now = Instant::now();
        {
            let entry = self.entries.get(symbol)?;
            if !entry.is_expired(now) {
                return Some((entry.record.clone(), entry.origin));
            }
        }
        self.entries.remove_if(symbol, |_, entry| entry.is_expired(now));
        None
    }

    pub fn insert_live(&self, record: QuoteRecord) {
        let expires_at = Instant::now() + self.live_ttl;
        self.entries.insert(
            record.symbol.clone(),
            CacheEntry {
                record,
                fresh_until: expires_at,
                expires_at,
                origin: CacheOrigin::Live,
            },
        );
    }

    /// Seed from the durable store; never displaces an existing entry.
    pub fn insert_rehydrated(&self, record: QuoteRecord) -> bool {
        let now = Instant::now();
        let mut inserted = false;
        self.entries.entry(record.symbol.clone()).or_insert_with(|| {
            inserted = true;
            CacheEntry {
                record,
                fresh_until: now,
                expires_at: now + self.rehydrated_ttl,
                origin: CacheOrigin::Rehydrated,
            }
        });
        inserted
    }

    /// Any unexpired entry, as a fallback answer. A rehydrated snapshot
    /// served this way answers reads for one live TTL without a fetch, but
    /// keeps its origin and still expires with the rehydrated TTL.
    pub fn serve_stale(&self, symbol: &str) -> Option<QuoteRecord> {
        let now = Instant::now();
        {
            let mut entry = self.entries.get_mut(symbol)?;
            if !entry.is_expired(now) {
                if entry.origin == CacheOrigin::Rehydrated {
                    entry.fresh_until = (now + self.live_ttl).min(entry.expires_at);
                }
                return Some(entry.record.clone());
            }
        }
        self.entries.remove_if(symbol, |_, entry| entry.is_expired(now));
        None
    }

    pub fn snapshot_unexpired(&self) -> Vec<QuoteRecord> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.record.clone())
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let total_entries = self.entries.len();
        let live_entries = self.entries.iter().filter(|entry| !entry.is_expired(now)).count();
        CacheStats {
            total_entries,
            live_entries,
        }
    }

    pub fn invalidate(&self, symbol: &str) -> bool {
        self.entries.remove(symbol).is_some()
    }

    pub fn clear(&self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
