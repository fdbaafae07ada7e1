//! Lazily probed, briefly memoized adapter health.
//!
//! `Unknown -> Healthy{until} | Unhealthy{until}`. Once `until` passes the next
//! availability check probes again. Batch results update the state directly.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_HEALTH_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown,
    Healthy { until: Instant },
    Unhealthy { until: Instant },
}

pub struct HealthMemo {
    name: &'static str,
    ttl: Duration,
    state: Mutex<HealthState>,
}

impl HealthMemo {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            state: Mutex::new(HealthState::Unknown),
        }
    }

    pub async fn state(&self) -> HealthState {
        *self.state.lock().await
    }

    /// Memoized verdict, or `None` when unknown or past its deadline.
    pub async fn cached(&self) -> Option<bool> {
        let now = Instant::now();
        match *self.state.lock().await {
            HealthState::Healthy { until } if now < until => Some(true),
            HealthState::Unhealthy { until } if now < until => Some(false),
            _ => None,
        }
    }

    /// Return the memoized verdict, running `probe` only when there is none.
    pub async fn check<F, Fut>(&self, probe: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        if let Some(healthy) = self.cached().await {
            return healthy;
        }

        let healthy = probe().await;
        if healthy {
            self.mark_healthy().await;
        } else {
            self.mark_unhealthy().await;
        }
        healthy
    }

    /// True only while an unhealthy verdict is still in force.
    pub async fn is_tripped(&self) -> bool {
        self.cached().await == Some(false)
    }

    pub async fn mark_healthy(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, HealthState::Unhealthy { .. }) {
            tracing::info!("{} is healthy again", self.name);
        }
        *state = HealthState::Healthy {
            until: Instant::now() + self.ttl,
        };
    }

    pub async fn mark_unhealthy(&self) {
        let mut state = self.state.lock().await;
        if !matches!(*state, HealthState::Unhealthy { .. }) {
            tracing::warn!("{} marked unhealthy for {}s", self.name, self.ttl.as_secs());
        }
        *state = HealthState::Unhealthy {
            until: Instant::now() + self.ttl,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_probe_is_memoized_until_deadline() {
        let memo = HealthMemo::new("test", Duration::from_secs(300));
        let counter = AtomicUsize::new(0);
        let probes = &counter;
        let probe = move || async move {
            probes.fetch_add(1, Ordering::SeqCst);
            false
        };

        assert_eq!(memo.state().await, HealthState::Unknown);
        assert!(!memo.check(probe).await);
        assert!(!memo.check(probe).await);
        assert_eq!(probes.load(Ordering::SeqCst), 1);
        assert!(memo.is_tripped().await);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(!memo.is_tripped().await);
        assert!(!memo.check(probe).await);
        assert_eq!(probes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_results_override_probe() {
        let memo = HealthMemo::new("test", Duration::from_secs(300));
        assert!(memo.check(|| async { true }).await);

        memo.mark_unhealthy().await;
        assert!(!memo.check(|| async { true }).await);

        memo.mark_healthy().await;
        assert!(memo.check(|| async { false }).await);
    }
}
