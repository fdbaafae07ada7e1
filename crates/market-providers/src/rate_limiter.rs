use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Credit budget over a sliding window. Each spend is remembered with its
/// size and released once it is older than the window.
#[derive(Clone)]
pub struct RateLimiter {
    spends: Arc<Mutex<VecDeque<(Instant, usize)>>>,
    budget: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(budget: usize, window: Duration) -> Self {
        Self {
            spends: Arc::new(Mutex::new(VecDeque::new())),
            budget: budget.max(1),
            window,
        }
    }

    pub fn per_minute(budget: usize) -> Self {
        Self::new(budget, Duration::from_secs(60))
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Wait until `credits` fit in the window, then spend them. A request
    /// larger than the whole budget waits for an empty window.
    pub async fn acquire_n(&self, credits: usize) {
        let credits = credits.clamp(1, self.budget);
        loop {
            let wait = {
                let mut spends = self.spends.lock().await;
                let now = Instant::now();
                while spends
                    .front()
                    .is_some_and(|(at, _)| now.duration_since(*at) >= self.window)
                {
                    spends.pop_front();
                }

                let used: usize = spends.iter().map(|(_, n)| n).sum();
                if used + credits <= self.budget {
                    spends.push_back((now, credits));
                    return;
                }
                self.time_until_released(&spends, used + credits - self.budget, now)
            };

            tracing::debug!("Waiting {:.1}s for {} upstream credits", wait.as_secs_f64(), credits);
            tokio::time::sleep(wait).await;
        }
    }

    /// How long until the oldest spends free at least `needed` credits.
    fn time_until_released(&self, spends: &VecDeque<(Instant, usize)>, needed: usize, now: Instant) -> Duration {
        let mut freed = 0;
        for (at, n) in spends {
            freed += n;
            if freed >= needed {
                return self.window.saturating_sub(now.duration_since(*at)) + Duration::from_millis(10);
            }
        }
        self.window
    }
}
