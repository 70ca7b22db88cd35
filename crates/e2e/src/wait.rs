//! Bounded poll-until-timeout
//!
//! Callers probe, and on a miss ask the [`Wait`] for another attempt. The
//! first probe always happens, even with a zero timeout, and the last pause is
//! clipped so a wait never sleeps past its deadline.
//!
//! ```ignore
//! let mut wait = poller.start();
//! loop {
//!     if condition_holds().await? {
//!         break;
//!     }
//!     if !wait.retry().await {
//!         return Err(timed_out(wait.elapsed()));
//!     }
//! }
//! ```

use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Delay growth between attempts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Same interval every time
    #[default]
    Fixed,
    /// Interval multiplied by `factor` after each attempt, capped at `max_interval_ms`
    Exponential { factor: f64, max_interval_ms: u64 },
}

/// Timeout and pacing shared by every wait of a run
#[derive(Debug, Clone)]
pub struct Poller {
    timeout: Duration,
    interval: Duration,
    backoff: Backoff,
}

impl Poller {
    pub fn new(timeout: Duration, interval: Duration, backoff: Backoff) -> Self {
        Self {
            timeout,
            // A zero interval would spin the executor
            interval: interval.max(Duration::from_millis(1)),
            backoff,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Begin a wait; the deadline starts now
    pub fn start(&self) -> Wait {
        let started = Instant::now();
        Wait {
            started,
            deadline: started + self.timeout,
            interval: self.interval,
            probes: 1,
            poller: self.clone(),
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        match &self.backoff {
            Backoff::Fixed => current,
            Backoff::Exponential { factor, max_interval_ms } => {
                let grown = current.mul_f64(factor.max(1.0));
                grown.min(Duration::from_millis(*max_interval_ms).max(self.interval))
            }
        }
    }
}

/// One in-progress wait
#[derive(Debug)]
pub struct Wait {
    started: Instant,
    deadline: Instant,
    interval: Duration,
    probes: u32,
    poller: Poller,
}

impl Wait {
    /// Sleep before the next probe. Returns `false` once the deadline has passed.
    pub async fn retry(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }

        let pause = self.interval.min(self.deadline - now);
        trace!(probes = self.probes, ?pause, "Condition not met, retrying");
        sleep(pause).await;

        self.interval = self.poller.next_interval(self.interval);
        self.probes += 1;
        true
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Probes made so far, including the current one
    pub fn probes(&self) -> u32 {
        self.probes
    }
}
