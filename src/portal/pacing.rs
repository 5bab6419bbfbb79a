//! Request pacing
//!
//! The portal is rate-limit sensitive, so the harvester keeps exactly one
//! request in flight and spaces requests by a minimum interval. The interval is
//! chosen per call, which lets list pages, detail lookups and chunk boundaries
//! use different pacing against the same shared clock.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::trace;

/// Spaces consecutive requests by a caller-chosen minimum interval
#[derive(Debug, Default)]
pub struct RequestPacer {
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    /// Create a pacer that has not seen any request yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until at least `min_interval` has passed since the previous
    /// request, then mark the current instant as the latest request.
    ///
    /// Returns the time spent waiting.
    pub async fn pace(&self, min_interval: Duration) -> Duration {
        let wait = self.remaining(min_interval, Instant::now());
        if !wait.is_zero() {
            trace!("Pacing request: waiting {:?}", wait);
            sleep(wait).await;
        }
        self.mark(Instant::now());
        wait
    }

    /// Pause for a fixed delay regardless of request history.
    ///
    /// Used between date chunks, where the delay is a cool-down rather than a
    /// spacing rule.
    pub async fn cool_down(&self, delay: Duration) {
        if !delay.is_zero() {
            trace!("Cooling down for {:?}", delay);
            sleep(delay).await;
        }
    }

    fn remaining(&self, min_interval: Duration, now: Instant) -> Duration {
        let last = self
            .last_request
            .lock()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner());
        match last {
            Some(last) => min_interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    fn mark(&self, now: Instant) {
        match self.last_request.lock() {
            Ok(mut guard) => *guard = Some(now),
            Err(poisoned) => *poisoned.into_inner() = Some(now),
        }
    }
}
