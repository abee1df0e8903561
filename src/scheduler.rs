//! Host-side tick scheduler.
//!
//! Drives a [`PollCycle`] on a fixed interval. Ticks are awaited one at a
//! time, so a slow tick delays the next one instead of overlapping it.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, trace, warn};

use crate::poll::PollCycle;

/// Shortest tick interval; tokio intervals cannot have a zero period.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Fixed-interval scheduler with cooperative shutdown.
#[derive(Debug)]
pub struct Scheduler {
    interval: Duration,
    max_ticks: Option<u64>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    /// Create a scheduler ticking every `interval`, raised to
    /// [`MIN_INTERVAL`] when shorter.
    pub fn new(interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "poll interval below minimum, using 1 ms"
            );
        }
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            interval: interval.max(MIN_INTERVAL),
            max_ticks: None,
            shutdown_tx,
        }
    }

    /// Stop after `ticks` ticks.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Handle that stops a running scheduler after its current tick.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Send shutdown signal
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Connect once, then tick until shutdown or the tick limit.
    /// Returns the number of ticks run.
    pub async fn run<P: PollCycle + ?Sized>(&self, cycle: &mut P) -> u64 {
        let mut shutdown = self.shutdown_tx.subscribe();

        info!(
            consumer = cycle.name(),
            interval_ms = self.interval.as_millis() as u64,
            "poll scheduler starting"
        );

        let connected = cycle.connect().await;
        if let Err(e) = connected {
            warn!(consumer = cycle.name(), error = %e, "initial connect failed, retrying on next tick");
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial connect stands in
        // for it so a failed connect is retried one interval later.
        ticker.tick().await;

        let mut ticks: u64 = 0;
        while !*shutdown.borrow() {
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let outcome = cycle.poll_once().await;
            ticks += 1;
            trace!(consumer = cycle.name(), tick = ticks, ?outcome, "tick complete");
        }

        info!(consumer = cycle.name(), ticks, "poll scheduler stopped");
        ticks
    }
}

/// Cloneable shutdown trigger for a [`Scheduler`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Send shutdown signal
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}
