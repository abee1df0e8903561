//! Consumer statistics tracking.
//!
//! Tracks ticks, connects, injected messages and failures per category.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use super::TickOutcome;

/// Thread-safe consumer statistics
#[derive(Debug)]
pub struct ConsumerStats {
    /// Total poll ticks
    ticks: AtomicU64,
    /// Successful connects (first connect and reconnects)
    connects: AtomicU64,
    /// Failed connect attempts
    connect_failures: AtomicU64,
    /// Ticks that found the queue empty
    empty_polls: AtomicU64,
    /// Messages handed to the injection sequence
    injected: AtomicU64,
    /// Messages received but not injected
    injection_failures: AtomicU64,
    /// Broken connections detected during receive
    connections_broken: AtomicU64,
    /// Other receive errors
    receive_errors: AtomicU64,
    /// Start time
    started_at: Instant,
}

impl Default for ConsumerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsumerStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            connects: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            empty_polls: AtomicU64::new(0),
            injected: AtomicU64::new(0),
            injection_failures: AtomicU64::new(0),
            connections_broken: AtomicU64::new(0),
            receive_errors: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record a successful connect
    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed connect that happened outside a tick
    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed tick
    pub fn record_tick(&self, outcome: TickOutcome) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            TickOutcome::ConnectFailed => &self.connect_failures,
            TickOutcome::Empty => &self.empty_polls,
            TickOutcome::Injected => &self.injected,
            TickOutcome::InjectionFailed => &self.injection_failures,
            TickOutcome::ConnectionLost => &self.connections_broken,
            TickOutcome::ReceiveFailed => &self.receive_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total ticks
    pub fn total_ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Get successful connects
    pub fn total_connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Get injected messages
    pub fn total_injected(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    /// Get summary
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            ticks: self.total_ticks(),
            connects: self.total_connects(),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            injected: self.total_injected(),
            injection_failures: self.injection_failures.load(Ordering::Relaxed),
            connections_broken: self.connections_broken.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

/// Statistics summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    /// Total ticks
    pub ticks: u64,
    /// Successful connects
    pub connects: u64,
    /// Failed connects
    pub connect_failures: u64,
    /// Empty polls
    pub empty_polls: u64,
    /// Injected messages
    pub injected: u64,
    /// Messages lost to injection failures
    pub injection_failures: u64,
    /// Broken connections
    pub connections_broken: u64,
    /// Other receive errors
    pub receive_errors: u64,
    /// Uptime in seconds
    pub uptime_secs: u64,
}
