//! Poll cycle: the per-tick state machine.
//!
//! A host scheduler calls [`PollCycle::poll_once`] once per tick and never
//! overlaps two ticks for the same consumer. Each tick:
//!
//! ```text
//!   tick ──► connected? ──no──► connect ──fail──► ConnectFailed
//!               │                  │
//!              yes               ok │
//!               ▼                  ▼
//!           receive-one (bounded wait)
//!               │
//!     ┌─────────┼──────────────┬──────────────────┐
//!     ▼         ▼              ▼                  ▼
//!  Message   2033 empty    2009 broken        other code
//!  inject    no-op         mark_broken        report, keep session
//! ```
//!
//! | Current state | Outcome              | Next state   |
//! |---------------|----------------------|--------------|
//! | Disconnected  | connect fails        | Disconnected |
//! | Connected     | `Message`            | Connected    |
//! | Connected     | `NoMessageAvailable` | Connected    |
//! | Connected     | `ConnectionBroken`   | Disconnected |
//! | Connected     | `OtherError`         | Connected    |
//!
//! Reconnection is lazy: it happens on the next tick that finds the
//! consumer disconnected.

mod consumer;
mod outcome;
mod stats;

pub use consumer::QueueConsumer;
pub use outcome::{ReceiveOutcome, TickOutcome};
pub use stats::{ConsumerStats, StatsSummary};

use futures::future::BoxFuture;

use crate::error::Result;

/// Polling contract the host scheduler depends on.
///
/// `&mut self` on both methods means a consumer can never run two ticks at
/// once.
pub trait PollCycle: Send {
    /// Establish the connection ahead of the first tick. Failures are
    /// returned for logging only; the next tick retries.
    fn connect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Run one tick.
    fn poll_once(&mut self) -> BoxFuture<'_, TickOutcome>;

    /// Get the consumer name for logging.
    fn name(&self) -> &str;
}
