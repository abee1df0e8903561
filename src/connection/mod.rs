//! Queue-manager connection lifecycle.
//!
//! A [`ConnectionManager`] owns at most one [`Session`]. The connection state
//! is derived from that ownership, so a session exists exactly when the
//! manager reports [`ConnectionState::Connected`].
//!
//! ## State Machine
//!
//! | State          | Description                        | Valid Transitions            |
//! |----------------|------------------------------------|------------------------------|
//! | `Disconnected` | No session (initial)               | → Connected via `connect()`  |
//! | `Connected`    | Queue open for input               | → Disconnected via `mark_broken()` |

mod manager;
mod session;

pub use manager::ConnectionManager;
pub use session::Session;

use std::fmt;

/// Connection state of a [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live session
    #[default]
    Disconnected,
    /// Session open against the queue
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
        }
    }
}
