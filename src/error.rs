//! Inbound connector error types.
//!
//! # Error Classification
//!
//! Every failure is contained within a single poll tick. Errors split into
//! two groups:
//!
//! - **Connection faults** (`Connect`, `ConnectionBroken`): the transport is
//!   unusable. The connection manager ends up `Disconnected` and the next tick
//!   reconnects.
//! - **Tick-local faults** (`Configuration`, `TransientReceive`, `Injection`):
//!   reported, connectivity state untouched, nothing retried within the tick.
//!
//! Transport variants preserve the queue-manager reason code via `#[source]`
//! so log sinks can display the complete chain.

use thiserror::Error;

use crate::transport::{MqError, ReasonCode};

/// Inbound connector errors.
#[derive(Error, Debug)]
pub enum InboundError {
    /// Missing or invalid configuration: credentials, TLS material,
    /// destination sequence.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport or authentication failure while connecting.
    #[error("Failed to connect to queue manager {queue_manager}: {source}")]
    Connect {
        /// Queue manager the connect was aimed at.
        queue_manager: String,
        /// Underlying transport error.
        #[source]
        source: MqError,
    },

    /// The connection dropped underneath an open session.
    #[error("Connection broken while reading queue {queue}: {source}")]
    ConnectionBroken {
        /// Queue being read when the break was detected.
        queue: String,
        /// Underlying transport error.
        #[source]
        source: MqError,
    },

    /// Any other receive failure. May be transient or message-specific.
    #[error("Error while getting messages from queue {queue}: {source}")]
    TransientReceive {
        /// Queue being read.
        queue: String,
        /// Underlying transport error.
        #[source]
        source: MqError,
    },

    /// Downstream sequence rejected the message.
    #[error("Injection error: {0}")]
    Injection(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, InboundError>;

impl InboundError {
    /// Whether this error leaves the connector without a usable session.
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectionBroken { .. })
    }

    /// Queue-manager reason code carried by transport errors.
    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            Self::Connect { source, .. }
            | Self::ConnectionBroken { source, .. }
            | Self::TransientReceive { source, .. } => Some(source.reason),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for InboundError {
    fn from(err: toml::de::Error) -> Self {
        InboundError::Configuration(format!("Failed to parse config: {err}"))
    }
}
