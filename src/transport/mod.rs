//! Transport seam between the connector and a remote queue manager.
//!
//! The connector never speaks a wire protocol itself. It drives two traits:
//!
//! - [`QueueTransport`]: opens a queue for input on a named queue manager,
//!   optionally over a TLS context
//! - [`QueueHandle`]: one bounded get against an open queue
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            ConnectionManager            │
//! │        (Session, TLS context)           │
//! └──────────────────┬──────────────────────┘
//!                    │ open / get
//!          ┌────────┴────────┐
//!          ▼                 ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │  MemoryBroker   │ │ vendor client   │
//! │ (in-process)    │ │ (host-supplied) │
//! └─────────────────┘ └─────────────────┘
//! ```
//!
//! Failures surface as [`MqError`] carrying a queue-manager [`ReasonCode`].

mod memory;
mod tls;

pub use memory::MemoryBroker;
pub use tls::{build_tls_context, TlsContext, TlsProtocol};

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use thiserror::Error;

use crate::config::ConnectionConfig;

/// Queue-manager reason code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReasonCode(pub i32);

impl ReasonCode {
    /// The connection to the queue manager was lost.
    pub const CONNECTION_BROKEN: Self = Self(2009);
    /// Gets are inhibited on the queue.
    pub const GET_INHIBITED: Self = Self(2016);
    /// The queue is currently empty.
    pub const NO_MSG_AVAILABLE: Self = Self(2033);
    /// Credentials rejected or access denied.
    pub const NOT_AUTHORIZED: Self = Self(2035);
    /// Unknown queue manager name.
    pub const Q_MGR_NAME_ERROR: Self = Self(2058);
    /// Queue manager is not running.
    pub const Q_MGR_NOT_AVAILABLE: Self = Self(2059);
    /// Unknown queue name.
    pub const UNKNOWN_OBJECT_NAME: Self = Self(2085);
    /// Message body could not be decoded.
    pub const FORMAT_ERROR: Self = Self(2110);
    /// TLS negotiation failed or TLS required but not offered.
    pub const SSL_INITIALIZATION_ERROR: Self = Self(2393);
    /// Host unreachable.
    pub const HOST_NOT_AVAILABLE: Self = Self(2538);

    /// Symbolic name for known codes.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::CONNECTION_BROKEN => "MQRC_CONNECTION_BROKEN",
            Self::GET_INHIBITED => "MQRC_GET_INHIBITED",
            Self::NO_MSG_AVAILABLE => "MQRC_NO_MSG_AVAILABLE",
            Self::NOT_AUTHORIZED => "MQRC_NOT_AUTHORIZED",
            Self::Q_MGR_NAME_ERROR => "MQRC_Q_MGR_NAME_ERROR",
            Self::Q_MGR_NOT_AVAILABLE => "MQRC_Q_MGR_NOT_AVAILABLE",
            Self::UNKNOWN_OBJECT_NAME => "MQRC_UNKNOWN_OBJECT_NAME",
            Self::FORMAT_ERROR => "MQRC_FORMAT_ERROR",
            Self::SSL_INITIALIZATION_ERROR => "MQRC_SSL_INITIALIZATION_ERROR",
            Self::HOST_NOT_AVAILABLE => "MQRC_HOST_NOT_AVAILABLE",
            _ => return None,
        })
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Transport failure reported by a queue manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("reason {reason}: {detail}")]
pub struct MqError {
    /// Queue-manager reason code
    pub reason: ReasonCode,
    /// Human-readable detail
    pub detail: String,
}

impl MqError {
    /// Create an error from a reason code and detail text.
    pub fn new(reason: ReasonCode, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// A message removed from a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqMessage {
    /// Message identifier assigned on put
    pub message_id: String,
    /// Raw body
    pub body: Vec<u8>,
    /// When the message was put
    pub put_time: DateTime<Utc>,
}

impl MqMessage {
    /// Create a message with a fresh id stamped now.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().simple().to_string(),
            body: body.into(),
            put_time: Utc::now(),
        }
    }
}

/// Opens queues on a remote queue manager.
///
/// Implementations must not block the calling task for longer than a
/// connect timeout; the poll tick awaits the returned future.
pub trait QueueTransport: Send + Sync {
    /// Connect to `config.queue_manager` at `config.host:config.port` over
    /// `config.channel` with the configured credentials and open
    /// `config.queue` for shared input.
    ///
    /// `tls` is `Some` exactly when TLS is enabled; the transport must not
    /// fall back to plaintext when it is present.
    fn open<'a>(
        &'a self,
        config: &'a ConnectionConfig,
        tls: Option<&'a TlsContext>,
    ) -> BoxFuture<'a, Result<Box<dyn QueueHandle>, MqError>>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;
}

/// An open queue on a connected queue manager.
pub trait QueueHandle: Send {
    /// Remove one message, waiting at most `wait` for one to arrive.
    ///
    /// An empty queue surfaces as [`ReasonCode::NO_MSG_AVAILABLE`].
    fn get(&mut self, wait: Duration) -> BoxFuture<'_, Result<MqMessage, MqError>>;
}
