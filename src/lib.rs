//! # mq-inbound - Polling Queue Connector
//!
//! Repeatedly polls a single queue on a remote queue manager, removes at most
//! one message per tick and hands its body to a downstream sequence.
//!
//! ## Features
//!
//! - **Lazy reconnection**: a broken connection is noticed on receive and
//!   re-established on the next tick, never eagerly
//! - **TLS sessions**: client TLS context built from PEM keystore/truststore
//!   material, with protocol, cipher-suite and FIPS policy
//! - **Contained failures**: every error is reported and confined to its
//!   tick; nothing here terminates the host process
//! - **Pluggable transport**: the queue manager sits behind the
//!   [`QueueTransport`] trait; [`MemoryBroker`] ships for tests and replay
//!
//! ## Architecture
//!
//! ```text
//!  Scheduler ──tick──► QueueConsumer (PollCycle)
//!                          │
//!                          ├─► ConnectionManager ──► QueueTransport
//!                          │      (Session, TlsContext)
//!                          │
//!                          └─► InjectionSink ──► sequence / error sequence
//! ```
//!
//! ### State Machine
//!
//! ```text
//!                   connect() ok
//!   [Disconnected] ─────────────────> [Connected]
//!         ▲                               │
//!         │        receive: 2009          │ receive: message / 2033 / other
//!         └───────────────────────────────┤ (stays Connected)
//!                                         ▼
//! ```
//!
//! ### Reason Codes
//!
//! | Code | Meaning               | Handling                              |
//! |------|-----------------------|---------------------------------------|
//! | 2009 | Connection broken     | Drop session, reconnect next tick     |
//! | 2033 | No message available  | Normal empty poll, silent             |
//! | any  | Other receive failure | Reported, session kept                |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mq_inbound::{ChannelSink, Config, MemoryBroker, PollCycle, QueueConsumer};
//!
//! let broker = MemoryBroker::new().with_queue("QM1", "DEV.QUEUE.1");
//! broker.put("QM1", "DEV.QUEUE.1", "hello");
//!
//! let mut config = Config::default();
//! config.injection.sequence = Some("main".to_string());
//!
//! let (sink, mut receivers) = ChannelSink::new(16);
//! let mut consumer = QueueConsumer::new(config, Arc::new(broker), Arc::new(sink));
//!
//! consumer.poll_once().await; // connects, receives, injects
//! let message = receivers.messages.recv().await;
//! ```
//!
//! ## Modules
//!
//! - [`connection`]: Connection manager and session lifecycle
//! - [`poll`]: Poll cycle state machine and receive classification
//! - [`transport`]: Transport traits, reason codes, TLS context, in-process broker
//! - [`inject`]: Downstream sinks
//! - [`scheduler`]: Fixed-interval host scheduler
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod config;
pub mod connection;
pub mod error;
pub mod inject;
pub mod poll;
pub mod scheduler;
pub mod transport;

// Re-exports for convenience
pub use config::{Config, ConnectionConfig, InjectionConfig, PollConfig, TlsSettings};
pub use connection::{ConnectionManager, ConnectionState, Session};
pub use error::{InboundError, Result};
pub use inject::{ChannelSink, Delivery, InjectionSink, JsonLinesSink, SinkReceivers};
pub use poll::{ConsumerStats, PollCycle, QueueConsumer, ReceiveOutcome, StatsSummary, TickOutcome};
pub use scheduler::{Scheduler, ShutdownHandle};
pub use transport::{
    build_tls_context, MemoryBroker, MqError, MqMessage, QueueHandle, QueueTransport, ReasonCode,
    TlsContext,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
