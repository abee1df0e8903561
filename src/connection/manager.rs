//! Connection manager.
//!
//! Establishes, validates and tears down the queue-manager session. Connect
//! failures leave the manager disconnected; the caller retries on its next
//! tick, never within the same one.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ConnectionState, Session};
use crate::config::ConnectionConfig;
use crate::error::{InboundError, Result};
use crate::poll::ReceiveOutcome;
use crate::transport::{build_tls_context, QueueTransport, TlsContext};

/// Owns the session and the TLS context for one connector.
pub struct ConnectionManager {
    transport: Arc<dyn QueueTransport>,
    /// Built on first TLS connect and reused for every reconnect
    tls: Option<TlsContext>,
    session: Option<Session>,
    connects: u64,
}

impl ConnectionManager {
    /// Create a disconnected manager over `transport`.
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self {
            transport,
            tls: None,
            session: None,
            connects: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        if self.session.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Check if a session is live
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Live session, if any
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Successful connects over the manager's lifetime
    pub fn connects(&self) -> u64 {
        self.connects
    }

    /// Connect and open the queue for input.
    ///
    /// With TLS enabled the context is built before the transport is touched;
    /// a TLS configuration error therefore never reaches the network. When
    /// already connected the existing session is returned as is.
    pub async fn connect(&mut self, config: &ConnectionConfig) -> Result<&mut Session> {
        let session = match self.session.take() {
            Some(existing) => {
                debug!(session = %existing.id(), "already connected");
                existing
            }
            None => self.open_session(config).await.map_err(|e| {
                warn!(
                    queue_manager = %config.queue_manager,
                    queue = %config.queue,
                    reason = e.reason().map(|r| r.0),
                    error = %e,
                    "failed to connect to queue manager"
                );
                e
            })?,
        };
        Ok(self.session.insert(session))
    }

    async fn open_session(&mut self, config: &ConnectionConfig) -> Result<Session> {
        debug!(
            queue_manager = %config.queue_manager,
            address = %config.address(),
            "starting to set up the connection"
        );

        if config.ssl_enabled && self.tls.is_none() {
            self.tls = Some(build_tls_context(&config.tls)?);
        }
        let tls = if config.ssl_enabled {
            self.tls.as_ref()
        } else {
            None
        };

        let handle = self
            .transport
            .open(config, tls)
            .await
            .map_err(|source| InboundError::Connect {
                queue_manager: config.queue_manager.clone(),
                source,
            })?;

        let session = Session::new(config, handle, tls.is_some());
        self.connects += 1;

        info!(
            queue_manager = %session.queue_manager(),
            queue = %session.queue(),
            channel = %session.channel(),
            session = %session.id(),
            tls = session.is_tls(),
            transport = self.transport.name(),
            reconnect = self.connects > 1,
            "queue manager successfully connected"
        );

        Ok(session)
    }

    /// One bounded get on the live session, classified.
    ///
    /// Returns `None` when disconnected; the transport is not touched. A
    /// broken connection is reported, not acted on: the caller decides when
    /// to `mark_broken`.
    pub async fn receive(&mut self, wait: Duration) -> Option<ReceiveOutcome> {
        let session = self.session.as_mut()?;
        Some(ReceiveOutcome::classify(session.get(wait).await))
    }

    /// Discard the session. Returns whether one was live.
    pub fn mark_broken(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                debug!(
                    session = %session.id(),
                    uptime_ms = session.uptime().as_millis() as u64,
                    "session discarded"
                );
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("transport", &self.transport.name())
            .field("tls", &self.tls)
            .field("session", &self.session)
            .field("connects", &self.connects)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryBroker, ReasonCode};

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            queue_manager: "QM1".to_string(),
            queue: "IN".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_connect_transitions_to_connected() {
        let broker = MemoryBroker::new().with_queue("QM1", "IN");
        let mut manager = ConnectionManager::new(Arc::new(broker));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.session().is_none());

        let session = manager.connect(&config()).await.unwrap();
        assert_eq!(session.queue(), "IN");
        assert!(!session.is_tls());

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.session().is_some());
        assert_eq!(manager.connects(), 1);
    }

    #[tokio::test]
    async fn test_connect_when_connected_reuses_session() {
        let broker = MemoryBroker::new().with_queue("QM1", "IN");
        let mut manager = ConnectionManager::new(Arc::new(broker.clone()));

        let first = manager.connect(&config()).await.unwrap().id().to_string();
        let second = manager.connect(&config()).await.unwrap().id().to_string();
        assert_eq!(first, second);
        assert_eq!(broker.open_attempts(), 1);
    }

    #[tokio::test]
    async fn test_mark_broken_is_idempotent() {
        let broker = MemoryBroker::new().with_queue("QM1", "IN");
        let mut manager = ConnectionManager::new(Arc::new(broker));
        manager.connect(&config()).await.unwrap();

        assert!(manager.mark_broken());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.session().is_none());

        assert!(!manager.mark_broken());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.session().is_none());
    }

    #[tokio::test]
    async fn test_receive_while_disconnected_skips_transport() {
        let broker = MemoryBroker::new().with_queue("QM1", "IN");
        broker.put("QM1", "IN", "waiting");
        let mut manager = ConnectionManager::new(Arc::new(broker.clone()));

        assert!(manager.receive(Duration::ZERO).await.is_none());
        assert_eq!(broker.get_attempts(), 0);
        assert_eq!(broker.depth("QM1", "IN"), 1);
    }

    #[tokio::test]
    async fn test_receive_classifies_get_result() {
        let broker = MemoryBroker::new().with_queue("QM1", "IN");
        broker.put("QM1", "IN", "hello");
        let mut manager = ConnectionManager::new(Arc::new(broker.clone()));
        manager.connect(&config()).await.unwrap();

        assert_eq!(
            manager.receive(Duration::ZERO).await,
            Some(ReceiveOutcome::Message("hello".to_string()))
        );
        assert_eq!(
            manager.receive(Duration::ZERO).await,
            Some(ReceiveOutcome::NoMessageAvailable)
        );
        assert_eq!(manager.session().unwrap().messages_received(), 1);

        broker.break_connections();
        assert!(matches!(
            manager.receive(Duration::ZERO).await,
            Some(ReceiveOutcome::ConnectionBroken { .. })
        ));
        // Classification alone does not drop the session
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(broker.get_attempts(), 3);
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        let broker = MemoryBroker::new()
            .with_queue("QM1", "IN")
            .with_credentials("QM1", "app", "right");
        let mut manager = ConnectionManager::new(Arc::new(broker));

        let mut cfg = config();
        cfg.user_id = Some("app".to_string());
        cfg.password = Some("wrong".to_string());

        let err = manager.connect(&cfg).await.unwrap_err();
        assert!(err.is_connection_fault());
        assert_eq!(err.reason(), Some(ReasonCode::NOT_AUTHORIZED));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.connects(), 0);
    }

    #[tokio::test]
    async fn test_tls_error_skips_transport() {
        let broker = MemoryBroker::new().with_queue("QM1", "IN");
        let mut manager = ConnectionManager::new(Arc::new(broker.clone()));

        let mut cfg = config();
        cfg.ssl_enabled = true;

        let err = manager.connect(&cfg).await.unwrap_err();
        assert!(matches!(err, InboundError::Configuration(_)));
        assert_eq!(broker.open_attempts(), 0);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
