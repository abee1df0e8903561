//! Open queue session.

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::ConnectionConfig;
use crate::transport::{MqError, MqMessage, QueueHandle};

/// Handle to a connected queue manager with the input queue open.
///
/// Only a [`ConnectionManager`](super::ConnectionManager) creates sessions,
/// and it drops them on the first broken-connection signal.
pub struct Session {
    /// Session ID
    id: String,
    /// Queue manager name
    queue_manager: String,
    /// Queue opened for input
    queue: String,
    /// Channel used for the connection
    channel: String,
    /// Whether the channel runs over TLS
    tls: bool,
    /// Open queue
    handle: Box<dyn QueueHandle>,
    /// Connect timestamp
    connected_at: Instant,
    /// Messages received on this session
    messages_received: u64,
}

impl Session {
    pub(super) fn new(config: &ConnectionConfig, handle: Box<dyn QueueHandle>, tls: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            queue_manager: config.queue_manager.clone(),
            queue: config.queue.clone(),
            channel: config.channel.clone(),
            tls,
            handle,
            connected_at: Instant::now(),
            messages_received: 0,
        }
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue manager name
    pub fn queue_manager(&self) -> &str {
        &self.queue_manager
    }

    /// Queue opened for input
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Channel name
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether the session runs over TLS
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Time since connect
    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Messages received on this session
    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }

    /// Remove one message, waiting at most `wait`.
    pub(crate) async fn get(&mut self, wait: Duration) -> Result<MqMessage, MqError> {
        let result = self.handle.get(wait).await;
        if result.is_ok() {
            self.messages_received += 1;
        }
        result
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("queue_manager", &self.queue_manager)
            .field("queue", &self.queue)
            .field("channel", &self.channel)
            .field("tls", &self.tls)
            .field("messages_received", &self.messages_received)
            .finish_non_exhaustive()
    }
}
