//! Single-queue polling consumer.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, error, trace, warn};

use super::{ConsumerStats, PollCycle, ReceiveOutcome, TickOutcome};
use crate::config::Config;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::{InboundError, Result};
use crate::inject::InjectionSink;
use crate::transport::{MqError, QueueTransport, ReasonCode};

/// Polls one queue and injects at most one message per tick.
pub struct QueueConsumer {
    name: String,
    config: Arc<Config>,
    manager: ConnectionManager,
    sink: Arc<dyn InjectionSink>,
    stats: Arc<ConsumerStats>,
}

impl QueueConsumer {
    /// Create a disconnected consumer. Nothing touches the network until the
    /// first `connect` or `poll_once`.
    pub fn new(
        config: Config,
        transport: Arc<dyn QueueTransport>,
        sink: Arc<dyn InjectionSink>,
    ) -> Self {
        tracing::info!(consumer = %config.poll.name, "initialized the queue consumer");
        Self {
            name: config.poll.name.clone(),
            config: Arc::new(config),
            manager: ConnectionManager::new(transport),
            sink,
            stats: Arc::new(ConsumerStats::new()),
        }
    }

    /// Connection state
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Connection manager
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Shared statistics handle
    pub fn stats(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    /// The manager logs the failure; only the counters are updated here.
    async fn connect_session(&mut self) -> Result<()> {
        self.manager.connect(&self.config.connection).await?;
        self.stats.record_connect();
        Ok(())
    }

    async fn tick(&mut self) -> TickOutcome {
        let outcome = self.run_tick().await;
        self.stats.record_tick(outcome);
        outcome
    }

    async fn run_tick(&mut self) -> TickOutcome {
        if !self.manager.is_connected() && self.connect_session().await.is_err() {
            return TickOutcome::ConnectFailed;
        }

        let Some(received) = self.manager.receive(self.config.poll.receive_wait()).await else {
            return TickOutcome::ConnectFailed;
        };
        let queue = self.config.connection.queue.as_str();

        match received {
            ReceiveOutcome::Message(text) => {
                debug!(
                    consumer = %self.name,
                    channel = %self.config.connection.channel,
                    bytes = text.len(),
                    "message received"
                );
                match self.inject(&text) {
                    Ok(()) => TickOutcome::Injected,
                    Err(e) => {
                        self.report_injection_failure(&e);
                        TickOutcome::InjectionFailed
                    }
                }
            }
            ReceiveOutcome::NoMessageAvailable => {
                trace!(consumer = %self.name, queue, "no message available");
                TickOutcome::Empty
            }
            ReceiveOutcome::ConnectionBroken { detail } => {
                self.manager.mark_broken();
                let err = InboundError::ConnectionBroken {
                    queue: queue.to_string(),
                    source: MqError::new(ReasonCode::CONNECTION_BROKEN, detail),
                };
                error!(consumer = %self.name, error = %err, "queue manager connection broken");
                TickOutcome::ConnectionLost
            }
            ReceiveOutcome::OtherError { reason, detail } => {
                let err = InboundError::TransientReceive {
                    queue: queue.to_string(),
                    source: MqError::new(reason, detail),
                };
                warn!(consumer = %self.name, reason = %reason, error = %err, "receive failed");
                TickOutcome::ReceiveFailed
            }
        }
    }

    fn inject(&self, payload: &str) -> Result<()> {
        let injection = &self.config.injection;
        let sequence = injection
            .sequence
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                InboundError::Configuration("the injection sequence is not configured".to_string())
            })?;

        self.sink.inject(payload, &injection.content_type, sequence)?;
        debug!(consumer = %self.name, sequence, "injected message to the sequence");
        Ok(())
    }

    /// The message has already left the queue; it is reported, not re-queued.
    fn report_injection_failure(&self, err: &InboundError) {
        error!(
            consumer = %self.name,
            queue = %self.config.connection.queue,
            error = %err,
            "received message could not be injected"
        );
        match self.config.injection.error_sequence.as_deref() {
            Some(sequence) if !sequence.trim().is_empty() => {
                self.sink.on_error(&err.to_string(), sequence);
            }
            _ => warn!(consumer = %self.name, "no error sequence configured, report dropped"),
        }
    }
}

impl PollCycle for QueueConsumer {
    fn connect(&mut self) -> BoxFuture<'_, Result<()>> {
        async move {
            if self.manager.is_connected() {
                return Ok(());
            }
            let result = self.connect_session().await;
            if result.is_err() {
                self.stats.record_connect_failure();
            }
            result
        }
        .boxed()
    }

    fn poll_once(&mut self) -> BoxFuture<'_, TickOutcome> {
        self.tick().boxed()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for QueueConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueConsumer")
            .field("name", &self.name)
            .field("manager", &self.manager)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
