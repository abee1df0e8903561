//! Downstream hand-off.
//!
//! The host pipeline owns the sequences; the connector only sees an
//! [`InjectionSink`]. Two sinks ship with the crate:
//!
//! - [`ChannelSink`]: forwards messages to a bounded tokio channel, so a full
//!   or closed pipeline shows up as a rejected injection. Error reports travel
//!   on their own unbounded channel and are never held back by a full
//!   message channel.
//! - [`JsonLinesSink`]: writes one JSON object per delivery to any writer

use std::io::Write;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{InboundError, Result};

/// Receives injected messages and error reports from a consumer.
pub trait InjectionSink: Send + Sync {
    /// Hand `payload` to `sequence`. An error means the pipeline rejected it.
    fn inject(&self, payload: &str, content_type: &str, sequence: &str) -> Result<()>;

    /// Report a failure to `error_sequence`.
    fn on_error(&self, message: &str, error_sequence: &str);
}

/// A message handed to a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectedMessage {
    /// Message body
    pub payload: String,
    /// Declared content type
    pub content_type: String,
    /// Destination sequence
    pub sequence: String,
}

/// A failure routed to the error sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// Failure description
    pub message: String,
    /// Destination error sequence
    pub sequence: String,
}

/// Anything a sink can deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delivery {
    /// Injected message
    Message(InjectedMessage),
    /// Error report
    Error(ErrorReport),
}

/// Sink backed by tokio channels.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    messages: mpsc::Sender<InjectedMessage>,
    errors: mpsc::UnboundedSender<ErrorReport>,
}

/// Receiving ends of a [`ChannelSink`].
#[derive(Debug)]
pub struct SinkReceivers {
    /// Injected messages; bounded by the sink capacity
    pub messages: mpsc::Receiver<InjectedMessage>,
    /// Error-sequence reports
    pub errors: mpsc::UnboundedReceiver<ErrorReport>,
}

impl ChannelSink {
    /// Create a sink holding at most `capacity` undelivered messages, and
    /// the receivers the pipeline reads from.
    pub fn new(capacity: usize) -> (Self, SinkReceivers) {
        let (messages, message_rx) = mpsc::channel(capacity);
        let (errors, error_rx) = mpsc::unbounded_channel();
        (
            Self { messages, errors },
            SinkReceivers {
                messages: message_rx,
                errors: error_rx,
            },
        )
    }
}

impl InjectionSink for ChannelSink {
    fn inject(&self, payload: &str, content_type: &str, sequence: &str) -> Result<()> {
        let message = InjectedMessage {
            payload: payload.to_string(),
            content_type: content_type.to_string(),
            sequence: sequence.to_string(),
        };
        self.messages.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                InboundError::Injection(format!("sequence {sequence} is not accepting messages"))
            }
            mpsc::error::TrySendError::Closed(_) => {
                InboundError::Injection(format!("sequence {sequence} is closed"))
            }
        })
    }

    fn on_error(&self, message: &str, error_sequence: &str) {
        let report = ErrorReport {
            message: message.to_string(),
            sequence: error_sequence.to_string(),
        };
        if self.errors.send(report).is_err() {
            tracing::warn!(sequence = %error_sequence, "error sequence is closed, report dropped");
        }
    }
}

/// Sink writing JSON lines to a writer (stdout in the CLI).
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    fn write(&self, delivery: &Delivery) -> Result<()> {
        let line = serde_json::to_string(delivery)
            .map_err(|e| InboundError::Injection(format!("failed to encode delivery: {e}")))?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| InboundError::Injection("writer lock poisoned".to_string()))?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> InjectionSink for JsonLinesSink<W> {
    fn inject(&self, payload: &str, content_type: &str, sequence: &str) -> Result<()> {
        self.write(&Delivery::Message(InjectedMessage {
            payload: payload.to_string(),
            content_type: content_type.to_string(),
            sequence: sequence.to_string(),
        }))
    }

    fn on_error(&self, message: &str, error_sequence: &str) {
        let report = Delivery::Error(ErrorReport {
            message: message.to_string(),
            sequence: error_sequence.to_string(),
        });
        if let Err(e) = self.write(&report) {
            tracing::warn!(sequence = %error_sequence, "failed to write error report: {e}");
        }
    }
}
