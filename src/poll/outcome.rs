//! Receive classification.

use serde::Serialize;

use crate::transport::{MqError, MqMessage, ReasonCode};

/// Result of one receive attempt, consumed within the same tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// A message body decoded as text
    Message(String),
    /// Queue empty; a normal poll, not an error
    NoMessageAvailable,
    /// Transport dropped; the session is dead
    ConnectionBroken {
        /// Transport detail
        detail: String,
    },
    /// Anything else; may be transient or message-specific
    OtherError {
        /// Queue-manager reason code
        reason: ReasonCode,
        /// Transport detail
        detail: String,
    },
}

impl ReceiveOutcome {
    /// Classify a raw get result.
    ///
    /// 2009 means the connection is gone, 2033 means the queue is empty, and
    /// every other code is left to the caller to report. A body that is not
    /// UTF-8 becomes a 2110 format error; it has already left the queue.
    pub fn classify(result: Result<MqMessage, MqError>) -> Self {
        match result {
            Ok(message) => match String::from_utf8(message.body) {
                Ok(text) => Self::Message(text),
                Err(e) => Self::OtherError {
                    reason: ReasonCode::FORMAT_ERROR,
                    detail: format!(
                        "message {} is not valid UTF-8: {}",
                        message.message_id,
                        e.utf8_error()
                    ),
                },
            },
            Err(e) if e.reason == ReasonCode::CONNECTION_BROKEN => {
                Self::ConnectionBroken { detail: e.detail }
            }
            Err(e) if e.reason == ReasonCode::NO_MSG_AVAILABLE => Self::NoMessageAvailable,
            Err(e) => Self::OtherError {
                reason: e.reason,
                detail: e.detail,
            },
        }
    }
}

/// What a single poll tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    /// Was disconnected and the connect attempt failed; nothing received
    ConnectFailed,
    /// Queue was empty
    Empty,
    /// A message was handed to the injection sequence
    Injected,
    /// A message was received but could not be injected; it is not re-queued
    InjectionFailed,
    /// The connection broke during receive
    ConnectionLost,
    /// Receive failed with a non-fatal reason code
    ReceiveFailed,
}
