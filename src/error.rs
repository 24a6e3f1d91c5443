//! Error types for the chat relay
//!
//! One error enum shared by server and client code paths.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::message::MessageKind;

/// Convenience result alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors produced by the connection, codec and session layers
///
/// A name conflict during the handshake is not represented here: it is fully
/// recovered locally by re-prompting, so the registry reports it as the `bool`
/// result of `try_register` instead of an error.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Stream failure: disconnect, reset, interrupted read/write
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes on the wire do not decode to a valid message
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Peer closed the stream cleanly at a frame boundary
    #[error("end of stream")]
    EndOfStream,

    /// The connection was closed locally while an operation was in flight
    #[error("connection closed")]
    ConnectionClosed,

    /// A message of unexpected kind arrived for the current protocol state
    #[error("protocol violation: unexpected {kind:?} while {state}")]
    ProtocolViolation {
        /// Human-readable state name ("handshaking", "active", ...)
        state: &'static str,
        /// The offending message kind
        kind: MessageKind,
    },
}

impl ChatError {
    /// True for conditions that mean the peer is gone and the session is over
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ChatError::Io(_) | ChatError::EndOfStream | ChatError::ConnectionClosed
        )
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::MalformedMessage(err.to_string())
    }
}
