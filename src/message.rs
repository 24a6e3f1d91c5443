//! Message protocol definitions
//!
//! A `Message` is the unit of exchange between client and server: a kind tag
//! plus an optional text payload. Serialized with Serde using snake_case tags
//! so both sides agree on one wire representation.

use serde::{Deserialize, Serialize};

/// The kind of a protocol message
///
/// The handshake kinds (`NameRequest`, `UserName`, `NameAccepted`) establish a
/// client's display name; the remaining kinds carry chat traffic and
/// membership events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Server asks the client for a display name (data = prompt text)
    NameRequest,
    /// Client supplies a candidate name (data = name)
    UserName,
    /// Server confirms the name (data = confirmation text)
    NameAccepted,
    /// Broadcast: a user joined or is already present (data = that user's name)
    UserAdded,
    /// Broadcast: a user left (data = that user's name)
    UserRemoved,
    /// Chat text (data = message body, sender-prefixed by the server on relay)
    Text,
}

/// An immutable protocol message
///
/// Copied by value across the wire; has no identity beyond its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message kind
    pub kind: MessageKind,
    /// Optional text payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Message {
    /// Create a message with the given kind and payload
    pub fn new(kind: MessageKind, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: Some(data.into()),
        }
    }

    /// Create a message with no payload
    pub fn empty(kind: MessageKind) -> Self {
        Self { kind, data: None }
    }

    /// Server prompt for a display name
    pub fn name_request(prompt: impl Into<String>) -> Self {
        Self::new(MessageKind::NameRequest, prompt)
    }

    /// Client's candidate display name
    pub fn user_name(name: impl Into<String>) -> Self {
        Self::new(MessageKind::UserName, name)
    }

    /// Server confirmation that a name was accepted
    pub fn name_accepted(text: impl Into<String>) -> Self {
        Self::new(MessageKind::NameAccepted, text)
    }

    /// Membership event: a user joined or is already present
    pub fn user_added(name: impl Into<String>) -> Self {
        Self::new(MessageKind::UserAdded, name)
    }

    /// Membership event: a user left
    pub fn user_removed(name: impl Into<String>) -> Self {
        Self::new(MessageKind::UserRemoved, name)
    }

    /// Chat text
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(MessageKind::Text, body)
    }

    /// The text payload, or `""` if absent
    pub fn data(&self) -> &str {
        self.data.as_deref().unwrap_or_default()
    }
}
