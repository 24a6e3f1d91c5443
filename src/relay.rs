//! Best-effort broadcast relay
//!
//! Delivers one message to every currently registered connection. Delivery is
//! independent per recipient: a failed send is logged and the remaining
//! recipients still receive the message. No retry, no transactional guarantee.

use std::sync::Arc;

use tracing::warn;

use crate::message::Message;
use crate::registry::NameRegistry;

/// Fans a message out to every registered connection
#[derive(Debug, Clone)]
pub struct BroadcastRelay {
    registry: Arc<NameRegistry>,
}

impl BroadcastRelay {
    /// Create a relay over the given registry
    pub fn new(registry: Arc<NameRegistry>) -> Self {
        Self { registry }
    }

    /// Send `message` to every connection in a registry snapshot
    ///
    /// Per-recipient failures are reported and swallowed; they never abort
    /// delivery to the rest nor propagate to the caller.
    pub async fn broadcast(&self, message: &Message) {
        for (name, connection) in self.registry.snapshot() {
            if let Err(err) = connection.send(message).await {
                warn!("failed to deliver broadcast to '{}': {}", name, err);
            }
        }
    }
}
