//! Server: accept loop and per-connection session handler
//!
//! The server owns the name registry and the broadcast relay. Each accepted
//! connection gets its own spawned `SessionHandler` task that walks the
//! protocol: handshake (name negotiation), roster sync, then the relay loop.
//! Handler failures are isolated; one session's termination never affects
//! others or the accept loop.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::error::{ChatError, Result};
use crate::message::{Message, MessageKind};
use crate::registry::NameRegistry;
use crate::relay::BroadcastRelay;

/// Prompt sent with every name request
const NAME_PROMPT: &str = "Enter a display name.";

/// Confirmation sent once a name is registered
const NAME_ACCEPTED_TEXT: &str = "Name accepted.";

/// The central chat relay server
///
/// Holds the shared registry and relay; `run` accepts connections forever.
pub struct ChatServer {
    registry: Arc<NameRegistry>,
    relay: BroadcastRelay,
}

impl ChatServer {
    /// Create a server with an empty registry
    pub fn new() -> Self {
        let registry = Arc::new(NameRegistry::new());
        let relay = BroadcastRelay::new(Arc::clone(&registry));
        Self { registry, relay }
    }

    /// The shared name registry
    pub fn registry(&self) -> &Arc<NameRegistry> {
        &self.registry
    }

    /// Accept connections on `listener` until the process is killed
    ///
    /// A failure accepting an individual connection is reported and the loop
    /// continues; only the caller's failure to bind the listener is fatal.
    pub async fn run(&self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!("chat relay listening on {}", addr);
        }

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("incoming connection from {}", addr);
                    let connection = match Connection::new(stream) {
                        Ok(connection) => Arc::new(connection),
                        Err(err) => {
                            warn!("failed to wrap connection from {}: {}", addr, err);
                            continue;
                        }
                    };
                    let handler = SessionHandler {
                        connection,
                        registry: Arc::clone(&self.registry),
                        relay: self.relay.clone(),
                    };
                    tokio::spawn(handler.run());
                }
                Err(err) => {
                    error!("failed to accept connection: {}", err);
                }
            }
        }
    }
}

impl Default for ChatServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-connection protocol state machine
///
/// Handshaking -> Registered -> Relaying -> Terminated. One instance per
/// accepted connection, run on its own task.
struct SessionHandler {
    connection: Arc<Connection>,
    registry: Arc<NameRegistry>,
    relay: BroadcastRelay,
}

impl SessionHandler {
    async fn run(self) {
        let peer = self.connection.remote_addr();
        info!("connection established with {}", peer);

        let name = match self.handshake().await {
            Ok(name) => name,
            Err(err) => {
                debug!("handshake with {} aborted: {}", peer, err);
                self.connection.close().await;
                return;
            }
        };
        info!("'{}' joined from {}", name, peer);

        // Announce the newcomer to everyone - including, harmlessly, the
        // newcomer itself - then sync the existing roster to it.
        self.relay.broadcast(&Message::user_added(&name)).await;
        self.send_roster(&name).await;

        let err = self.relay_loop(&name).await;
        if err.is_disconnect() {
            info!("'{}' disconnected ({})", name, peer);
        } else {
            warn!("session of '{}' terminated: {}", name, err);
        }

        self.registry.unregister(&name);
        self.relay.broadcast(&Message::user_removed(&name)).await;
        self.connection.close().await;
        debug!("connection with {} closed", peer);
    }

    /// Negotiate a unique display name
    ///
    /// Re-prompts on anything that is not a well-formed, free candidate name:
    /// wrong message kind, empty data, or a name already registered. There is
    /// no bound on attempts; a stream failure ends the handshake.
    async fn handshake(&self) -> Result<String> {
        loop {
            self.connection
                .send(&Message::name_request(NAME_PROMPT))
                .await?;
            let reply = self.connection.receive().await?;

            let candidate = match (reply.kind, reply.data) {
                (MessageKind::UserName, Some(name)) if !name.is_empty() => name,
                _ => continue,
            };

            if !self.registry.try_register(&candidate, Arc::clone(&self.connection)) {
                debug!("name '{}' already taken, re-prompting", candidate);
                continue;
            }

            if let Err(err) = self
                .connection
                .send(&Message::name_accepted(NAME_ACCEPTED_TEXT))
                .await
            {
                // The name must not outlive a handshake that never completed
                self.registry.unregister(&candidate);
                return Err(err);
            }
            return Ok(candidate);
        }
    }

    /// Send the newcomer one `UserAdded` per other registered name
    ///
    /// Enumerates a registry snapshot; a user joining concurrently may or may
    /// not appear. Send failures are logged, not fatal - the relay loop will
    /// observe the dead connection shortly.
    async fn send_roster(&self, name: &str) {
        for (other, _) in self.registry.snapshot() {
            if other == name {
                continue;
            }
            if let Err(err) = self.connection.send(&Message::user_added(&other)).await {
                warn!("failed to send roster to '{}': {}", name, err);
                break;
            }
        }
    }

    /// Relay text messages until the connection fails
    ///
    /// Returns the terminal error. Non-text messages are reported locally and
    /// skipped; they never end the session.
    async fn relay_loop(&self, name: &str) -> ChatError {
        loop {
            let message = match self.connection.receive().await {
                Ok(message) => message,
                Err(err) => return err,
            };
            match message.kind {
                MessageKind::Text => {
                    let line = format!("{}: {}", name, message.data());
                    self.relay.broadcast(&Message::text(line)).await;
                }
                other => {
                    debug!("ignoring {:?} from '{}' in relay loop", other, name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    async fn start_server() -> (std::net::SocketAddr, Arc<ChatServer>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(ChatServer::new());
        let runner = Arc::clone(&server);
        tokio::spawn(async move { runner.run(listener).await });
        (addr, server)
    }

    async fn dial(addr: std::net::SocketAddr) -> Connection {
        let stream = TcpStream::connect(addr).await.unwrap();
        Connection::new(stream).unwrap()
    }

    async fn recv(connection: &Connection) -> Message {
        timeout(Duration::from_secs(2), connection.receive())
            .await
            .expect("timed out waiting for message")
            .expect("receive failed")
    }

    #[tokio::test]
    async fn test_handshake_accepts_valid_name() {
        let (addr, server) = start_server().await;
        let conn = dial(addr).await;

        assert_eq!(recv(&conn).await.kind, MessageKind::NameRequest);
        conn.send(&Message::user_name("alice")).await.unwrap();
        assert_eq!(recv(&conn).await.kind, MessageKind::NameAccepted);
        assert!(server.registry().contains("alice"));
    }

    #[tokio::test]
    async fn test_handshake_reprompts_on_wrong_kind_and_empty_name() {
        let (addr, server) = start_server().await;
        let conn = dial(addr).await;

        assert_eq!(recv(&conn).await.kind, MessageKind::NameRequest);
        conn.send(&Message::text("not a name")).await.unwrap();
        assert_eq!(recv(&conn).await.kind, MessageKind::NameRequest);

        conn.send(&Message::new(MessageKind::UserName, ""))
            .await
            .unwrap();
        assert_eq!(recv(&conn).await.kind, MessageKind::NameRequest);

        conn.send(&Message::user_name("bob")).await.unwrap();
        assert_eq!(recv(&conn).await.kind, MessageKind::NameAccepted);
        assert!(server.registry().contains("bob"));
    }

    #[tokio::test]
    async fn test_handshake_reprompts_when_name_taken() {
        let (addr, _server) = start_server().await;

        let first = dial(addr).await;
        assert_eq!(recv(&first).await.kind, MessageKind::NameRequest);
        first.send(&Message::user_name("carol")).await.unwrap();
        assert_eq!(recv(&first).await.kind, MessageKind::NameAccepted);

        let second = dial(addr).await;
        assert_eq!(recv(&second).await.kind, MessageKind::NameRequest);
        second.send(&Message::user_name("carol")).await.unwrap();
        // Conflict is recovered locally: the server asks again
        assert_eq!(recv(&second).await.kind, MessageKind::NameRequest);

        second.send(&Message::user_name("carol2")).await.unwrap();
        assert_eq!(recv(&second).await.kind, MessageKind::NameAccepted);
    }

    #[tokio::test]
    async fn test_non_text_message_does_not_end_session() {
        let (addr, server) = start_server().await;
        let conn = dial(addr).await;

        assert_eq!(recv(&conn).await.kind, MessageKind::NameRequest);
        conn.send(&Message::user_name("dave")).await.unwrap();
        assert_eq!(recv(&conn).await.kind, MessageKind::NameAccepted);
        // Join broadcast echoes back to the sender itself
        assert_eq!(recv(&conn).await, Message::user_added("dave"));

        // A stray handshake message mid-session is reported locally, not fatal
        conn.send(&Message::user_name("sneaky")).await.unwrap();
        conn.send(&Message::text("still here")).await.unwrap();
        assert_eq!(recv(&conn).await, Message::text("dave: still here"));
        assert!(server.registry().contains("dave"));
        assert!(!server.registry().contains("sneaky"));
    }
}
