//! Client session handler
//!
//! Mirrors the server handshake and message loop from the client's side.
//! Variant clients are composed, not subclassed: behavior is configured
//! through a small set of callback values (`ClientEvents`). The receive loop
//! runs on its own task; `connect` blocks the initiating caller on a one-shot
//! signal the session resolves exactly once with the handshake outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::connection::Connection;
use crate::console;
use crate::error::{ChatError, Result};
use crate::message::{Message, MessageKind};

/// Callback invoked with the text payload of an incoming event
pub type EventHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Callback invoked when the connection status changes
pub type StatusHandler = Box<dyn Fn(bool) + Send + Sync>;

/// Supplies a candidate display name for each server prompt
pub type NameProvider = Box<dyn Fn() -> String + Send + Sync>;

/// Strategy values configuring a client session
///
/// `on_text` receives chat lines (already sender-prefixed by the server),
/// `on_user_added` / `on_user_removed` receive the affected user's name, and
/// `on_status_changed` fires once on connect and once on disconnect.
pub struct ClientEvents {
    pub on_text: EventHandler,
    pub on_user_added: EventHandler,
    pub on_user_removed: EventHandler,
    pub on_status_changed: StatusHandler,
    pub name_provider: NameProvider,
}

impl ClientEvents {
    /// Interactive defaults: print to the console, answer name prompts with
    /// the given name
    pub fn console(name: String) -> Self {
        Self {
            on_text: Box::new(|line| console::write_line(line)),
            on_user_added: Box::new(|name| {
                console::write_line(&format!("{} joined the chat.", name))
            }),
            on_user_removed: Box::new(|name| {
                console::write_line(&format!("{} left the chat.", name))
            }),
            on_status_changed: Box::new(|connected| {
                if !connected {
                    console::write_line("Disconnected from the server.");
                }
            }),
            name_provider: Box::new(move || name.clone()),
        }
    }
}

/// A connected chat client
///
/// Holds the connection for the foreground send path while the background
/// session task receives and dispatches broadcast messages.
#[derive(Debug)]
pub struct ChatClient {
    connection: Arc<Connection>,
    connected: Arc<AtomicBool>,
    session: JoinHandle<()>,
}

impl ChatClient {
    /// Dial the server and complete the name handshake
    ///
    /// Spawns the session task, then awaits its one-shot completion signal:
    /// `Ok` once the server accepts a name, `Err` if dialing or the handshake
    /// fails. Failure here is terminal for the session.
    pub async fn connect(addr: impl ToSocketAddrs, events: ClientEvents) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let connection = Arc::new(Connection::new(stream)?);
        let connected = Arc::new(AtomicBool::new(false));

        let (ready_tx, ready_rx) = oneshot::channel();
        let session = tokio::spawn(run_session(
            Arc::clone(&connection),
            Arc::clone(&connected),
            events,
            ready_tx,
        ));

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                connection,
                connected,
                session,
            }),
            Ok(Err(err)) => Err(err),
            // Session task dropped the sender without resolving
            Err(_) => Err(ChatError::ConnectionClosed),
        }
    }

    /// Send one line of chat text to the server
    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.connection.send(&Message::text(text)).await
    }

    /// Whether the session is still active
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Close the connection and wait for the session task to finish
    pub async fn close(self) {
        self.connection.close().await;
        let _ = self.session.await;
    }
}

/// Background session: handshake, resolve the ready signal, then dispatch
/// incoming messages until the stream fails.
async fn run_session(
    connection: Arc<Connection>,
    connected: Arc<AtomicBool>,
    events: ClientEvents,
    ready_tx: oneshot::Sender<Result<()>>,
) {
    let outcome = handshake(&connection, &events).await;
    let accepted = outcome.is_ok();
    connected.store(accepted, Ordering::SeqCst);
    let _ = ready_tx.send(outcome);

    if !accepted {
        (events.on_status_changed)(false);
        connection.close().await;
        return;
    }
    (events.on_status_changed)(true);

    let err = active_loop(&connection, &events).await;
    if err.is_disconnect() {
        debug!("session ended: {}", err);
    } else {
        debug!("session terminated by protocol failure: {}", err);
    }

    connected.store(false, Ordering::SeqCst);
    (events.on_status_changed)(false);
    connection.close().await;
}

/// Handshake loop: answer name prompts until the server accepts one
async fn handshake(connection: &Connection, events: &ClientEvents) -> Result<()> {
    loop {
        let message = connection.receive().await?;
        match message.kind {
            MessageKind::NameRequest => {
                let name = (events.name_provider)();
                connection.send(&Message::user_name(name)).await?;
            }
            MessageKind::NameAccepted => return Ok(()),
            kind => {
                return Err(ChatError::ProtocolViolation {
                    state: "handshaking",
                    kind,
                })
            }
        }
    }
}

/// Active loop: dispatch broadcast messages to the configured callbacks
///
/// Returns the terminal error; any kind outside the broadcast set is a
/// protocol violation.
async fn active_loop(connection: &Connection, events: &ClientEvents) -> ChatError {
    loop {
        let message = match connection.receive().await {
            Ok(message) => message,
            Err(err) => return err,
        };
        match message.kind {
            MessageKind::Text => (events.on_text)(message.data()),
            MessageKind::UserAdded => (events.on_user_added)(message.data()),
            MessageKind::UserRemoved => (events.on_user_removed)(message.data()),
            kind => {
                return ChatError::ProtocolViolation {
                    state: "active",
                    kind,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    /// Events wired to channels so tests can observe every callback
    fn recording_events(
        name: &str,
    ) -> (
        ClientEvents,
        mpsc::UnboundedReceiver<String>,
        mpsc::UnboundedReceiver<bool>,
    ) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let name = name.to_string();

        let text_tx = event_tx.clone();
        let added_tx = event_tx.clone();
        let removed_tx = event_tx;
        let events = ClientEvents {
            on_text: Box::new(move |line| {
                let _ = text_tx.send(format!("text:{line}"));
            }),
            on_user_added: Box::new(move |name| {
                let _ = added_tx.send(format!("added:{name}"));
            }),
            on_user_removed: Box::new(move |name| {
                let _ = removed_tx.send(format!("removed:{name}"));
            }),
            on_status_changed: Box::new(move |connected| {
                let _ = status_tx.send(connected);
            }),
            name_provider: Box::new(move || name.clone()),
        };
        (events, event_rx, status_rx)
    }

    async fn scripted_server() -> (std::net::SocketAddr, tokio::task::JoinHandle<Connection>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            Connection::new(stream).unwrap()
        });
        (addr, accept)
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for callback")
            .expect("callback channel closed")
    }

    #[tokio::test]
    async fn test_connect_completes_handshake() {
        let (addr, accept) = scripted_server().await;
        let (events, _event_rx, mut status_rx) = recording_events("alice");

        let server = tokio::spawn(async move {
            let conn = accept.await.unwrap();
            conn.send(&Message::name_request("name?")).await.unwrap();
            let reply = conn.receive().await.unwrap();
            assert_eq!(reply, Message::user_name("alice"));
            conn.send(&Message::name_accepted("ok")).await.unwrap();
            conn
        });

        let client = ChatClient::connect(addr, events).await.unwrap();
        assert!(client.is_connected());
        assert!(next(&mut status_rx).await);

        let _conn = server.await.unwrap();
        client.close().await;
    }

    #[tokio::test]
    async fn test_handshake_reprompts_until_accepted() {
        let (addr, accept) = scripted_server().await;
        let (events, _event_rx, _status_rx) = recording_events("bob");

        let server = tokio::spawn(async move {
            let conn = accept.await.unwrap();
            // Reject the first candidate by asking again
            conn.send(&Message::name_request("name?")).await.unwrap();
            assert_eq!(conn.receive().await.unwrap(), Message::user_name("bob"));
            conn.send(&Message::name_request("taken, name?")).await.unwrap();
            assert_eq!(conn.receive().await.unwrap(), Message::user_name("bob"));
            conn.send(&Message::name_accepted("ok")).await.unwrap();
            conn
        });

        let client = ChatClient::connect(addr, events).await.unwrap();
        assert!(client.is_connected());
        let _conn = server.await.unwrap();
        client.close().await;
    }

    #[tokio::test]
    async fn test_unexpected_kind_during_handshake_is_violation() {
        let (addr, accept) = scripted_server().await;
        let (events, _event_rx, mut status_rx) = recording_events("carol");

        tokio::spawn(async move {
            let conn = accept.await.unwrap();
            conn.send(&Message::text("premature")).await.unwrap();
            // Hold the connection open so the failure is the protocol check
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(conn);
        });

        let err = ChatClient::connect(addr, events).await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::ProtocolViolation {
                state: "handshaking",
                kind: MessageKind::Text,
            }
        ));
        // The one-shot already carried the failure; status still fires once
        assert!(!next(&mut status_rx).await);
    }

    #[tokio::test]
    async fn test_active_loop_dispatches_and_signals_disconnect_once() {
        let (addr, accept) = scripted_server().await;
        let (events, mut event_rx, mut status_rx) = recording_events("dave");

        let server = tokio::spawn(async move {
            let conn = accept.await.unwrap();
            conn.send(&Message::name_request("name?")).await.unwrap();
            let _ = conn.receive().await.unwrap();
            conn.send(&Message::name_accepted("ok")).await.unwrap();

            conn.send(&Message::user_added("erin")).await.unwrap();
            conn.send(&Message::text("erin: hi")).await.unwrap();
            conn.send(&Message::user_removed("erin")).await.unwrap();
            conn
        });

        let client = ChatClient::connect(addr, events).await.unwrap();
        assert!(next(&mut status_rx).await);

        assert_eq!(next(&mut event_rx).await, "added:erin");
        assert_eq!(next(&mut event_rx).await, "text:erin: hi");
        assert_eq!(next(&mut event_rx).await, "removed:erin");

        // Server goes away; the session signals disconnected exactly once
        let conn = server.await.unwrap();
        drop(conn);
        assert!(!next(&mut status_rx).await);
        assert!(timeout(Duration::from_millis(200), status_rx.recv())
            .await
            .is_err());
        assert!(!client.is_connected());
        client.close().await;
    }
}
