//! Broadcast chat relay library
//!
//! A central relay accepts many simultaneous TCP connections, assigns each a
//! unique display name through a handshake, and broadcasts text messages and
//! membership events to all connected clients.
//!
//! # Architecture
//! - `message` / `codec`: the typed message and its length-prefixed JSON wire
//!   framing, shared by server and client
//! - `connection`: thread-safe framed send/receive over one TCP stream
//! - `registry`: concurrent display-name -> connection mapping
//! - `relay`: best-effort broadcast to every registered connection
//! - `server`: accept loop plus per-connection session state machine
//! - `client`: callback-configured client session with one-shot startup
//!   signaling
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use chat_relay::ChatServer;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:7000").await?;
//!     ChatServer::new().run(listener).await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod connection;
pub mod console;
pub mod error;
pub mod message;
pub mod registry;
pub mod relay;
pub mod server;

// Re-export main types for convenience
pub use client::{ChatClient, ClientEvents};
pub use connection::Connection;
pub use error::{ChatError, Result};
pub use message::{Message, MessageKind};
pub use registry::NameRegistry;
pub use relay::BroadcastRelay;
pub use server::ChatServer;
