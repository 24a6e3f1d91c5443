//! Chat relay server - entry point
//!
//! Prompts for a listening port, binds, and accepts connections until the
//! process is killed.

use tokio::net::TcpListener;
use tokio::task;
use tracing_subscriber::EnvFilter;

use chat_relay::{console, ChatServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level,
    // e.g. RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    console::write_line("Enter the listening port:");
    let port = task::spawn_blocking(console::read_integer).await?;

    // Failure to bind is fatal for the whole process
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    console::write_line("Server started.");

    ChatServer::new().run(listener).await;
    Ok(())
}
