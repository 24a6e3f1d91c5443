//! Chat relay client - entry point
//!
//! Prompts for the server address, port, and a display name, connects, then
//! forwards console lines as chat text until the user enters `exit`.

use tokio::task;
use tracing_subscriber::EnvFilter;

use chat_relay::{console, ChatClient, ClientEvents};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=warn")),
        )
        .init();

    console::write_line("Enter the server address:");
    let address = task::spawn_blocking(console::read_line).await?;
    console::write_line("Enter the server port:");
    let port = task::spawn_blocking(console::read_integer).await?;
    console::write_line("Enter your display name:");
    let name = task::spawn_blocking(console::read_line).await?;

    let client = match ChatClient::connect((address.as_str(), port), ClientEvents::console(name)).await
    {
        Ok(client) => client,
        Err(err) => {
            console::write_line(&format!("Could not connect: {}", err));
            return Ok(());
        }
    };
    console::write_line("Connection established. Type 'exit' to quit.");

    // Foreground loop: console input runs concurrently with the receive task
    while client.is_connected() {
        let line = task::spawn_blocking(console::read_line).await?;
        if line == "exit" {
            break;
        }
        if client.send_text(&line).await.is_err() {
            break;
        }
    }

    client.close().await;
    Ok(())
}
