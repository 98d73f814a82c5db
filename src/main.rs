//! TCP Chat Relay
//!
//! The lobby binds the address configured through TCP_SERVER_HOST and
//! TCP_SERVER_PORT (default 127.0.0.1:8000) and hands out rooms on
//! ephemeral ports. SIGINT or SIGTERM closes the lobby listener; rooms
//! live on until they empty.
//!
//! Usage:
//!   cargo run
//!   TCP_SERVER_PORT=9000 cargo run
//!   RUST_LOG=debug cargo run

use parlor::{App, RelayConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = RelayConfig::from_env()?;
    info!("Starting chat relay on {}", config.bind_addr());

    let app = App::start(config).await?;
    app.run_until_signal().await?;

    info!("Shutdown complete");
    Ok(())
}
