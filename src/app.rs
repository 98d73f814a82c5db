//! Application lifecycle: start the lobby, wait for a signal, stop it
//!
//! Shutdown closes only the lobby listener. Rooms already created keep
//! serving until their membership empties or the process exits.

use std::sync::Arc;

use tracing::info;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::server::Lobby;

/// The running relay application
#[derive(Debug)]
pub struct App {
    lobby: Arc<Lobby>,
}

impl App {
    /// Bind the lobby and start serving. Startup failures propagate so the
    /// process can abort.
    pub async fn start(config: RelayConfig) -> Result<Self> {
        let lobby = Lobby::open(config).await?;
        Ok(Self { lobby })
    }

    /// The lobby this app is serving
    pub fn lobby(&self) -> &Arc<Lobby> {
        &self.lobby
    }

    /// Block until SIGTERM/SIGINT, then shut the lobby down.
    pub async fn run_until_signal(&self) -> Result<()> {
        wait_for_shutdown_signal().await?;
        self.stop().await;
        Ok(())
    }

    /// Gracefully stop accepting lobby connections.
    pub async fn stop(&self) {
        info!("stopping lobby");
        self.lobby.close().await;
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl-C elsewhere).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("received Ctrl-C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{BaseRequest, CreateResponse, RequestKind};
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use uuid::Uuid;

    fn test_config() -> RelayConfig {
        RelayConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_connections: 64,
        }
    }

    #[tokio::test]
    async fn test_stop_closes_lobby_but_not_rooms() {
        let app = App::start(test_config()).await.unwrap();
        let lobby_addr = app.lobby().addr();

        // Create one room through the wire.
        let req = BaseRequest::new(RequestKind::Create, Uuid::new_v4());
        let mut stream = TcpStream::connect(lobby_addr).await.unwrap();
        stream
            .write_all(&serde_json::to_vec(&req).unwrap())
            .await
            .unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        let created: CreateResponse = serde_json::from_slice(&response).unwrap();
        let room_addr: SocketAddr = created.addr.parse().unwrap();

        app.stop().await;

        // The lobby is gone, the room keeps listening.
        assert!(TcpStream::connect(lobby_addr).await.is_err());
        assert!(TcpStream::connect(room_addr).await.is_ok());
    }
}
