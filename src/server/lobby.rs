//! Lobby: the top-level listener and room registry
//!
//! The lobby accepts one request per connection and understands a single
//! kind, `create`: spin up a room on the configured host, register it, and
//! hand the caller its address. Everything else gets the unknown-request
//! error. Clients then talk to rooms directly.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::protocol::codec;
use crate::protocol::messages::{
    BaseRequest, ClientId, CreateResponse, RequestKind, RoomId, StatusResponse,
};
use crate::server::room::Room;

/// The top-level service that creates rooms on demand
#[derive(Debug)]
pub struct Lobby {
    config: RelayConfig,
    addr: SocketAddr,
    rooms: RwLock<HashMap<RoomId, Arc<Room>>>,
    admission: Arc<Semaphore>,
    shutdown: CancellationToken,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl Lobby {
    /// Bind the lobby listener and start accepting.
    ///
    /// Bind failures are fatal to startup and propagate to the caller.
    pub async fn open(config: RelayConfig) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let addr = listener.local_addr()?;

        let lobby = Arc::new(Self {
            admission: Arc::new(Semaphore::new(config.max_connections)),
            config,
            addr,
            rooms: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            accept_task: Mutex::new(None),
        });

        info!("lobby listening on {}", addr);
        let task = tokio::spawn(Arc::clone(&lobby).accept_loop(listener));
        *lobby.accept_task.lock().await = Some(task);

        Ok(lobby)
    }

    /// Bound lobby address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether the lobby has stopped accepting connections
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Look up a room by identifier.
    ///
    /// The registry keeps stale entries: this can return a room that has
    /// already emptied and closed its listener.
    pub async fn room(&self, id: RoomId) -> Option<Arc<Room>> {
        self.rooms.read().await.get(&id).cloned()
    }

    /// Number of rooms ever registered
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Stop accepting new connections and wait for the accept loop to exit.
    ///
    /// Rooms already created keep running until their membership empties or
    /// the process exits.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let task = self.accept_task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("lobby accept task failed to join: {}", e);
            }
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("lobby accept failed: {}", e);
                            break;
                        }
                    };
                    let Ok(permit) = Arc::clone(&self.admission).try_acquire_owned() else {
                        warn!("lobby at connection limit, dropping {}", peer);
                        continue;
                    };
                    debug!("lobby connection from {}", peer);
                    let lobby = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = lobby.handle_connection(stream).await {
                            warn!("lobby connection handling failed: {}", e);
                        }
                    });
                }
            }
        }
        // Dropping the listener here closes the socket.
        info!("lobby listener closed");
    }

    /// Handle exactly one request on an accepted connection.
    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let frame = codec::read_frame(&mut stream).await?;
        let payload = codec::trim_frame(&frame);

        let base: BaseRequest = match codec::decode(payload) {
            Ok(base) => base,
            Err(e) => {
                warn!("lobby dropping undecodable request: {}", e);
                return Ok(());
            }
        };

        match base.kind {
            RequestKind::Create => self.handle_create(&mut stream, base.id).await,
            kind => {
                warn!("lobby unknown request kind {:?} from {}", kind, base.id);
                codec::write_response(&mut stream, &StatusResponse::unknown_request()).await
            }
        }
    }

    async fn handle_create(&self, stream: &mut TcpStream, creator: ClientId) -> Result<()> {
        let room = Room::open(&self.config.host, creator, self.config.max_connections).await?;

        // Registered for good: entries are never pruned, even after a room
        // empties and closes its listener.
        self.rooms
            .write()
            .await
            .insert(room.id(), Arc::clone(&room));
        info!(
            "lobby created room {} at {} for {}",
            room.id(),
            room.addr(),
            creator
        );

        codec::write_response(stream, &CreateResponse::ok(room.addr().to_string())).await
    }
}
