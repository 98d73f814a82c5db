//! Room state machine: one listener, membership, history, message fan-out
//!
//! A room owns an ephemeral-port listener (the port doubles as the room id),
//! a membership map from client UUID to callback address, and an append-only
//! message history. It accepts one request per connection and shuts itself
//! down when its membership empties.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::protocol::codec;
use crate::protocol::messages::{
    BaseRequest, ChatMessage, ClientId, ConnectRequest, RequestKind, RoomId, SendRequest,
    StatusResponse,
};

/// Membership and history share one guard so a send fan-out is a single
/// critical section.
#[derive(Debug, Default)]
struct RoomState {
    members: HashMap<ClientId, SocketAddr>,
    history: Vec<ChatMessage>,
}

/// An independently listening chat room
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    addr: SocketAddr,
    creator: ClientId,
    state: Mutex<RoomState>,
    admission: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl Room {
    /// Bind a listener on an ephemeral port of `host` and start the room's
    /// accept loop. The bound port becomes the room id.
    ///
    /// The creator is recorded but not joined; it connects like any other
    /// client.
    pub async fn open(host: &str, creator: ClientId, max_connections: usize) -> Result<Arc<Self>> {
        let listener = TcpListener::bind((host, 0)).await?;
        let addr = listener.local_addr()?;

        let room = Arc::new(Self {
            id: addr.port(),
            addr,
            creator,
            state: Mutex::new(RoomState::default()),
            admission: Arc::new(Semaphore::new(max_connections)),
            shutdown: CancellationToken::new(),
        });

        info!("room {} listening on {}", room.id, room.addr);
        tokio::spawn(Arc::clone(&room).accept_loop(listener));

        Ok(room)
    }

    /// Room identifier (the port its listener bound)
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Bound listener address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// UUID of the client whose create request spawned this room
    pub fn creator(&self) -> ClientId {
        self.creator
    }

    /// Whether this room has stopped accepting connections
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Check if a client is a member
    pub async fn is_member(&self, client: ClientId) -> bool {
        self.state.lock().await.members.contains_key(&client)
    }

    /// Current member count
    pub async fn member_count(&self) -> usize {
        self.state.lock().await.members.len()
    }

    /// Registered callback address for a member
    pub async fn member_addr(&self, client: ClientId) -> Option<SocketAddr> {
        self.state.lock().await.members.get(&client).copied()
    }

    /// Snapshot of the append-only message history
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.state.lock().await.history.clone()
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("room {} accept failed: {}", self.id, e);
                            break;
                        }
                    };
                    let Ok(permit) = Arc::clone(&self.admission).try_acquire_owned() else {
                        warn!("room {} at connection limit, dropping {}", self.id, peer);
                        continue;
                    };
                    debug!("room {} connection from {}", self.id, peer);
                    let room = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = room.handle_connection(stream).await {
                            warn!("room {} connection handling failed: {}", room.id, e);
                        }
                    });
                }
            }
        }
        // Dropping the listener here closes the socket.
        info!("room {} listener closed", self.id);
    }

    /// Handle exactly one request on an accepted connection.
    ///
    /// Undecodable requests and requests from non-members are dropped with
    /// no response; the peer only sees the connection close.
    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let frame = codec::read_frame(&mut stream).await?;
        let payload = codec::trim_frame(&frame);

        let base: BaseRequest = match codec::decode(payload) {
            Ok(base) => base,
            Err(e) => {
                warn!("room {} dropping undecodable request: {}", self.id, e);
                return Ok(());
            }
        };

        if base.kind != RequestKind::Connect && !self.is_member(base.id).await {
            warn!(
                "room {} dropping {:?} request from non-member {}",
                self.id, base.kind, base.id
            );
            return Ok(());
        }

        match base.kind {
            RequestKind::Connect => self.handle_connect(&mut stream, payload).await,
            RequestKind::Disconnect => self.handle_disconnect(&mut stream, base.id).await,
            RequestKind::Send => self.handle_send(&mut stream, payload).await,
            RequestKind::Create | RequestKind::Unknown => {
                warn!("room {} unknown request kind from {}", self.id, base.id);
                codec::write_response(&mut stream, &StatusResponse::unknown_request()).await
            }
        }
    }

    async fn handle_connect(&self, stream: &mut TcpStream, payload: &[u8]) -> Result<()> {
        let req: ConnectRequest = codec::decode(payload)?;

        {
            let mut state = self.state.lock().await;
            if state.members.contains_key(&req.id) {
                // Already connected; not an error, but no reply either.
                debug!("room {} client {} already connected", self.id, req.id);
                return Ok(());
            }
            let Some(callback) = parse_callback_addr(&req.addr) else {
                warn!(
                    "room {} dropping connect with malformed callback address {:?}",
                    self.id, req.addr
                );
                return Ok(());
            };
            state.members.insert(req.id, callback);
            info!(
                "room {} client {} connected, callback {}",
                self.id, req.id, callback
            );
        }

        codec::write_response(stream, &StatusResponse::ok()).await
    }

    async fn handle_disconnect(&self, stream: &mut TcpStream, client: ClientId) -> Result<()> {
        let empty = {
            let mut state = self.state.lock().await;
            state.members.remove(&client);
            state.members.is_empty()
        };
        info!("room {} client {} disconnected", self.id, client);

        // The ok reply goes out before the listener starts closing.
        codec::write_response(stream, &StatusResponse::ok()).await?;

        if empty {
            info!("room {} is empty, shutting down", self.id);
            self.shutdown.cancel();
        }
        Ok(())
    }

    async fn handle_send(&self, stream: &mut TcpStream, payload: &[u8]) -> Result<()> {
        let req: SendRequest = codec::decode(payload)?;

        {
            let mut state = self.state.lock().await;
            // The membership gate ran before this lock was taken; the sender
            // may have been evicted in between.
            let Some(&sender) = state.members.get(&req.id) else {
                warn!(
                    "room {} dropping send from departed client {}",
                    self.id, req.id
                );
                return Ok(());
            };

            // The relayed copy carries the callback address recorded at
            // connect time, not whatever the client claimed.
            let relay = SendRequest::new(
                req.id,
                sender.to_string(),
                req.message.clone(),
                req.date.clone(),
            );

            let targets: Vec<(ClientId, SocketAddr)> = state
                .members
                .iter()
                .filter(|(member, _)| **member != req.id)
                .map(|(member, addr)| (*member, *addr))
                .collect();

            for (member, addr) in targets {
                if let Err(e) = codec::relay_request(addr, &relay).await {
                    warn!(
                        "room {} member {} unreachable ({}), evicting",
                        self.id, member, e
                    );
                    state.members.remove(&member);
                }
            }

            state.history.push(ChatMessage {
                from: sender.to_string(),
                text: req.message,
                date: req.date,
            });
        }

        codec::write_response(stream, &StatusResponse::ok()).await
    }
}

/// Split a `host:port` callback address on its last colon.
///
/// The host part must be an IP address; anything that fails to parse is
/// treated as malformed.
fn parse_callback_addr(raw: &str) -> Option<SocketAddr> {
    let (host, port) = raw.rsplit_once(':')?;
    let host: IpAddr = host.parse().ok()?;
    let port: u16 = port.parse().ok()?;
    Some(SocketAddr::new(host, port))
}
