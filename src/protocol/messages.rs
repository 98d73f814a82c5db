//! Wire message types for the chat relay
//!
//! Every request carries a common envelope (`type` + client `id`); the
//! kind-specific records re-read the same JSON with their extra fields.
//! Responses are a bare status, plus the room address for `create`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client identity carried in every request
pub type ClientId = Uuid;
/// Room identifier, derived from the port its listener binds
pub type RoomId = u16;

/// Status line of a successful response
pub const STATUS_OK: &str = "ok";
/// Status line returned for an unrecognized request kind
pub const STATUS_UNKNOWN_REQUEST: &str = "error: unknown request";

/// Request kinds understood by the lobby and rooms.
///
/// Anything else decodes to `Unknown` so it can be answered with an explicit
/// error instead of failing the envelope decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum RequestKind {
    Create,
    Connect,
    Disconnect,
    Send,
    Unknown,
}

impl From<String> for RequestKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "create" => RequestKind::Create,
            "connect" => RequestKind::Connect,
            "disconnect" => RequestKind::Disconnect,
            "send" => RequestKind::Send,
            _ => RequestKind::Unknown,
        }
    }
}

/// Common request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseRequest {
    /// Request kind
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Client identity
    pub id: ClientId,
}

impl BaseRequest {
    pub fn new(kind: RequestKind, id: ClientId) -> Self {
        Self { kind, id }
    }
}

/// Join a room, registering a callback address for relayed messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Client identity
    pub id: ClientId,
    /// Callback address (`host:port`) the room will push messages to
    pub addr: String,
}

impl ConnectRequest {
    pub fn new(id: ClientId, addr: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Connect,
            id,
            addr: addr.into(),
        }
    }
}

/// Relay a chat message to the other members of a room.
///
/// The same record is what members receive on their callback connections;
/// the room overwrites `addr` with the sender's registered callback address
/// before fanning it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Client identity
    pub id: ClientId,
    /// Sender address; client-claimed on the way in, server-recorded on the
    /// way out
    pub addr: String,
    /// Message text
    pub message: String,
    /// Client-supplied date string, relayed untouched
    pub date: String,
}

impl SendRequest {
    pub fn new(
        id: ClientId,
        addr: impl Into<String>,
        message: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            kind: RequestKind::Send,
            id,
            addr: addr.into(),
            message: message.into(),
            date: date.into(),
        }
    }
}

/// Plain response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Free-text status: `ok` or `error: …`
    pub status: String,
}

impl StatusResponse {
    /// Successful response
    pub fn ok() -> Self {
        Self {
            status: STATUS_OK.to_string(),
        }
    }

    /// Error response with an `error: ` prefix
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            status: format!("error: {}", msg.into()),
        }
    }

    /// The response for an unrecognized request kind
    pub fn unknown_request() -> Self {
        Self {
            status: STATUS_UNKNOWN_REQUEST.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Response to `create`, carrying the new room's address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResponse {
    /// Free-text status
    pub status: String,
    /// Bound address (`host:port`) of the new room's listener
    pub addr: String,
}

impl CreateResponse {
    pub fn ok(addr: impl Into<String>) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            addr: addr.into(),
        }
    }
}

/// One relayed chat message as recorded in a room's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender's registered callback address
    pub from: String,
    /// Message text
    pub text: String,
    /// Date string as supplied by the sender
    pub date: String,
}
