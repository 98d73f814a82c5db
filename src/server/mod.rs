//! TCP chat relay server implementation
//!
//! Two services share the one-request-per-connection dispatch shape:
//!
//! - **Lobby**: bound at startup, creates rooms on demand and hands back
//!   their addresses.
//! - **Room**: bound to an ephemeral port per room, tracks membership and
//!   fans messages out to member callback addresses.

pub mod lobby;
pub mod room;

pub use lobby::Lobby;
pub use room::Room;
