//! TCP-based multi-room chat relay with JSON requests
//!
//! A lobby service accepts "create room" requests and spins up independent
//! room services; each room accepts client connections, tracks membership,
//! and relays chat messages among members over per-member callback
//! connections. Every request rides its own TCP connection and is answered
//! (or deliberately not answered) before the connection closes.

pub mod app;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;

pub use app::App;
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use server::{Lobby, Room};
