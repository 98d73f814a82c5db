//! Protocol layer for the chat relay
//!
//! This module provides:
//! - Request/response message definitions
//! - The bounded-read framing and JSON codec

pub mod codec;
pub mod messages;

// Re-export commonly used types
pub use codec::{decode, read_frame, relay_request, trim_frame, write_response, MAX_REQUEST_BYTES};
pub use messages::*;
