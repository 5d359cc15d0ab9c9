//! HTTP/WebSocket client and server, and the Socket.IO + Symple presence
//! and signaling client layered on top of them.

pub mod error;
pub mod http;
pub mod signaling;
pub mod sockio;
pub mod symple;
pub mod ws;

pub use error::{Error, Result};
