//! WebSocket Sessions
//!
//! Real-time tutoring over a WebSocket:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle, from handshake to termination.
//! - `turn`: Runs one turn and maps its outcome to outgoing messages.

pub mod protocol;
pub mod session;
mod turn;

pub use session::ws_handler;
