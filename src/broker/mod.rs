//! Composition root of the real-time layer: accepts connections, runs the
//! session handshake, and wires authenticated connections into the registry.

mod handshake;
mod message;
mod ws;

pub use handshake::{authenticate, await_join, HandshakeError};
pub use message::{ClientMessage, OutboundMessage, ServerMessage};
pub use ws::ws_handler;
