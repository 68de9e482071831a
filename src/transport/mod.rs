//! The `transport` module is responsible for network communication with
//! peers over WebSocket.
//!
//! It defines the envelope exchanged on the wire, the inbound and outbound
//! pumps bound to each connection, and the server that accepts peers and
//! spawns those pumps.

pub mod inbound;
pub mod message;
pub mod outbound;
pub mod websocket;

pub use message::{Action, Envelope};
pub use websocket::{serve, start_websocket_server};
