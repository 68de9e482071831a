//! The `client` module defines the server-side representation of a connected
//! peer: its identity, its bounded outbound queue and its close-once gate.

pub mod endpoint;

pub use endpoint::{Endpoint, Enqueue};
