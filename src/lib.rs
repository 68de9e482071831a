//! # topichub
//!
//! `topichub` is an in-memory, topic-based publish/subscribe broker served
//! over WebSocket. Peers subscribe to named topics, publish arbitrary JSON
//! payloads to a topic, and receive a copy of everything published on the
//! topics they follow.
//!
//! ## Core Modules
//!
//! - `broker`: the `Hub`, the topic registry shared by every connection.
//! - `client`: the `Endpoint` representing one connected peer and its outbound queue.
//! - `config`: loading and validating server configuration.
//! - `transport`: the wire envelope, the per-connection pumps and the WebSocket server.
//! - `utils`: error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

pub use broker::Hub;
pub use client::Endpoint;
pub use config::Settings;
pub use transport::{Action, Envelope};
