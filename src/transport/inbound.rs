//! Inbound pump
//!
//! One task per connection runs `read_pump`; it is the only reader of the
//! connection. Each decoded envelope is applied to the hub in arrival order.
//!
//! The read deadline starts at `pong_wait` and is pushed back every time the
//! peer answers a heartbeat. A peer that stops answering is treated as gone.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use tungstenite::Message as WsMessage;
use tungstenite::error::{Error as WsError, ProtocolError};

use crate::broker::Hub;
use crate::client::Endpoint;
use crate::config::HeartbeatSettings;
use crate::transport::message::{Action, Envelope};

/// Why the inbound pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Close frame, end of stream or a transport-level disconnect.
    PeerClosed,
    /// No heartbeat answer before the read deadline.
    DeadlineElapsed,
    /// The endpoint was closed from elsewhere (outbound pump, overflow).
    EndpointClosed,
    /// Too many consecutive transport errors.
    TooManyErrors,
}

/// Errors that mean the peer is gone rather than a hiccup on a live socket.
pub fn is_expected_closure(err: &WsError) -> bool {
    matches!(
        err,
        WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Io(_)
            | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}

pub async fn read_pump<S>(
    mut stream: S,
    endpoint: Arc<Endpoint>,
    hub: Arc<Hub>,
    heartbeat: HeartbeatSettings,
    max_read_errors: u32,
) -> Exit
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let mut deadline = Instant::now() + heartbeat.pong_wait();
    let mut errors = 0u32;

    let exit = loop {
        let next = tokio::select! {
            _ = endpoint.closed() => break Exit::EndpointClosed,
            next = time::timeout_at(deadline, stream.next()) => next,
        };

        let frame = match next {
            Err(_) => {
                info!("{}> missed heartbeat, dropping", endpoint.name());
                break Exit::DeadlineElapsed;
            }
            Ok(None) => break Exit::PeerClosed,
            Ok(Some(Err(e))) if is_expected_closure(&e) => {
                debug!("{}> connection lost: {e}", endpoint.name());
                break Exit::PeerClosed;
            }
            Ok(Some(Err(e))) => {
                errors += 1;
                warn!("{}> error reading message: {e}", endpoint.name());
                if errors >= max_read_errors {
                    break Exit::TooManyErrors;
                }
                continue;
            }
            Ok(Some(Ok(frame))) => {
                errors = 0;
                frame
            }
        };

        match frame {
            WsMessage::Text(text) => dispatch(&hub, &endpoint, text.as_bytes()),
            WsMessage::Binary(data) => dispatch(&hub, &endpoint, &data),
            WsMessage::Pong(_) => deadline = Instant::now() + heartbeat.pong_wait(),
            WsMessage::Close(_) => break Exit::PeerClosed,
            WsMessage::Ping(_) | WsMessage::Frame(_) => {}
        }
    };

    if exit == Exit::PeerClosed {
        info!("{}> leaving", endpoint.name());
    }
    hub.disconnect(&endpoint);
    exit
}

/// Decodes one frame and applies it to the hub. Malformed frames and
/// unknown actions are logged and ignored.
pub fn dispatch(hub: &Hub, endpoint: &Arc<Endpoint>, raw: &[u8]) {
    let envelope = match Envelope::decode(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            let preview: String = String::from_utf8_lossy(raw).chars().take(100).collect();
            warn!("{}> {e} | {preview}", endpoint.name());
            return;
        }
    };

    match envelope.action {
        Action::Subscribe => {
            debug!("{}> subscribing - {}", endpoint.name(), envelope.topic);
            hub.subscribe(&envelope.topic, endpoint);
        }
        Action::Publish => {
            debug!("{}> publishing - {}", endpoint.name(), envelope.topic);
            hub.publish(&envelope);
        }
        Action::Unsubscribe => {
            debug!("{}> unsubscribing - {}", endpoint.name(), envelope.topic);
            hub.unsubscribe(&envelope.topic, endpoint.id());
        }
        Action::Unknown(action) => {
            warn!(
                "{}> unknown action {action} on {}",
                endpoint.name(),
                envelope.topic
            );
        }
    }
}
