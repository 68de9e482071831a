//! Outbound pump
//!
//! One task per connection runs `write_pump`; it is the only writer of the
//! connection. It wakes on either a queued message or the heartbeat ticker.
//! Every write runs under the write deadline; a failed or late write ends the
//! connection.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use tungstenite::Message as WsMessage;
use tungstenite::Utf8Bytes;
use tungstenite::error::Error as WsError;

use crate::broker::Hub;
use crate::client::Endpoint;
use crate::config::HeartbeatSettings;

/// Separator between envelopes coalesced into one text frame.
pub const BATCH_SEPARATOR: char = '\n';

pub async fn write_pump<S>(
    mut sink: S,
    mut queue: mpsc::Receiver<Utf8Bytes>,
    endpoint: Arc<Endpoint>,
    hub: Arc<Hub>,
    heartbeat: HeartbeatSettings,
) where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    let period = heartbeat.ping_period();
    let write_wait = heartbeat.write_wait();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = queue.recv() => {
                let Some(first) = next else {
                    // The endpoint was closed.
                    let _ = write(&mut sink, WsMessage::Close(None), write_wait).await;
                    break;
                };
                let frame = coalesce(first, &mut queue);
                if let Err(e) = write(&mut sink, WsMessage::text(frame), write_wait).await {
                    warn!("{}> failed to send message: {e}", endpoint.name());
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = write(&mut sink, WsMessage::Ping(Default::default()), write_wait).await {
                    debug!("{}> failed to send ping: {e}", endpoint.name());
                    break;
                }
            }
        }
    }

    hub.disconnect(&endpoint);
    let _ = time::timeout(write_wait, sink.close()).await;
    debug!("{}> send loop closed", endpoint.name());
}

/// Appends every message already waiting in the queue to `first`, keeping
/// their order. Messages arriving after the call are left for the next frame.
pub fn coalesce(first: Utf8Bytes, queue: &mut mpsc::Receiver<Utf8Bytes>) -> Utf8Bytes {
    let pending = queue.len();
    if pending == 0 {
        return first;
    }

    let mut frame = String::from(first.as_str());
    for _ in 0..pending {
        match queue.try_recv() {
            Ok(next) => {
                frame.push(BATCH_SEPARATOR);
                frame.push_str(next.as_str());
            }
            Err(_) => break,
        }
    }
    frame.into()
}

async fn write<S>(sink: &mut S, message: WsMessage, write_wait: Duration) -> Result<(), WsError>
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    match time::timeout(write_wait, sink.send(message)).await {
        Ok(result) => result,
        Err(_) => Err(WsError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "write deadline exceeded",
        ))),
    }
}
