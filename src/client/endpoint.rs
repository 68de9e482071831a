//! Connection endpoint
//!
//! `Endpoint` is the server-side half of one live peer connection. It owns
//! the bounded outbound queue drained by the connection's outbound pump and
//! the close-once gate shared by both pumps and the hub.
//!
//! The hub only ever holds `Weak<Endpoint>` links; an endpoint lives exactly
//! as long as its pumps hold it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tungstenite::Utf8Bytes;
use uuid::Uuid;

use crate::broker::topic::SubscriberId;

/// Outcome of a non-blocking push onto an endpoint's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Accepted,
    /// The queue was full. The message is dropped and the endpoint has been
    /// closed; the caller is expected to purge its memberships.
    Overflowed,
    /// The endpoint was already closed.
    Closed,
}

#[derive(Debug)]
pub struct Endpoint {
    id: SubscriberId,
    name: String,
    sender: Mutex<Option<mpsc::Sender<Utf8Bytes>>>,
    closed: AtomicBool,
    close_signal: watch::Sender<bool>,
}

impl Endpoint {
    /// Creates an endpoint with a queue of `capacity` messages and returns
    /// the receiving side for the outbound pump.
    pub fn new(name: impl Into<String>, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (close_signal, _) = watch::channel(false);
        let endpoint = Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            sender: Mutex::new(Some(tx)),
            closed: AtomicBool::new(false),
            close_signal,
        });
        (endpoint, rx)
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Human-readable identity supplied by the peer. Not unique.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enqueue(&self, message: Utf8Bytes) -> Enqueue {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Enqueue::Closed;
        };

        match tx.try_send(message) {
            Ok(()) => Enqueue::Accepted,
            Err(TrySendError::Full(_)) => {
                drop(guard);
                self.close();
                Enqueue::Overflowed
            }
            Err(TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }

    /// Closes the endpoint. Only the first call has an effect and returns
    /// `true`.
    ///
    /// Dropping the queue sender lets the outbound pump drain what is left,
    /// send a close frame and exit; the close signal wakes the inbound pump.
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.close_signal.send_replace(true);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once `close` has been called.
    pub async fn closed(&self) {
        let mut rx = self.close_signal.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}
