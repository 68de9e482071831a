//! Hub engine
//!
//! The hub is the process-wide topic registry shared by every connection.
//! It maps topic names to the endpoints subscribed to them and performs
//! fan-out on publish.
//!
//! Concurrency notes:
//! - All state sits behind one `RwLock`. Mutations (subscribe, unsubscribe,
//!   remove) take it exclusively; publish takes it shared, just long enough
//!   to snapshot the recipients.
//! - The lock is never held while enqueueing. Enqueueing never waits: a full
//!   queue closes that one endpoint, so one slow peer cannot stall delivery to
//!   the rest of a topic.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};
use tungstenite::Utf8Bytes;

use crate::broker::topic::{SubscriberId, Topic};
use crate::client::{Endpoint, Enqueue};
use crate::transport::message::Envelope;

#[derive(Debug, Default)]
pub struct Hub {
    topics: RwLock<HashMap<String, Topic>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Topic>> {
        self.topics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Topic>> {
        self.topics.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes an endpoint to a topic, creating the topic on first use.
    ///
    /// Returns `true` if the membership is new. Closed endpoints are refused,
    /// so a subscribe racing with a disconnect cannot outlive the cleanup.
    pub fn subscribe(&self, topic: &str, endpoint: &Arc<Endpoint>) -> bool {
        let mut topics = self.write();
        if endpoint.is_closed() {
            return false;
        }
        topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(endpoint)
    }

    /// Unsubscribes an endpoint from a topic. Unknown topics and missing
    /// memberships are a no-op.
    pub fn unsubscribe(&self, topic: &str, id: &SubscriberId) -> bool {
        let mut topics = self.write();
        let Some(t) = topics.get_mut(topic) else {
            return false;
        };
        let removed = t.unsubscribe(id);
        if t.is_empty() {
            topics.remove(topic);
        }
        removed
    }

    /// Publishes an envelope to every endpoint subscribed to its topic at
    /// the time of the call and returns how many accepted it.
    ///
    /// Endpoints whose queue overflows are disconnected.
    pub fn publish(&self, envelope: &Envelope) -> usize {
        let recipients = match self.read().get(&envelope.topic) {
            Some(topic) => topic.recipients(),
            None => Vec::new(),
        };
        if recipients.is_empty() {
            debug!("No subscribers for topic '{}'", envelope.topic);
            return 0;
        }

        let text: Utf8Bytes = match envelope.encode() {
            Ok(json) => json.into(),
            Err(e) => {
                warn!("Failed to serialize envelope for '{}': {e}", envelope.topic);
                return 0;
            }
        };

        let mut accepted = 0;
        for endpoint in &recipients {
            match endpoint.enqueue(text.clone()) {
                Enqueue::Accepted => accepted += 1,
                Enqueue::Overflowed => {
                    warn!(
                        "{}> outbound queue full, disconnecting ({})",
                        endpoint.name(),
                        endpoint.id()
                    );
                    self.remove_client(endpoint.id());
                }
                Enqueue::Closed => {}
            }
        }
        accepted
    }

    /// Removes an endpoint from every topic. Safe to call any number of times.
    pub fn remove_client(&self, id: &SubscriberId) {
        let mut topics = self.write();
        topics.retain(|name, topic| {
            if topic.unsubscribe(id) {
                debug!("Unsubscribed {id} from topic {name}");
            }
            !topic.is_empty()
        });
    }

    /// Closes an endpoint and purges its memberships. Only the first caller
    /// does the work; pumps racing at shutdown may both call this.
    pub fn disconnect(&self, endpoint: &Endpoint) -> bool {
        if !endpoint.close() {
            return false;
        }
        self.remove_client(endpoint.id());
        info!("{}> disconnected ({})", endpoint.name(), endpoint.id());
        true
    }

    /// Subscriber ids of a topic, empty for unknown topics.
    pub fn subscribers(&self, topic: &str) -> Vec<SubscriberId> {
        self.read()
            .get(topic)
            .map(|t| t.subscriber_ids().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_subscribed(&self, topic: &str, id: &SubscriberId) -> bool {
        self.read().get(topic).is_some_and(|t| t.contains(id))
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.read().len()
    }
}
