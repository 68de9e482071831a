//! Topic management
//!
//! A `Topic` holds non-owning links to the endpoints subscribed to one topic
//! name. Duplicate subscriptions are a no-op.
//!
//! Callers must synchronize access to `Topic` (the hub keeps every topic
//! behind its lock).

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::client::Endpoint;

pub type SubscriberId = String;

#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    subscribers: HashMap<SubscriberId, Weak<Endpoint>>,
}

impl Topic {
    /// Create a new topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashMap::new(),
        }
    }

    /// Add a subscriber to the topic. Returns `false` if it was already there.
    pub fn subscribe(&mut self, endpoint: &Arc<Endpoint>) -> bool {
        if self.subscribers.contains_key(endpoint.id()) {
            return false;
        }
        self.subscribers
            .insert(endpoint.id().clone(), Arc::downgrade(endpoint));
        true
    }

    /// Remove a subscriber from the topic. Returns `false` if it was not there.
    pub fn unsubscribe(&mut self, id: &SubscriberId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn subscriber_ids(&self) -> impl Iterator<Item = &SubscriberId> {
        self.subscribers.keys()
    }

    /// Live recipients at this instant. Links whose endpoint is gone or
    /// closed are skipped.
    pub fn recipients(&self) -> Vec<Arc<Endpoint>> {
        self.subscribers
            .values()
            .filter_map(Weak::upgrade)
            .filter(|endpoint| !endpoint.is_closed())
            .collect()
    }
}
