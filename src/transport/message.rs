//! Wire envelope
//!
//! Every frame exchanged with a peer carries one JSON envelope:
//!
//! ```json
//! { "action": 1, "topic": "news", "payload": "anything" }
//! ```
//!
//! `action` is `-1` (unsubscribe), `0` (publish) or `1` (subscribe). Other
//! integer values still decode, as `Action::Unknown`, so a peer sending a
//! newer action keeps its connection. The payload is kept as raw JSON text
//! and forwarded byte for byte to subscribers on publish.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::utils::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i8", into = "i8")]
pub enum Action {
    Unsubscribe,
    Publish,
    Subscribe,
    Unknown(i8),
}

impl From<i8> for Action {
    fn from(value: i8) -> Self {
        match value {
            -1 => Action::Unsubscribe,
            0 => Action::Publish,
            1 => Action::Subscribe,
            other => Action::Unknown(other),
        }
    }
}

impl From<Action> for i8 {
    fn from(action: Action) -> Self {
        match action {
            Action::Unsubscribe => -1,
            Action::Publish => 0,
            Action::Subscribe => 1,
            Action::Unknown(other) => other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub action: Action,
    pub topic: String,
    /// Raw JSON text of the payload; `None` when absent or `null`.
    #[serde(default)]
    pub payload: Option<Box<RawValue>>,
}

impl Envelope {
    pub fn new(action: Action, topic: impl Into<String>, payload: Option<Box<RawValue>>) -> Self {
        Self {
            action,
            topic: topic.into(),
            payload,
        }
    }

    /// Decodes one envelope from a text or binary frame.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The payload exactly as the publisher wrote it.
    pub fn payload_str(&self) -> &str {
        self.payload.as_deref().map_or("null", RawValue::get)
    }
}
