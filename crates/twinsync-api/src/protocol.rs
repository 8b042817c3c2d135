//! Notification endpoint wire protocol.
//!
//! Every frame is a JSON object discriminated by `"type"`. The client sends
//! [`Request`]s to manage its subscriptions; the server pushes
//! [`Notification`]s carrying the full state of one twin.
//!
//! ```json
//! {"type":"subscribe","thing":"device-1/sensor"}
//! {"type":"change","thing":{"metadata":{"name":"device-1/sensor"},"reportedState":{...}}}
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ── Outbound ─────────────────────────────────────────────────────────

/// Subscription control message sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    Subscribe { thing: String },
    Unsubscribe { thing: String },
}

impl Request {
    pub fn subscribe(thing: impl Into<String>) -> Self {
        Self::Subscribe {
            thing: thing.into(),
        }
    }

    pub fn unsubscribe(thing: impl Into<String>) -> Self {
        Self::Unsubscribe {
            thing: thing.into(),
        }
    }

    /// Name of the twin this request targets.
    pub fn thing(&self) -> &str {
        match self {
            Self::Subscribe { thing } | Self::Unsubscribe { thing } => thing,
        }
    }

    /// Serialize to the JSON text frame sent over the wire.
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Encode(e.to_string()))
    }
}

// ── Inbound ──────────────────────────────────────────────────────────

/// Server-pushed notification.
///
/// `initial` arrives right after a subscribe, `change` on every later
/// update. Both carry the complete twin. Any other `type` decodes to
/// [`Notification::Other`] so newer servers don't break older clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    Initial { thing: Thing },
    Change { thing: Thing },
    #[serde(other)]
    Other,
}

impl Notification {
    /// Parse a text frame.
    pub fn decode(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Decode {
            message: e.to_string(),
            body: text.to_owned(),
        })
    }

    /// The twin carried by this notification, if it carries one.
    pub fn into_thing(self) -> Option<Thing> {
        match self {
            Self::Initial { thing } | Self::Change { thing } => Some(thing),
            Self::Other => None,
        }
    }
}

/// Full state of one twin as pushed by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thing {
    pub metadata: ThingMetadata,

    /// Raw values as reported by the device.
    #[serde(default)]
    pub reported_state: HashMap<String, Feature>,

    /// Values computed server-side; these shadow reported values.
    #[serde(default)]
    pub synthetic_state: HashMap<String, Feature>,
}

impl Thing {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThingMetadata {
    pub name: String,

    /// Everything else the server sends (application, uid, generation, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single feature value: opaque payload plus whatever metadata the server
/// attaches (`lastUpdate`, etc.), kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub value: Value,

    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Feature {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            metadata: Map::new(),
        }
    }

    /// Timestamp of the last change, when the server supplies a parseable one.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get("lastUpdate")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}
