//! Wire envelopes exchanged with the relay.
//!
//! Inbound JSON is classified once here; nothing downstream looks at raw
//! keys again except [`crate::store::EventStore::ingest`], which receives
//! the event object as-is.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConsoleError;
use crate::store::KIND_KEYS;
use crate::types::{EventKind, OperatorAction};

/// Relay counters reported in `stats` / `test_response` messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    #[serde(default)]
    pub clients_connected: u64,
    #[serde(default)]
    pub events_received: u64,
    #[serde(default)]
    pub responses_sent: u64,
}

/// An operator decision echoed back by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEcho {
    pub action: Option<OperatorAction>,
    pub event_id: Option<String>,
    pub operator_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// An alert to ingest. The object is passed through untouched.
    Event(Map<String, Value>),
    /// Relay welcome message.
    Welcome { message: Option<String> },
    /// Delivery acknowledgement for an event id.
    Ack { event_id: Option<String> },
    ResponseEcho(ResponseEcho),
    RelayError { message: String },
    Stats(RelayStats),
    Pong,
    /// Recognised JSON with a message type nobody handles.
    Unknown { kind: Option<String> },
}

/// Decode and classify one text frame.
pub fn classify(text: &str) -> Result<Inbound, ConsoleError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(obj) = value else {
        return Err(ConsoleError::Malformed("payload is not a JSON object".into()));
    };

    let msg_type = opt_str(&obj, "type");

    let inbound = match msg_type.as_deref() {
        Some("connection") => Inbound::Welcome {
            message: opt_str(&obj, "message"),
        },
        Some("ack") => Inbound::Ack {
            event_id: opt_str(&obj, "event_id"),
        },
        Some("operator_response") => Inbound::ResponseEcho(ResponseEcho {
            action: obj
                .get("action")
                .and_then(Value::as_str)
                .and_then(OperatorAction::from_wire),
            event_id: opt_str(&obj, "event_id"),
            operator_id: opt_str(&obj, "operator_id"),
        }),
        Some("error") => Inbound::RelayError {
            message: opt_str(&obj, "message").unwrap_or_else(|| "unspecified relay error".into()),
        },
        Some("stats") | Some("test_response") => {
            Inbound::Stats(serde_json::from_value(Value::Object(obj))?)
        }
        Some("pong") => Inbound::Pong,
        _ if obj.contains_key(KIND_KEYS[0]) => Inbound::Event(obj),
        Some(t) if EventKind::is_event_tag(t) => Inbound::Event(obj),
        _ => Inbound::Unknown { kind: msg_type },
    };
    Ok(inbound)
}

fn opt_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

// ─── Outbound ─────────────────────────────────────────────────────

/// `{type: "operator_response", action, event_id, operator_id, timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorResponse {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub action: OperatorAction,
    pub event_id: String,
    pub operator_id: String,
    /// ISO-8601, UTC, millisecond precision.
    pub timestamp: String,
}

impl OperatorResponse {
    pub const TYPE: &'static str = "operator_response";

    pub fn new(
        action: OperatorAction,
        event_id: impl Into<String>,
        operator_id: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            msg_type: Self::TYPE.to_owned(),
            action,
            event_id: event_id.into(),
            operator_id: operator_id.into(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn to_json(&self) -> Result<String, ConsoleError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Relay statistics request.
pub fn stats_request() -> String {
    serde_json::json!({ "type": "get_stats" }).to_string()
}
