use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConsoleError;

/// Wall-clock instant for an epoch-millisecond tick.
pub fn utc_from_ms(now_ms: u64) -> DateTime<Utc> {
    i64::try_from(now_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
}

// ─── Event Kind ───────────────────────────────────────────────────

/// Canonical event kind. The producer's legacy spellings are folded into
/// these at the ingestion boundary and never travel further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Person,
    Fire,
    Flood,
    Unknown,
}

impl EventKind {
    pub const ALL: [Self; 4] = [Self::Person, Self::Fire, Self::Flood, Self::Unknown];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Fire => "fire",
            Self::Flood => "flood",
            Self::Unknown => "unknown",
        }
    }

    /// Map a wire value (Spanish or English) to a kind. Unrecognised values
    /// become `Unknown` rather than an error.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "persona" | "person" => Self::Person,
            "incendio" | "fire" => Self::Fire,
            "inundacion" | "inundación" | "flood" => Self::Flood,
            _ => Self::Unknown,
        }
    }

    /// Whether `value` names one of the concrete event kinds on the wire.
    pub fn is_event_tag(value: &str) -> bool {
        Self::from_wire(value) != Self::Unknown
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            other => match Self::from_wire(other) {
                Self::Unknown => Err(ConsoleError::InvalidArgument(format!(
                    "unknown event kind: {s}"
                ))),
                kind => Ok(kind),
            },
        }
    }
}

// ─── Priority & Severity ──────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Self; 3] = [Self::Normal, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// The producer emits `critica`/`alta`/`media`/`baja`; only the top two
    /// levels are distinguished here.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "critica" | "crítica" | "critical" => Self::Critical,
            "alta" | "high" => Self::High,
            _ => Self::Normal,
        }
    }

    /// Notification severity used when an event of this priority arrives.
    pub fn severity(self) -> Severity {
        match self {
            Self::Critical => Severity::Error,
            Self::High => Severity::Warning,
            Self::Normal => Severity::Info,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ConsoleError;

    /// Strict counterpart of `from_wire`: unrecognised levels are an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" | "media" | "baja" => Ok(Self::Normal),
            "high" | "alta" => Ok(Self::High),
            "critical" | "critica" | "crítica" => Ok(Self::Critical),
            _ => Err(ConsoleError::InvalidArgument(format!(
                "unknown priority: {s}"
            ))),
        }
    }
}

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Location ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    /// Returns `None` for non-finite or out-of-range coordinates.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

// ─── Payload ──────────────────────────────────────────────────────

/// Posture classification attached to a person sighting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonObservation {
    pub posture: Option<String>,
    pub posture_confidence: Option<f64>,
    pub status: Option<String>,
    pub status_confidence: Option<f64>,
    pub people_count: Option<u32>,
}

/// Fire / water detector flags attached to a hazard event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HazardObservation {
    pub fire_detected: bool,
    pub water_detected: bool,
    pub fire_confidence: Option<f64>,
    pub water_confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload", rename_all = "lowercase")]
pub enum Payload {
    Person(PersonObservation),
    Hazard(HazardObservation),
    #[default]
    None,
}

// ─── Operator Decision ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorAction {
    Confirm,
    Reject,
}

impl OperatorAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Reject => "reject",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "confirm" | "confirmar" => Some(Self::Confirm),
            "reject" | "rechazar" => Some(Self::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for OperatorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision recorded against an event, either locally or from a relay echo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: OperatorAction,
    pub operator_id: String,
}

// ─── Event ────────────────────────────────────────────────────────

/// Canonical alert. Identity is `id`; nothing else is guaranteed unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    pub location: Option<Location>,
    pub payload: Payload,
    pub clip: Option<String>,
    pub decision: Option<Decision>,
}

impl Event {
    /// One-line summary for lists and toasts.
    pub fn headline(&self) -> String {
        let what = match (&self.kind, &self.payload) {
            (EventKind::Person, Payload::Person(p)) => match &p.posture {
                Some(posture) => format!("person ({posture})"),
                None => "person".to_owned(),
            },
            (kind, _) => kind.as_str().to_owned(),
        };
        match self.priority {
            Priority::Normal => what,
            p => format!("{what} [{p}]"),
        }
    }
}
