//! Bounded, newest-first event history and payload normalisation.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ConsoleError;
use crate::types::{
    Decision, Event, EventKind, HazardObservation, Location, Payload, PersonObservation, Priority,
    utc_from_ms,
};

/// Legacy kind keys, checked in order; the first one present wins.
pub const KIND_KEYS: [&str; 2] = ["tipo", "type"];

// ─── Filter ───────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindFilter {
    #[default]
    All,
    Kind(EventKind),
}

impl KindFilter {
    pub fn matches(self, event: &Event) -> bool {
        match self {
            Self::All => true,
            Self::Kind(kind) => event.kind == kind,
        }
    }
}

impl fmt::Display for KindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Kind(kind) => write!(f, "{kind}"),
        }
    }
}

impl FromStr for KindFilter {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::Kind)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityFilter {
    #[default]
    All,
    Level(Priority),
}

impl PriorityFilter {
    pub fn matches(self, event: &Event) -> bool {
        match self {
            Self::All => true,
            Self::Level(level) => event.priority == level,
        }
    }
}

impl fmt::Display for PriorityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Level(level) => write!(f, "{level}"),
        }
    }
}

impl FromStr for PriorityFilter {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::Level)
    }
}

/// Kind and priority criteria; an event must pass both.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventFilter {
    pub kind: KindFilter,
    pub priority: PriorityFilter,
}

impl EventFilter {
    pub fn matches(self, event: &Event) -> bool {
        self.kind.matches(event) && self.priority.matches(event)
    }

    /// Replace one criterion, keeping the other.
    pub fn narrow(&mut self, criterion: impl Into<Criterion>) {
        match criterion.into() {
            Criterion::Kind(kind) => self.kind = kind,
            Criterion::Priority(priority) => self.priority = priority,
        }
    }
}

impl From<KindFilter> for EventFilter {
    fn from(kind: KindFilter) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

impl From<PriorityFilter> for EventFilter {
    fn from(priority: PriorityFilter) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.priority {
            PriorityFilter::All => write!(f, "{}", self.kind),
            priority => write!(f, "{}, priority {priority}", self.kind),
        }
    }
}

/// One axis of an `EventFilter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Kind(KindFilter),
    Priority(PriorityFilter),
}

impl From<KindFilter> for Criterion {
    fn from(kind: KindFilter) -> Self {
        Self::Kind(kind)
    }
}

impl From<PriorityFilter> for Criterion {
    fn from(priority: PriorityFilter) -> Self {
        Self::Priority(priority)
    }
}

/// Lazy view over `history`. The iterator is `Clone`, so it can be
/// restarted; it borrows the history and never mutates it.
pub fn filter(
    history: &VecDeque<Event>,
    criterion: EventFilter,
) -> impl Iterator<Item = &Event> + Clone {
    history.iter().filter(move |e| criterion.matches(e))
}

// ─── Statistics ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventStats {
    pub total: usize,
    pub by_kind: BTreeMap<EventKind, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    pub with_fire: usize,
    pub with_water: usize,
}

// ─── Store ────────────────────────────────────────────────────────

/// Result of one ingest: the canonical event plus whatever fell off the
/// tail of the history to make room for it.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub event: Event,
    pub evicted: Vec<Event>,
}

#[derive(Debug)]
pub struct EventStore {
    capacity: usize,
    history: VecDeque<Event>,
    next_seq: u64,
}

impl EventStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            history: VecDeque::with_capacity(capacity),
            next_seq: 1,
        }
    }

    /// Canonicalise `raw`, prepend it to history and truncate the tail.
    pub fn ingest(&mut self, raw: &Map<String, Value>, now_ms: u64) -> Ingested {
        let event = self.normalize(raw, now_ms);
        self.history.push_front(event.clone());
        let mut evicted = Vec::new();
        while self.history.len() > self.capacity {
            if let Some(old) = self.history.pop_back() {
                evicted.push(old);
            }
        }
        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), capacity = self.capacity, "history truncated");
        }
        Ingested { event, evicted }
    }

    pub fn filter(
        &self,
        criterion: impl Into<EventFilter>,
    ) -> impl Iterator<Item = &Event> + Clone {
        filter(&self.history, criterion.into())
    }

    /// Empty the history. Returns how many events were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.history.len();
        self.history.clear();
        n
    }

    pub fn history(&self) -> &VecDeque<Event> {
        &self.history
    }

    /// Most recent entry with this id.
    pub fn get(&self, id: &str) -> Option<&Event> {
        self.history.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Record a decision on every history entry carrying `id`.
    pub fn record_decision(&mut self, id: &str, decision: &Decision) -> usize {
        let mut n = 0;
        for event in self.history.iter_mut().filter(|e| e.id == id) {
            event.decision = Some(decision.clone());
            n += 1;
        }
        n
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> EventStats {
        let mut stats = EventStats {
            total: self.history.len(),
            ..Default::default()
        };
        for event in &self.history {
            *stats.by_kind.entry(event.kind).or_default() += 1;
            *stats.by_priority.entry(event.priority).or_default() += 1;
            if let Payload::Hazard(h) = &event.payload {
                stats.with_fire += usize::from(h.fire_detected);
                stats.with_water += usize::from(h.water_detected);
            }
        }
        stats
    }

    fn normalize(&mut self, raw: &Map<String, Value>, now_ms: u64) -> Event {
        let received = utc_from_ms(now_ms);

        let kind = KIND_KEYS
            .iter()
            .find_map(|k| raw.get(*k))
            .and_then(Value::as_str)
            .map(EventKind::from_wire)
            .unwrap_or(EventKind::Unknown);

        let id = match raw.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                let id = format!("evt_{}_{:08x}", received.format("%Y%m%d_%H%M%S"), self.next_seq);
                self.next_seq += 1;
                id
            }
        };

        let priority = str_field(raw, &["priority", "prioridad"])
            .map(Priority::from_wire)
            .unwrap_or_default();

        let timestamp = str_field(raw, &["timestamp"])
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(received);

        let location = match (f64_field(raw, &["lat"]), f64_field(raw, &["lon", "lng"])) {
            (Some(lat), Some(lon)) => Location::new(lat, lon),
            _ => None,
        };

        let payload = match kind {
            EventKind::Person => Payload::Person(PersonObservation {
                posture: str_field(raw, &["postura", "posture"]).map(str::to_owned),
                posture_confidence: f64_field(raw, &["conf_postura", "posture_confidence"]),
                status: str_field(raw, &["estado", "status"]).map(str::to_owned),
                status_confidence: f64_field(raw, &["conf_estado", "status_confidence"]),
                people_count: raw
                    .get("count_people")
                    .and_then(Value::as_u64)
                    .and_then(|n| u32::try_from(n).ok()),
            }),
            EventKind::Fire | EventKind::Flood => Payload::Hazard(HazardObservation {
                fire_detected: bool_field(raw, "fire_detected").unwrap_or(kind == EventKind::Fire),
                water_detected: bool_field(raw, "water_detected")
                    .unwrap_or(kind == EventKind::Flood),
                fire_confidence: f64_field(raw, &["fire_confidence"]),
                water_confidence: f64_field(raw, &["water_confidence"]),
            }),
            EventKind::Unknown => Payload::None,
        };

        let clip = str_field(raw, &["clip_path", "clip"])
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        Event {
            id,
            kind,
            priority,
            timestamp,
            location,
            payload,
            clip,
            decision: None,
        }
    }
}

fn str_field<'a>(raw: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| raw.get(*k).and_then(Value::as_str))
}

fn f64_field(raw: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|k| raw.get(*k).and_then(Value::as_f64))
        .filter(|v| v.is_finite())
}

fn bool_field(raw: &Map<String, Value>, key: &str) -> Option<bool> {
    raw.get(key).and_then(Value::as_bool)
}
