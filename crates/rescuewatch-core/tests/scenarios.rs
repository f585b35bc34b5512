//! End-to-end sessions driven through `Console` with in-memory map and UI.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rescuewatch_core::notify::Toast;
use rescuewatch_core::{
    ConnectionState, Console, ConsoleConfig, ConsoleError, Event, EventList, KindFilter, Link,
    Location, MapView, OperatorAction, PinHandle, PinStyle, Priority, PriorityFilter, Severity,
    StatusLine, Surface,
};

// ─── Fakes ────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeMap {
    next: u64,
    pins: BTreeMap<PinHandle, (Location, PinStyle)>,
    centred: Vec<Location>,
}

impl MapView for FakeMap {
    fn add_marker(&mut self, location: Location, style: PinStyle) -> PinHandle {
        self.next += 1;
        let handle = PinHandle(self.next);
        self.pins.insert(handle, (location, style));
        handle
    }

    fn remove_marker(&mut self, handle: PinHandle) {
        self.pins.remove(&handle);
    }

    fn open_marker(&mut self, _handle: PinHandle) {}

    fn set_view(&mut self, location: Location, _zoom: u8) {
        self.centred.push(location);
    }
}

#[derive(Default)]
struct FakeUi {
    statuses: Vec<StatusLine>,
    toasts: Vec<Toast>,
    list_len: usize,
    event_count: usize,
}

impl Surface for FakeUi {
    fn status_changed(&mut self, status: &StatusLine) {
        self.statuses.push(status.clone());
    }

    fn toast_shown(&mut self, toast: &Toast) {
        self.toasts.push(toast.clone());
    }

    fn list_changed(&mut self, list: &EventList<'_>) {
        self.list_len = list.items.len();
        self.event_count = list.total;
    }

    fn detail_changed(&mut self, _selection: Option<&Event>) {}
}

#[derive(Clone, Default)]
struct Outbox(Rc<RefCell<Vec<String>>>);

impl Link for Outbox {
    fn send(&mut self, text: String) -> Result<(), ConsoleError> {
        self.0.borrow_mut().push(text);
        Ok(())
    }
}

type Session = Console<FakeMap, FakeUi>;

fn session(config: ConsoleConfig) -> Session {
    Console::new(config, FakeMap::default(), FakeUi::default())
}

fn open(console: &mut Session, now_ms: u64) -> Outbox {
    let attempt = console.take_dial().expect("dial pending");
    let outbox = Outbox::default();
    console.transport_opened(attempt, Box::new(outbox.clone()), now_ms);
    outbox
}

/// Run timers until the pending retry dials, then fail that dial. Toast
/// dismissals may come due first.
fn fail_next_retry(console: &mut Session) -> u64 {
    loop {
        let now = console.next_deadline().expect("timer armed");
        console.fire_timers(now);
        if let Some(attempt) = console.take_dial() {
            console.transport_closed(attempt, now);
            return now;
        }
    }
}

// ─── Scenarios ────────────────────────────────────────────────────

#[test]
fn history_of_150_keeps_newest_100() {
    let mut console = session(ConsoleConfig::default());
    for i in 0..150 {
        console.handle_text(&format!(r#"{{"id":"ev{i}","tipo":"persona"}}"#), i);
    }
    assert_eq!(console.store().len(), 100);
    assert_eq!(console.surface().event_count, 100);
    for i in 0..50 {
        assert!(!console.store().contains(&format!("ev{i}")));
    }
    for i in 50..150 {
        assert!(console.store().contains(&format!("ev{i}")));
    }
}

#[test]
fn five_failed_retries_end_offline_with_retry_affordance() {
    let mut console = session(ConsoleConfig::default());
    console.start();
    open(&mut console, 0);

    let attempt = console.connection().current_attempt().unwrap();
    console.transport_closed(attempt, 1_000);
    for _ in 0..5 {
        fail_next_retry(&mut console);
    }

    let status = console.status();
    assert_eq!(status.state, ConnectionState::Offline);
    assert_eq!(status.attempts, 5);
    assert!(status.retry_available);
    assert_eq!(status.text, "Offline, manual retry available");
    assert_eq!(console.surface().statuses.last(), Some(&status));
    assert!(console.take_dial().is_none());

    // One disconnect warning for the whole outage, one terminal error.
    let ui = &console.surface().toasts;
    assert_eq!(ui.iter().filter(|t| t.severity == Severity::Warning).count(), 1);
    assert_eq!(ui.iter().filter(|t| t.severity == Severity::Error).count(), 1);
    // Only toast dismissals remain scheduled.
    assert!(console.connection().pending_retry().is_none());
}

#[test]
fn retry_delays_follow_backoff() {
    let mut console = session(ConsoleConfig::default());
    console.start();
    open(&mut console, 0);
    let attempt = console.connection().current_attempt().unwrap();
    console.transport_closed(attempt, 0);

    let mut last = 0;
    let mut gaps = Vec::new();
    for _ in 0..5 {
        let now = fail_next_retry(&mut console);
        gaps.push(now - last);
        last = now;
    }
    assert_eq!(gaps, vec![3_000, 6_000, 12_000, 24_000, 30_000]);
}

#[test]
fn manual_override_recovers_from_offline() {
    let config = ConsoleConfig {
        reconnect: rescuewatch_core::ReconnectPolicy {
            max_attempts: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut console = session(config);
    console.start();
    let attempt = console.take_dial().unwrap();
    console.transport_closed(attempt, 0);
    fail_next_retry(&mut console);
    assert_eq!(console.status().state, ConnectionState::Offline);

    console.manual_reconnect(10_000);
    assert_eq!(console.status().state, ConnectionState::Connecting);
    assert_eq!(console.connection().attempts(), 0);
    assert!(!console.connection().gave_up());

    open(&mut console, 10_100);
    assert!(console.connection().is_open());
    let restored = console.surface().toasts.last().unwrap();
    assert_eq!(restored.message, "Connection restored");
}

#[test]
fn critical_fire_raises_error_toast_and_fire_pin() {
    let mut console = session(ConsoleConfig::default());
    console.handle_text(
        r#"{"id":"fire-1","tipo":"incendio","priority":"critica","lat":37.39,"lon":-5.98,"fire_detected":true}"#,
        0,
    );
    let toast = console.surface().toasts.last().unwrap();
    assert_eq!(toast.severity, Severity::Error);

    let marker = console.markers().get("fire-1").expect("pin placed");
    assert_eq!(marker.style, PinStyle::Fire);
    assert_eq!(
        console.map().pins[&marker.handle],
        (Location::new(37.39, -5.98).unwrap(), PinStyle::Fire)
    );
}

#[test]
fn respond_without_selection_changes_nothing() {
    let mut console = session(ConsoleConfig::default());
    console.start();
    let outbox = open(&mut console, 0);
    console.handle_text(r#"{"id":"a","tipo":"persona"}"#, 1);
    let toasts = console.surface().toasts.len();

    let err = console.respond(OperatorAction::Confirm, 2).unwrap_err();
    assert!(matches!(err, ConsoleError::NoSelection));
    assert!(outbox.0.borrow().is_empty());
    assert_eq!(console.surface().toasts.len(), toasts);
    assert!(console.store().get("a").unwrap().decision.is_none());
}

#[test]
fn respond_while_offline_reports_error() {
    let mut console = session(ConsoleConfig::default());
    console.handle_text(r#"{"id":"a","tipo":"persona"}"#, 1);
    console.select("a").unwrap();

    let err = console.respond(OperatorAction::Reject, 2).unwrap_err();
    assert!(matches!(err, ConsoleError::NotConnected));
    assert_eq!(console.surface().toasts.last().unwrap().severity, Severity::Error);
    assert!(console.selection().is_some());
}

#[test]
fn filter_then_select_and_confirm() {
    let mut console = session(ConsoleConfig::default());
    console.start();
    let outbox = open(&mut console, 0);
    console.handle_text(r#"{"id":"p1","tipo":"persona","lat":1.0,"lon":1.0}"#, 1);
    console.handle_text(r#"{"id":"w1","type":"inundacion","lat":2.0,"lon":2.0}"#, 2);
    console.set_filter("flood".parse::<KindFilter>().unwrap());
    assert_eq!(console.surface().list_len, 1);

    let handle = console.markers().get("w1").unwrap().handle;
    console.activate_marker(handle).unwrap();
    assert_eq!(console.map().centred, vec![Location::new(2.0, 2.0).unwrap()]);

    console.respond(OperatorAction::Confirm, 3).unwrap();
    let sent: serde_json::Value = serde_json::from_str(&outbox.0.borrow()[0]).unwrap();
    assert_eq!(sent["event_id"], "w1");
    assert_eq!(sent["operator_id"], "operator_1");
    assert!(console.selection().is_none());
}

#[test]
fn critical_only_view_follows_new_alerts() {
    let mut console = session(ConsoleConfig::default());
    console.start();
    open(&mut console, 0);
    for (i, (kind, priority)) in [
        ("persona", "critica"),
        ("incendio", "media"),
        ("inundacion", "critica"),
        ("persona", "alta"),
    ]
    .iter()
    .enumerate()
    {
        let frame = serde_json::json!({"id": format!("e{i}"), "tipo": kind, "priority": priority});
        console.handle_text(&frame.to_string(), 1 + i as u64);
    }

    console.set_filter("critical".parse::<PriorityFilter>().unwrap());
    assert_eq!(console.surface().list_len, 2);
    let ids: Vec<&str> = console.filtered().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e2", "e0"]);

    console.handle_text(r#"{"id":"e4","tipo":"incendio","priority":"critica"}"#, 10);
    assert_eq!(console.surface().list_len, 3);
    assert!(console.filtered().all(|e| e.priority == Priority::Critical));
    assert_eq!(console.store().len(), 5);

    console.set_filter(PriorityFilter::All);
    assert_eq!(console.surface().list_len, 5);
}
