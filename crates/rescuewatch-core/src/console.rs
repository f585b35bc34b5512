//! Session controller.
//!
//! [`Console`] owns every component for one operator session and is the
//! only thing the runtime talks to. Each public method is one callback in
//! the cooperative model: inbound frame, timer expiry or operator action.
//! A method runs to completion before the next one starts, so no caller can
//! observe a half-applied transition.

use serde_json::{Map, Value};

use crate::config::ConsoleConfig;
use crate::connection::{AttemptId, ConnectionManager, ConnectionSignal, Link, StatusLine};
use crate::envelope::{self, Inbound, RelayStats, ResponseEcho};
use crate::error::ConsoleError;
use crate::markers::{MapView, MarkerRegistry, PinHandle};
use crate::notify::{NotificationQueue, Toast, ToastId};
use crate::respond::OperatorResponseChannel;
use crate::store::{Criterion, EventFilter, EventStats, EventStore, Ingested};
use crate::timers::{TimerTask, Timers};
use crate::types::{Decision, Event, OperatorAction, Severity};

// ─── UI Surface ───────────────────────────────────────────────────

/// The filtered list as handed to the UI.
#[derive(Debug, Clone)]
pub struct EventList<'a> {
    pub filter: EventFilter,
    /// Events in history regardless of the filter.
    pub total: usize,
    pub items: Vec<&'a Event>,
}

/// UI sink. Every method defaults to a no-op so a surface only implements
/// the areas it renders.
pub trait Surface {
    fn status_changed(&mut self, _status: &StatusLine) {}
    fn toast_shown(&mut self, _toast: &Toast) {}
    fn toast_dismissed(&mut self, _id: ToastId) {}
    fn list_changed(&mut self, _list: &EventList<'_>) {}
    fn detail_changed(&mut self, _selection: Option<&Event>) {}
}

// ─── Console ──────────────────────────────────────────────────────

pub struct Console<M: MapView, S: Surface> {
    config: ConsoleConfig,
    connection: ConnectionManager,
    store: EventStore,
    markers: MarkerRegistry,
    toasts: NotificationQueue,
    timers: Timers,
    responder: OperatorResponseChannel,
    filter: EventFilter,
    selection: Option<Event>,
    last_status: Option<StatusLine>,
    map: M,
    surface: S,
}

impl<M: MapView, S: Surface> Console<M, S> {
    pub fn new(config: ConsoleConfig, map: M, surface: S) -> Self {
        Self {
            connection: ConnectionManager::new(config.reconnect.clone()),
            store: EventStore::new(config.history_capacity),
            markers: MarkerRegistry::new(),
            toasts: NotificationQueue::new(config.toast_display_ms),
            timers: Timers::new(),
            responder: OperatorResponseChannel::new(config.operator_id.clone()),
            filter: EventFilter::default(),
            selection: None,
            last_status: None,
            map,
            surface,
            config,
        }
    }

    // ─── Connection callbacks ────────────────────────────────────

    /// Begin the initial connection.
    pub fn start(&mut self) {
        tracing::info!(endpoint = %self.config.endpoint, "starting console session");
        let signals = self.connection.connect();
        self.apply_signals(signals, 0);
    }

    /// Dial requested by the connection manager, if any. The runtime
    /// polls this after every callback.
    pub fn take_dial(&mut self) -> Option<AttemptId> {
        self.connection.take_dial()
    }

    pub fn transport_opened(&mut self, attempt: AttemptId, link: Box<dyn Link>, now_ms: u64) {
        let signals = self.connection.on_open(attempt, link, &mut self.timers);
        self.apply_signals(signals, now_ms);
    }

    /// Unexpected close, failed handshake or failed construction.
    pub fn transport_closed(&mut self, attempt: AttemptId, now_ms: u64) {
        let signals = self.connection.on_closed(attempt, now_ms, &mut self.timers);
        self.apply_signals(signals, now_ms);
    }

    /// One inbound text frame. Malformed payloads are logged and dropped
    /// without touching connection state.
    pub fn handle_text(&mut self, text: &str, now_ms: u64) {
        let inbound = match envelope::classify(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(error = %e, len = text.len(), "dropping malformed payload");
                return;
            }
        };
        match inbound {
            Inbound::Event(raw) => self.ingest(&raw, now_ms),
            Inbound::Welcome { message } => {
                tracing::info!(message = message.as_deref().unwrap_or(""), "relay welcome");
            }
            Inbound::Ack { event_id } => {
                tracing::debug!(event_id = event_id.as_deref().unwrap_or(""), "relay ack");
            }
            Inbound::ResponseEcho(echo) => self.apply_echo(echo),
            Inbound::RelayError { message } => {
                tracing::warn!(%message, "relay reported an error");
                self.toast(format!("Relay error: {message}"), Severity::Warning, now_ms);
            }
            Inbound::Stats(stats) => self.show_relay_stats(&stats, now_ms),
            Inbound::Pong => tracing::trace!("pong"),
            Inbound::Unknown { kind } => {
                tracing::debug!(kind = kind.as_deref().unwrap_or("<none>"), "ignoring unknown message");
            }
        }
    }

    /// Run every timer due at `now_ms`.
    pub fn fire_timers(&mut self, now_ms: u64) {
        for (handle, task) in self.timers.take_due(now_ms) {
            match task {
                TimerTask::Reconnect => {
                    let signals = self.connection.on_retry_timer(handle);
                    self.apply_signals(signals, now_ms);
                }
                TimerTask::DismissToast(id) => {
                    if self.toasts.expire(id).is_some() {
                        self.surface.toast_dismissed(id);
                    }
                }
            }
        }
        self.refresh_status();
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    // ─── Operator actions ────────────────────────────────────────

    /// Select the most recent history entry with `id`, centre the map on it
    /// and emphasise its pin.
    pub fn select(&mut self, id: &str) -> Result<(), ConsoleError> {
        let event = self
            .store
            .get(id)
            .cloned()
            .ok_or_else(|| ConsoleError::InvalidArgument(format!("no event with id {id}")))?;
        if let Some(location) = event.location {
            self.map.set_view(location, self.config.focus_zoom);
        }
        self.markers.highlight(&event.id, &mut self.map);
        tracing::debug!(event_id = %event.id, "selected");
        self.selection = Some(event);
        self.surface.detail_changed(self.selection.as_ref());
        Ok(())
    }

    /// Detail callback for a pin.
    pub fn activate_marker(&mut self, handle: PinHandle) -> Result<(), ConsoleError> {
        let id = self
            .markers
            .event_for(handle)
            .map(str::to_owned)
            .ok_or_else(|| ConsoleError::InvalidArgument(format!("no pin {}", handle.0)))?;
        self.select(&id)
    }

    pub fn clear_selection(&mut self) {
        if self.selection.take().is_some() {
            self.surface.detail_changed(None);
        }
    }

    /// Confirm or reject the selected event.
    ///
    /// With no selection nothing happens and `NoSelection` is returned.
    /// While disconnected an error toast is shown and nothing else changes.
    pub fn respond(&mut self, action: OperatorAction, now_ms: u64) -> Result<(), ConsoleError> {
        let result = self.responder.respond(
            action,
            self.selection.as_ref(),
            &mut self.connection,
            now_ms,
        );
        match result {
            Ok(response) => {
                let decision = Decision {
                    action,
                    operator_id: response.operator_id,
                };
                self.store.record_decision(&response.event_id, &decision);
                self.selection = None;
                self.surface.detail_changed(None);
                let (message, severity) = match action {
                    OperatorAction::Confirm => {
                        (format!("Event {} confirmed", response.event_id), Severity::Success)
                    }
                    OperatorAction::Reject => {
                        (format!("Event {} rejected", response.event_id), Severity::Warning)
                    }
                };
                self.toast(message, severity, now_ms);
                self.render_list();
                Ok(())
            }
            Err(ConsoleError::NoSelection) => {
                tracing::debug!(%action, "respond ignored; nothing selected");
                Err(ConsoleError::NoSelection)
            }
            Err(ConsoleError::NotConnected) => {
                self.toast("Not connected; response not sent", Severity::Error, now_ms);
                Err(ConsoleError::NotConnected)
            }
            Err(e) => {
                tracing::warn!(error = %e, "operator response failed");
                self.toast(format!("Response not sent: {e}"), Severity::Error, now_ms);
                Err(e)
            }
        }
    }

    /// Narrow the list by kind or by priority. The other criterion is kept.
    pub fn set_filter(&mut self, criterion: impl Into<Criterion>) {
        self.filter.narrow(criterion);
        tracing::debug!(filter = %self.filter, "filter changed");
        self.render_list();
    }

    /// History through the active filter, newest first.
    pub fn filtered(&self) -> impl Iterator<Item = &Event> + Clone {
        self.store.filter(self.filter)
    }

    /// Drop all history and every pin in one step.
    pub fn clear_history(&mut self) -> usize {
        let dropped = self.store.clear();
        self.markers.clear(&mut self.map);
        tracing::info!(dropped, "history cleared");
        self.render_list();
        dropped
    }

    pub fn manual_reconnect(&mut self, now_ms: u64) {
        let signals = self.connection.manual_reconnect(&mut self.timers);
        self.apply_signals(signals, now_ms);
    }

    /// Ask the relay for its counters. Requires an open connection.
    pub fn request_relay_stats(&mut self, now_ms: u64) -> Result<(), ConsoleError> {
        if let Err(e) = self.connection.send(envelope::stats_request()) {
            self.toast(format!("Stats not requested: {e}"), Severity::Error, now_ms);
            return Err(e);
        }
        Ok(())
    }

    pub fn dismiss_toast(&mut self, id: ToastId) -> bool {
        match self.toasts.dismiss(id, &mut self.timers) {
            Some(_) => {
                self.surface.toast_dismissed(id);
                true
            }
            None => false,
        }
    }

    /// Deliberate local close. Pending retries are cancelled and none is
    /// scheduled.
    pub fn shutdown(&mut self) {
        self.connection.disconnect(&mut self.timers);
        self.refresh_status();
        tracing::info!("console session closed");
    }

    // ─── Accessors ───────────────────────────────────────────────

    pub fn status(&self) -> StatusLine {
        self.connection.status()
    }

    pub fn stats(&self) -> EventStats {
        self.store.stats()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }

    pub fn toasts(&self) -> &NotificationQueue {
        &self.toasts
    }

    pub fn selection(&self) -> Option<&Event> {
        self.selection.as_ref()
    }

    pub fn filter(&self) -> EventFilter {
        self.filter
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    // ─── Internals ───────────────────────────────────────────────

    fn ingest(&mut self, raw: &Map<String, Value>, now_ms: u64) {
        let Ingested { event, evicted } = self.store.ingest(raw, now_ms);
        self.markers.sync(&event, &mut self.map);
        for old in &evicted {
            // A re-alert with the same id still owns the pin.
            if !self.store.contains(&old.id) {
                self.markers.remove(&old.id, &mut self.map);
            }
        }
        tracing::info!(
            event_id = %event.id,
            kind = %event.kind,
            priority = %event.priority,
            located = event.location.is_some(),
            "event ingested"
        );
        self.toast(
            format!("New {}", event.headline()),
            event.priority.severity(),
            now_ms,
        );
        self.render_list();
    }

    fn apply_echo(&mut self, echo: ResponseEcho) {
        let (Some(action), Some(event_id)) = (echo.action, echo.event_id) else {
            tracing::debug!("incomplete operator response echo");
            return;
        };
        let operator_id = echo.operator_id;
        let decision = Decision {
            action,
            operator_id: operator_id.unwrap_or_default(),
        };
        if self.store.record_decision(&event_id, &decision) == 0 {
            tracing::debug!(%event_id, "echo for event not in history");
            return;
        }
        if let Some(selected) = self.selection.as_mut().filter(|e| e.id == event_id) {
            selected.decision = Some(decision);
            self.surface.detail_changed(self.selection.as_ref());
        }
        self.render_list();
    }

    fn show_relay_stats(&mut self, stats: &RelayStats, now_ms: u64) {
        tracing::info!(
            clients = stats.clients_connected,
            events = stats.events_received,
            responses = stats.responses_sent,
            "relay stats"
        );
        self.toast(
            format!(
                "Relay: {} clients, {} events received, {} responses sent",
                stats.clients_connected, stats.events_received, stats.responses_sent
            ),
            Severity::Info,
            now_ms,
        );
    }

    fn apply_signals(&mut self, signals: Vec<ConnectionSignal>, now_ms: u64) {
        for signal in signals {
            match signal {
                ConnectionSignal::Opened { recovered } => {
                    let message = if recovered {
                        "Connection restored"
                    } else {
                        "Connected to event source"
                    };
                    self.toast(message, Severity::Success, now_ms);
                }
                ConnectionSignal::Dropped { was_open } => {
                    let message = if was_open {
                        "Connection lost, reconnecting"
                    } else {
                        "Event source unreachable, retrying"
                    };
                    self.toast(message, Severity::Warning, now_ms);
                }
                ConnectionSignal::RetryScheduled { attempt, delay_ms } => {
                    tracing::debug!(attempt, delay_ms, "retry armed");
                }
                ConnectionSignal::Offline => {
                    let message = format!(
                        "Event source offline after {} attempts. Use retry to reconnect",
                        self.connection.attempts()
                    );
                    self.toast(message, Severity::Error, now_ms);
                }
                ConnectionSignal::ManualRetry => {
                    self.toast("Reconnecting…", Severity::Info, now_ms);
                }
            }
        }
        self.refresh_status();
    }

    fn toast(&mut self, message: impl Into<String>, severity: Severity, now_ms: u64) {
        let toast = self.toasts.push(message, severity, now_ms, &mut self.timers);
        self.surface.toast_shown(toast);
    }

    fn refresh_status(&mut self) {
        let status = self.connection.status();
        if self.last_status.as_ref() != Some(&status) {
            self.surface.status_changed(&status);
            self.last_status = Some(status);
        }
    }

    fn render_list(&mut self) {
        let list = EventList {
            filter: self.filter,
            total: self.store.len(),
            items: self.store.filter(self.filter).collect(),
        };
        self.surface.list_changed(&list);
    }
}
