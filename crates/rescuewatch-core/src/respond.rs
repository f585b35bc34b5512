//! Operator decisions turned into wire messages.

use crate::connection::ConnectionManager;
use crate::envelope::OperatorResponse;
use crate::error::ConsoleError;
use crate::types::{Event, OperatorAction, utc_from_ms};

#[derive(Debug, Clone)]
pub struct OperatorResponseChannel {
    operator_id: String,
}

impl OperatorResponseChannel {
    pub fn new(operator_id: impl Into<String>) -> Self {
        Self {
            operator_id: operator_id.into(),
        }
    }

    pub fn operator_id(&self) -> &str {
        &self.operator_id
    }

    /// Build and transmit a response for `selection`.
    ///
    /// Checks run in order: a selection must exist, then the connection
    /// must be open. Either failure leaves everything untouched.
    pub fn respond(
        &self,
        action: OperatorAction,
        selection: Option<&Event>,
        connection: &mut ConnectionManager,
        now_ms: u64,
    ) -> Result<OperatorResponse, ConsoleError> {
        let event = selection.ok_or(ConsoleError::NoSelection)?;
        if !connection.is_open() {
            return Err(ConsoleError::NotConnected);
        }
        let response =
            OperatorResponse::new(action, &event.id, &self.operator_id, utc_from_ms(now_ms));
        connection.send(response.to_json()?)?;
        tracing::info!(event_id = %event.id, %action, operator = %self.operator_id, "operator response sent");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Link, ReconnectPolicy};
    use crate::timers::Timers;
    use crate::types::{EventKind, Payload, Priority};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Capture(Rc<RefCell<Vec<String>>>);

    impl Link for Capture {
        fn send(&mut self, text: String) -> Result<(), ConsoleError> {
            self.0.borrow_mut().push(text);
            Ok(())
        }
    }

    fn event() -> Event {
        Event {
            id: "e1".into(),
            kind: EventKind::Person,
            priority: Priority::High,
            timestamp: utc_from_ms(0),
            location: None,
            payload: Payload::None,
            clip: None,
            decision: None,
        }
    }

    fn open_manager(sent: Rc<RefCell<Vec<String>>>) -> ConnectionManager {
        let mut timers = Timers::new();
        let mut mgr = ConnectionManager::new(ReconnectPolicy::default());
        mgr.connect();
        let id = mgr.take_dial().unwrap();
        mgr.on_open(id, Box::new(Capture(sent)), &mut timers);
        mgr
    }

    #[test]
    fn no_selection_sends_nothing() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let mut mgr = open_manager(sent.clone());
        let channel = OperatorResponseChannel::new("op");
        let err = channel
            .respond(OperatorAction::Confirm, None, &mut mgr, 0)
            .unwrap_err();
        assert!(matches!(err, ConsoleError::NoSelection));
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn closed_connection_rejected() {
        let mut mgr = ConnectionManager::new(ReconnectPolicy::default());
        let channel = OperatorResponseChannel::new("op");
        let ev = event();
        let err = channel
            .respond(OperatorAction::Reject, Some(&ev), &mut mgr, 0)
            .unwrap_err();
        assert!(matches!(err, ConsoleError::NotConnected));
    }

    #[test]
    fn response_transmitted() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let mut mgr = open_manager(sent.clone());
        let channel = OperatorResponseChannel::new("operator_1");
        let ev = event();
        let resp = channel
            .respond(OperatorAction::Confirm, Some(&ev), &mut mgr, 1_000)
            .unwrap();
        assert_eq!(resp.event_id, "e1");
        assert_eq!(resp.timestamp, "1970-01-01T00:00:01.000Z");
        let wire: serde_json::Value = serde_json::from_str(&sent.borrow()[0]).unwrap();
        assert_eq!(wire["type"], "operator_response");
        assert_eq!(wire["action"], "confirm");
        assert_eq!(wire["operator_id"], "operator_1");
    }
}
