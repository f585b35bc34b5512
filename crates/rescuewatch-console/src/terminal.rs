//! Line-oriented rendition of the map and UI surfaces on stdout.

use rescuewatch_core::notify::{Toast, ToastId};
use rescuewatch_core::{
    Event, EventList, Location, MapView, PinHandle, PinStyle, Severity, StatusLine, Surface,
};
use rescuewatch_core::types::Payload;

pub const INDICATOR_INFO: &str = "ℹ";
pub const INDICATOR_SUCCESS: &str = "✔";
pub const INDICATOR_WARNING: &str = "⚠";
pub const INDICATOR_ERROR: &str = "✖";

pub fn severity_indicator(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => INDICATOR_INFO,
        Severity::Success => INDICATOR_SUCCESS,
        Severity::Warning => INDICATOR_WARNING,
        Severity::Error => INDICATOR_ERROR,
    }
}

// ─── Formatting ───────────────────────────────────────────────────

pub fn format_status(status: &StatusLine) -> String {
    let mut line = format!("[status] {}", status.text);
    if status.retry_available {
        line.push_str(" (type `retry`)");
    }
    line
}

pub fn format_toast(toast: &Toast) -> String {
    format!("{} {}", severity_indicator(toast.severity), toast.message)
}

/// One list row: time, id, headline, location and decision.
pub fn format_row(event: &Event) -> String {
    let mut row = format!(
        "{}  {:<28} {}",
        event.timestamp.format("%H:%M:%S"),
        event.id,
        event.headline()
    );
    if let Some(loc) = event.location {
        row.push_str(&format!(" @ {loc}"));
    }
    if let Some(decision) = &event.decision {
        row.push_str(&format!(" [{}]", decision.action));
    }
    row
}

pub fn format_detail(event: &Event) -> Vec<String> {
    let mut lines = vec![
        format!("id:        {}", event.id),
        format!("kind:      {}", event.kind),
        format!("priority:  {}", event.priority),
        format!("time:      {}", event.timestamp.to_rfc3339()),
    ];
    match event.location {
        Some(loc) => lines.push(format!("location:  {loc}")),
        None => lines.push("location:  unknown".to_owned()),
    }
    match &event.payload {
        Payload::Person(p) => {
            if let Some(posture) = &p.posture {
                let conf = p.posture_confidence.map(|c| format!(" ({:.0}%)", c * 100.0));
                lines.push(format!("posture:   {posture}{}", conf.unwrap_or_default()));
            }
            if let Some(status) = &p.status {
                lines.push(format!("status:    {status}"));
            }
            if let Some(n) = p.people_count {
                lines.push(format!("people:    {n}"));
            }
        }
        Payload::Hazard(h) => {
            lines.push(format!("fire:      {}", yes_no(h.fire_detected)));
            lines.push(format!("water:     {}", yes_no(h.water_detected)));
        }
        Payload::None => {}
    }
    if let Some(clip) = &event.clip {
        lines.push(format!("clip:      {clip}"));
    }
    if let Some(d) = &event.decision {
        lines.push(format!("decision:  {} by {}", d.action, d.operator_id));
    }
    lines
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

// ─── Map ──────────────────────────────────────────────────────────

/// Prints pin traffic instead of drawing a map.
#[derive(Debug, Default)]
pub struct TerminalMap {
    next: u64,
}

impl MapView for TerminalMap {
    fn add_marker(&mut self, location: Location, style: PinStyle) -> PinHandle {
        self.next += 1;
        let handle = PinHandle(self.next);
        println!("[map] pin {} {} @ {location}", handle.0, style.as_str());
        handle
    }

    fn remove_marker(&mut self, handle: PinHandle) {
        println!("[map] pin {} removed", handle.0);
    }

    fn open_marker(&mut self, handle: PinHandle) {
        println!("[map] pin {} opened", handle.0);
    }

    fn set_view(&mut self, location: Location, zoom: u8) {
        println!("[map] centred on {location} zoom {zoom}");
    }
}

// ─── Surface ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TerminalSurface;

impl Surface for TerminalSurface {
    fn status_changed(&mut self, status: &StatusLine) {
        println!("{}", format_status(status));
    }

    fn toast_shown(&mut self, toast: &Toast) {
        println!("{}", format_toast(toast));
    }

    fn toast_dismissed(&mut self, _id: ToastId) {}

    fn list_changed(&mut self, list: &EventList<'_>) {
        println!(
            "[list] {} events, {} shown (filter: {})",
            list.total,
            list.items.len(),
            list.filter
        );
    }

    fn detail_changed(&mut self, selection: Option<&Event>) {
        match selection {
            Some(event) => {
                println!("[detail]");
                for line in format_detail(event) {
                    println!("  {line}");
                }
            }
            None => println!("[detail] none selected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rescuewatch_core::connection::ConnectionState;
    use rescuewatch_core::types::{Decision, HazardObservation, OperatorAction};
    use rescuewatch_core::{EventKind, Priority};

    fn fire() -> Event {
        Event {
            id: "fire-1".into(),
            kind: EventKind::Fire,
            priority: Priority::Critical,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            location: Location::new(37.5, -5.25),
            payload: Payload::Hazard(HazardObservation {
                fire_detected: true,
                water_detected: false,
                fire_confidence: None,
                water_confidence: None,
            }),
            clip: Some("clips/fire-1.mp4".into()),
            decision: Some(Decision {
                action: OperatorAction::Confirm,
                operator_id: "op".into(),
            }),
        }
    }

    #[test]
    fn row_has_time_headline_location_and_decision() {
        let row = format_row(&fire());
        assert!(row.starts_with("03:04:05  fire-1"));
        assert!(row.contains("fire [critical]"));
        assert!(row.contains("@ 37.500000,-5.250000"));
        assert!(row.ends_with("[confirm]"));
    }

    #[test]
    fn detail_lists_hazard_flags() {
        let lines = format_detail(&fire());
        assert!(lines.contains(&"fire:      yes".to_string()));
        assert!(lines.contains(&"water:     no".to_string()));
        assert!(lines.contains(&"decision:  confirm by op".to_string()));
    }

    #[test]
    fn offline_status_mentions_retry() {
        let status = StatusLine {
            state: ConnectionState::Offline,
            attempts: 5,
            max_attempts: 5,
            text: "Offline, manual retry available".into(),
            retry_available: true,
        };
        assert_eq!(
            format_status(&status),
            "[status] Offline, manual retry available (type `retry`)"
        );
    }

    #[test]
    fn toast_uses_severity_indicator() {
        let toast = Toast {
            id: ToastId(1),
            message: "Connected".into(),
            severity: Severity::Success,
            created_at_ms: 0,
        };
        assert_eq!(format_toast(&toast), "✔ Connected");
    }
}
