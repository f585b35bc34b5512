//! Map pins kept in step with the event store.
//!
//! The map itself is opaque: the registry only talks to it through
//! [`MapView`]. At most one pin exists per event id.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{Event, EventKind, Location};

/// Opaque pin handle issued by the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PinHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinStyle {
    Person,
    Fire,
    Flood,
    Default,
}

impl PinStyle {
    pub fn for_kind(kind: EventKind) -> Self {
        match kind {
            EventKind::Person => Self::Person,
            EventKind::Fire => Self::Fire,
            EventKind::Flood => Self::Flood,
            EventKind::Unknown => Self::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Fire => "fire",
            Self::Flood => "flood",
            Self::Default => "default",
        }
    }
}

/// Map capability consumed by the registry and by selection.
pub trait MapView {
    fn add_marker(&mut self, location: Location, style: PinStyle) -> PinHandle;
    fn remove_marker(&mut self, handle: PinHandle);
    fn open_marker(&mut self, handle: PinHandle);
    fn set_view(&mut self, location: Location, zoom: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Marker {
    pub handle: PinHandle,
    pub style: PinStyle,
    pub location: Location,
}

#[derive(Debug, Default)]
pub struct MarkerRegistry {
    by_event: HashMap<String, Marker>,
    by_handle: HashMap<PinHandle, String>,
    highlighted: Option<String>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a pin for a freshly ingested event. Events without a location
    /// get no pin. A repeated id drops the previous pin first, so a re-alert
    /// without a location leaves that id unpinned.
    ///
    /// The pin's detail callback is the handle itself: activating it goes
    /// through [`MarkerRegistry::event_for`] back to the event id.
    pub fn sync(&mut self, event: &Event, map: &mut dyn MapView) -> Option<PinHandle> {
        if let Some(old) = self.by_event.remove(&event.id) {
            self.by_handle.remove(&old.handle);
            map.remove_marker(old.handle);
            if event.location.is_none() && self.highlighted.as_deref() == Some(event.id.as_str()) {
                self.highlighted = None;
            }
            tracing::debug!(
                event_id = %event.id,
                located = event.location.is_some(),
                "marker replaced for repeated event id"
            );
        }
        let location = event.location?;
        let style = PinStyle::for_kind(event.kind);
        let handle = map.add_marker(location, style);
        self.by_event.insert(
            event.id.clone(),
            Marker {
                handle,
                style,
                location,
            },
        );
        self.by_handle.insert(handle, event.id.clone());
        Some(handle)
    }

    /// Emphasise the pin for `id`. Other pins keep their ownership.
    pub fn highlight(&mut self, id: &str, map: &mut dyn MapView) -> bool {
        match self.by_event.get(id) {
            Some(marker) => {
                map.open_marker(marker.handle);
                self.highlighted = Some(id.to_owned());
                true
            }
            None => false,
        }
    }

    /// Drop the pin for one event id.
    pub fn remove(&mut self, id: &str, map: &mut dyn MapView) -> bool {
        let Some(marker) = self.by_event.remove(id) else {
            return false;
        };
        self.by_handle.remove(&marker.handle);
        map.remove_marker(marker.handle);
        if self.highlighted.as_deref() == Some(id) {
            self.highlighted = None;
        }
        true
    }

    /// Remove every pin. Only called by an explicit history clear.
    pub fn clear(&mut self, map: &mut dyn MapView) {
        for marker in self.by_event.values() {
            map.remove_marker(marker.handle);
        }
        self.by_event.clear();
        self.by_handle.clear();
        self.highlighted = None;
    }

    pub fn get(&self, id: &str) -> Option<&Marker> {
        self.by_event.get(id)
    }

    /// Event id bound to a pin.
    pub fn event_for(&self, handle: PinHandle) -> Option<&str> {
        self.by_handle.get(&handle).map(String::as_str)
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlighted.as_deref()
    }

    pub fn len(&self) -> usize {
        self.by_event.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_event.is_empty()
    }
}
