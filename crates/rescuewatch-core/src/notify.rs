//! Ephemeral, auto-dismissing operator notifications.

use serde::Serialize;

use crate::timers::{TaskHandle, TimerTask, Timers};
use crate::types::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ToastId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: ToastId,
    pub message: String,
    pub severity: Severity,
    pub created_at_ms: u64,
}

#[derive(Debug)]
struct Entry {
    toast: Toast,
    dismiss: TaskHandle,
}

/// Independent toasts, each with its own dismissal timer.
#[derive(Debug)]
pub struct NotificationQueue {
    display_ms: u64,
    next_id: u64,
    entries: Vec<Entry>,
}

impl NotificationQueue {
    pub fn new(display_ms: u64) -> Self {
        Self {
            display_ms,
            next_id: 1,
            entries: Vec::new(),
        }
    }

    /// Show a toast and arm its dismissal timer.
    pub fn push(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        now_ms: u64,
        timers: &mut Timers,
    ) -> &Toast {
        let id = ToastId(self.next_id);
        self.next_id += 1;
        let dismiss = timers.schedule(
            now_ms.saturating_add(self.display_ms),
            TimerTask::DismissToast(id),
        );
        self.entries.push(Entry {
            toast: Toast {
                id,
                message: message.into(),
                severity,
                created_at_ms: now_ms,
            },
            dismiss,
        });
        let last = self.entries.len() - 1;
        &self.entries[last].toast
    }

    /// Dismiss a toast early, cancelling its timer.
    pub fn dismiss(&mut self, id: ToastId, timers: &mut Timers) -> Option<Toast> {
        let pos = self.entries.iter().position(|e| e.toast.id == id)?;
        let entry = self.entries.remove(pos);
        timers.cancel(entry.dismiss);
        Some(entry.toast)
    }

    /// Remove a toast whose dismissal timer already fired.
    pub fn expire(&mut self, id: ToastId) -> Option<Toast> {
        let pos = self.entries.iter().position(|e| e.toast.id == id)?;
        Some(self.entries.remove(pos).toast)
    }

    /// Visible toasts, oldest first.
    pub fn active(&self) -> impl Iterator<Item = &Toast> {
        self.entries.iter().map(|e| &e.toast)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
