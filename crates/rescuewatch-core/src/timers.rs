//! Cancellable scheduled tasks.
//!
//! The console never arms fire-and-forget callbacks. Every delayed action is
//! scheduled here, identified by the returned [`TaskHandle`], and either
//! fires through [`Timers::take_due`] or is removed by [`Timers::cancel`].
//! Time is epoch milliseconds supplied by the caller.

use std::collections::BTreeMap;

use crate::notify::ToastId;

/// Handle returned by [`Timers::schedule`]; consumed by [`Timers::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTask {
    /// Start the next reconnect attempt.
    Reconnect,
    /// Remove a toast whose display window elapsed.
    DismissToast(ToastId),
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    due_ms: u64,
    task: TimerTask,
}

#[derive(Debug, Default)]
pub struct Timers {
    next_handle: u64,
    pending: BTreeMap<TaskHandle, Pending>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `task` to fire at `due_ms`.
    pub fn schedule(&mut self, due_ms: u64, task: TimerTask) -> TaskHandle {
        self.next_handle += 1;
        let handle = TaskHandle(self.next_handle);
        self.pending.insert(handle, Pending { due_ms, task });
        handle
    }

    /// Cancel a pending task. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.pending.remove(&handle).is_some()
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    /// Due time of a pending task.
    pub fn due_ms(&self, handle: TaskHandle) -> Option<u64> {
        self.pending.get(&handle).map(|p| p.due_ms)
    }

    /// Earliest deadline among pending tasks.
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.values().map(|p| p.due_ms).min()
    }

    /// Remove and return every task due at or before `now_ms`, ordered by
    /// deadline and then by scheduling order.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<(TaskHandle, TimerTask)> {
        let mut due: Vec<(u64, TaskHandle, TimerTask)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due_ms <= now_ms)
            .map(|(&h, p)| (p.due_ms, h, p.task))
            .collect();
        due.sort_by_key(|&(due_ms, handle, _)| (due_ms, handle));
        for (_, handle, _) in &due {
            self.pending.remove(handle);
        }
        due.into_iter().map(|(_, h, t)| (h, t)).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_and_fire_in_deadline_order() {
        let mut timers = Timers::new();
        let late = timers.schedule(5_000, TimerTask::Reconnect);
        let early = timers.schedule(1_000, TimerTask::DismissToast(ToastId(1)));
        assert_eq!(timers.next_deadline(), Some(1_000));

        let fired = timers.take_due(5_000);
        assert_eq!(
            fired,
            vec![
                (early, TimerTask::DismissToast(ToastId(1))),
                (late, TimerTask::Reconnect),
            ]
        );
        assert!(timers.is_empty());
    }

    #[test]
    fn not_yet_due_stays_pending() {
        let mut timers = Timers::new();
        let h = timers.schedule(2_000, TimerTask::Reconnect);
        assert!(timers.take_due(1_999).is_empty());
        assert!(timers.is_pending(h));
        assert_eq!(timers.take_due(2_000).len(), 1);
    }

    #[test]
    fn cancel_is_one_shot() {
        let mut timers = Timers::new();
        let h = timers.schedule(1_000, TimerTask::Reconnect);
        assert!(timers.cancel(h));
        assert!(!timers.cancel(h));
        assert!(timers.take_due(10_000).is_empty());
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn cancel_after_fire_returns_false() {
        let mut timers = Timers::new();
        let h = timers.schedule(1_000, TimerTask::Reconnect);
        timers.take_due(1_000);
        assert!(!timers.cancel(h));
    }

    #[test]
    fn equal_deadlines_fire_in_schedule_order() {
        let mut timers = Timers::new();
        let a = timers.schedule(1_000, TimerTask::DismissToast(ToastId(7)));
        let b = timers.schedule(1_000, TimerTask::DismissToast(ToastId(3)));
        let fired: Vec<TaskHandle> = timers.take_due(1_000).into_iter().map(|(h, _)| h).collect();
        assert_eq!(fired, vec![a, b]);
    }
}
