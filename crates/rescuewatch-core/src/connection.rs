//! Connection lifecycle and reconnect state machine.
//!
//! Pure and deterministic: the manager never opens sockets itself. It asks
//! for a dial through [`ConnectionManager::take_dial`], and the runtime
//! reports back through [`ConnectionManager::on_open`] and
//! [`ConnectionManager::on_closed`]. Retry delays are armed on [`Timers`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConsoleError;
use crate::timers::{TaskHandle, TimerTask, Timers};

// ─── Reconnect Policy ────────────────────────────────────────────

/// Exponential backoff with a hard attempt limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay before the first retry, in milliseconds (default 3000).
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds (default 30000).
    pub max_delay_ms: u64,
    /// Retries allowed before going offline (default 5).
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 3_000,
            max_delay_ms: 30_000,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^(attempt-1), max)`, attempt counted from 1.
    pub fn delay_for(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1).min(63);
        self.base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms)
    }

    /// Every delay the policy will ever produce, in order.
    pub fn delays(&self) -> Vec<u64> {
        (1..=self.max_attempts).map(|a| self.delay_for(a)).collect()
    }
}

// ─── State ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    ReconnectScheduled,
    Offline,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::ReconnectScheduled => "reconnect_scheduled",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one dial. Results for a superseded attempt are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outbound half of an open transport.
pub trait Link {
    fn send(&mut self, text: String) -> Result<(), ConsoleError>;

    /// Ask the transport to close. Closing is best-effort.
    fn close(&mut self) {}
}

/// Something the surrounding console should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// Handshake completed. `recovered` is true after a prior drop.
    Opened { recovered: bool },
    /// First unexpected disconnect since the last successful open.
    Dropped { was_open: bool },
    RetryScheduled { attempt: u32, delay_ms: u64 },
    /// Retries exhausted; manual override required.
    Offline,
    /// Operator forced a fresh attempt.
    ManualRetry,
}

/// Data for the status indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub state: ConnectionState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub text: String,
    /// Manual retry affordance is shown.
    pub retry_available: bool,
}

// ─── Manager ─────────────────────────────────────────────────────

pub struct ConnectionManager {
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempts: u32,
    gave_up: bool,
    retry_timer: Option<TaskHandle>,
    retry_delay_ms: u64,
    next_attempt: u64,
    current: Option<AttemptId>,
    dial: Option<AttemptId>,
    link: Option<Box<dyn Link>>,
    /// The one-time disconnect notice was already given this session.
    drop_announced: bool,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("gave_up", &self.gave_up)
            .field("retry_timer", &self.retry_timer)
            .field("current", &self.current)
            .field("has_link", &self.link.is_some())
            .finish()
    }
}

impl ConnectionManager {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            attempts: 0,
            gave_up: false,
            retry_timer: None,
            retry_delay_ms: 0,
            next_attempt: 0,
            current: None,
            dial: None,
            link: None,
            drop_announced: false,
        }
    }

    /// Initial open. Only acts from `Disconnected`.
    pub fn connect(&mut self) -> Vec<ConnectionSignal> {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = %self.state, "connect ignored");
            return Vec::new();
        }
        self.begin_attempt();
        Vec::new()
    }

    /// The dial the runtime should perform next, if any.
    pub fn take_dial(&mut self) -> Option<AttemptId> {
        self.dial.take()
    }

    /// Handshake for `attempt` completed.
    pub fn on_open(
        &mut self,
        attempt: AttemptId,
        mut link: Box<dyn Link>,
        timers: &mut Timers,
    ) -> Vec<ConnectionSignal> {
        if self.current != Some(attempt) || self.state != ConnectionState::Connecting {
            tracing::debug!(%attempt, "stale transport opened; closing it");
            link.close();
            return Vec::new();
        }
        self.cancel_retry(timers);
        let recovered = self.drop_announced;
        self.attempts = 0;
        self.gave_up = false;
        self.drop_announced = false;
        self.link = Some(link);
        self.state = ConnectionState::Open;
        tracing::info!(%attempt, recovered, "connection open");
        vec![ConnectionSignal::Opened { recovered }]
    }

    /// The transport for `attempt` closed, failed to connect, or could not
    /// even be constructed. All three are unexpected closes.
    pub fn on_closed(
        &mut self,
        attempt: AttemptId,
        now_ms: u64,
        timers: &mut Timers,
    ) -> Vec<ConnectionSignal> {
        if self.current != Some(attempt) {
            tracing::debug!(%attempt, "stale transport closed; ignoring");
            return Vec::new();
        }
        let was_open = self.state == ConnectionState::Open;
        self.current = None;
        self.link = None;

        if self.gave_up {
            self.state = ConnectionState::Offline;
            return Vec::new();
        }

        let mut signals = Vec::new();
        if !self.drop_announced {
            self.drop_announced = true;
            signals.push(ConnectionSignal::Dropped { was_open });
        }
        signals.push(self.schedule_retry(now_ms, timers));
        signals
    }

    /// A `Reconnect` timer fired.
    pub fn on_retry_timer(&mut self, handle: TaskHandle) -> Vec<ConnectionSignal> {
        if self.retry_timer != Some(handle) {
            tracing::debug!(?handle, "stale reconnect timer; ignoring");
            return Vec::new();
        }
        self.retry_timer = None;
        if self.gave_up {
            return Vec::new();
        }
        tracing::info!(attempt = self.attempts, max = self.policy.max_attempts, "reconnecting");
        self.begin_attempt();
        Vec::new()
    }

    /// Operator override. Cancels any pending retry, resets the counter,
    /// clears the give-up flag and dials at once, all in one step.
    pub fn manual_reconnect(&mut self, timers: &mut Timers) -> Vec<ConnectionSignal> {
        if self.state == ConnectionState::Open {
            tracing::debug!("manual reconnect ignored; already open");
            return Vec::new();
        }
        self.cancel_retry(timers);
        self.attempts = 0;
        self.gave_up = false;
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        tracing::info!(previous = %self.state, "manual reconnect");
        self.begin_attempt();
        vec![ConnectionSignal::ManualRetry]
    }

    /// Deliberate local close (shutdown). Never schedules a retry.
    pub fn disconnect(&mut self, timers: &mut Timers) {
        self.cancel_retry(timers);
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.current = None;
        self.dial = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Send one text frame over the open transport.
    pub fn send(&mut self, text: String) -> Result<(), ConsoleError> {
        match (&self.state, self.link.as_mut()) {
            (ConnectionState::Open, Some(link)) => link.send(text),
            _ => Err(ConsoleError::NotConnected),
        }
    }

    pub fn status(&self) -> StatusLine {
        let max = self.policy.max_attempts;
        let text = match self.state {
            ConnectionState::Disconnected => "Disconnected".to_owned(),
            ConnectionState::Connecting if self.attempts > 0 => {
                format!("Reconnecting ({}/{max})…", self.attempts)
            }
            ConnectionState::Connecting => "Connecting…".to_owned(),
            ConnectionState::Open => "Connected".to_owned(),
            ConnectionState::ReconnectScheduled => format!(
                "Reconnecting ({}/{max}) in {}s",
                self.attempts,
                self.retry_delay_ms.div_ceil(1_000)
            ),
            ConnectionState::Offline => "Offline, manual retry available".to_owned(),
        };
        StatusLine {
            state: self.state,
            attempts: self.attempts,
            max_attempts: max,
            text,
            retry_available: self.state == ConnectionState::Offline,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn gave_up(&self) -> bool {
        self.gave_up
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn pending_retry(&self) -> Option<TaskHandle> {
        self.retry_timer
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.current
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    fn begin_attempt(&mut self) {
        self.next_attempt += 1;
        let id = AttemptId(self.next_attempt);
        self.current = Some(id);
        self.dial = Some(id);
        self.state = ConnectionState::Connecting;
    }

    fn cancel_retry(&mut self, timers: &mut Timers) {
        if let Some(handle) = self.retry_timer.take() {
            timers.cancel(handle);
        }
    }

    fn schedule_retry(&mut self, now_ms: u64, timers: &mut Timers) -> ConnectionSignal {
        // At most one pending retry.
        self.cancel_retry(timers);

        if self.attempts >= self.policy.max_attempts {
            self.gave_up = true;
            self.state = ConnectionState::Offline;
            tracing::warn!(attempts = self.attempts, "reconnect attempts exhausted; going offline");
            return ConnectionSignal::Offline;
        }

        self.attempts += 1;
        let delay_ms = self.policy.delay_for(self.attempts);
        self.retry_delay_ms = delay_ms;
        self.retry_timer = Some(timers.schedule(now_ms.saturating_add(delay_ms), TimerTask::Reconnect));
        self.state = ConnectionState::ReconnectScheduled;
        tracing::info!(attempt = self.attempts, delay_ms, "reconnect scheduled");
        ConnectionSignal::RetryScheduled {
            attempt: self.attempts,
            delay_ms,
        }
    }
}
