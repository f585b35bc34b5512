//! rescuewatch-core: connection supervision, event ingestion, bounded
//! history and map-marker sync for the rescue operator console.
//!
//! No IO and no async runtime. The binary crate supplies the transport,
//! the clock and the concrete map/UI surfaces.

pub mod config;
pub mod connection;
pub mod console;
pub mod envelope;
pub mod error;
pub mod markers;
pub mod notify;
pub mod respond;
pub mod store;
pub mod timers;
pub mod types;

pub use config::ConsoleConfig;
pub use connection::{AttemptId, ConnectionManager, ConnectionState, Link, ReconnectPolicy, StatusLine};
pub use console::{Console, EventList, Surface};
pub use error::{ConfigError, ConsoleError};
pub use markers::{MapView, PinHandle, PinStyle};
pub use store::{Criterion, EventFilter, EventStore, KindFilter, PriorityFilter};
pub use types::{Event, EventKind, Location, OperatorAction, Priority, Severity};
