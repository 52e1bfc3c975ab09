//! Core library for the tempo transport engine.
//!
//! The crate is layered bottom-up: a time-ordered [`Timeline`] container, an
//! automatable tick rate ([`TickSignal`]) with exact tick/time integration, a
//! tri-state [`Clock`] that reports every tick boundary the host time crosses,
//! and a musical [`Transport`] that schedules events in ticks on top of it.
//! Everything is single-threaded and driven by the host through a shared
//! [`Context`].

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod signal;
pub mod timeline;
pub mod transport;

pub use clock::{Clock, ClockEvent, ClockState, TickCursor};
pub use config::{AppConfig, HostConfig, TransportConfig};
pub use context::{Context, OfflineHost};
pub use error::{EngineError, Result};
pub use signal::{AutomationEvent, TickSignal};
pub use timeline::{Timed, Timeline};
pub use transport::{
    Boundary, EmbedOptions, EventId, EventSpan, FilterId, MidStartInfo, Position, RemovedEvent,
    Subscription, TickInfo, TimeSignature, Transport, TransportEvent, TransportOptions,
};

/// Musical time in whole ticks.
pub type Ticks = u64;

/// Wall-clock time in seconds.
pub type Seconds = f64;
