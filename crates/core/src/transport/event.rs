use std::{cell::RefCell, fmt, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::timeline::Timed;
use crate::{Seconds, Ticks, Transport};

/// Handle to an event scheduled on a [`Transport`]. Handles are never
/// reused, so a stale handle simply stops matching anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub(crate) u64);

/// Scheduling data of an event, as seen by callbacks and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpan {
    pub id: EventId,
    pub time: Ticks,
    pub duration: Ticks,
    pub offset: Ticks,
    pub row: i32,
}

impl EventSpan {
    /// First tick after the event's span.
    pub fn end(&self) -> Ticks {
        self.time + self.duration
    }

    /// Whether the event should be sounding at `tick`. A zero-length event
    /// covers its start tick only.
    pub fn covers(&self, tick: Ticks) -> bool {
        tick == self.time || (self.time < tick && tick < self.end())
    }
}

/// Passed to `on_start`, `on_tick` and `on_end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInfo {
    pub seconds: Seconds,
    pub ticks: Ticks,
    pub event: EventSpan,
}

/// Passed to `on_mid_start` when an event becomes active after its start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidStartInfo {
    pub seconds: Seconds,
    pub ticks: Ticks,
    /// How far into the span the current tick lies.
    pub ticks_offset: Ticks,
    /// `ticks_offset` expressed in seconds under the tempo that led here.
    pub seconds_offset: Seconds,
    pub event: EventSpan,
}

/// Lifecycle callback. Callbacks receive the transport that fired them so
/// they can schedule or edit events from inside a tick.
pub type Callback<A> = Rc<RefCell<dyn FnMut(&mut Transport, A)>>;

/// The unit of scheduling: a span of ticks plus optional lifecycle hooks.
#[derive(Clone, Default)]
pub struct TransportEvent {
    pub time: Ticks,
    pub duration: Ticks,
    pub offset: Ticks,
    pub row: i32,
    pub(crate) on_start: Option<Callback<TickInfo>>,
    pub(crate) on_mid_start: Option<Callback<MidStartInfo>>,
    pub(crate) on_tick: Option<Callback<TickInfo>>,
    pub(crate) on_end: Option<Callback<TickInfo>>,
}

impl TransportEvent {
    pub fn new(time: Ticks, duration: Ticks) -> Self {
        Self {
            time,
            duration,
            ..Self::default()
        }
    }

    /// Builds an event from fractional tick values, rounding to whole ticks.
    /// NaN, infinite and negative inputs are rejected.
    pub fn try_new(time: f64, duration: f64) -> crate::Result<Self> {
        Ok(Self::new(
            super::ticks_from_f64("event time", time)?,
            super::ticks_from_f64("event duration", duration)?,
        ))
    }

    pub fn with_offset(mut self, offset: Ticks) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_row(mut self, row: i32) -> Self {
        self.row = row;
        self
    }

    pub fn on_start(mut self, f: impl FnMut(&mut Transport, TickInfo) + 'static) -> Self {
        self.on_start = Some(Rc::new(RefCell::new(f)));
        self
    }

    pub fn on_mid_start(mut self, f: impl FnMut(&mut Transport, MidStartInfo) + 'static) -> Self {
        self.on_mid_start = Some(Rc::new(RefCell::new(f)));
        self
    }

    pub fn on_tick(mut self, f: impl FnMut(&mut Transport, TickInfo) + 'static) -> Self {
        self.on_tick = Some(Rc::new(RefCell::new(f)));
        self
    }

    pub fn on_end(mut self, f: impl FnMut(&mut Transport, TickInfo) + 'static) -> Self {
        self.on_end = Some(Rc::new(RefCell::new(f)));
        self
    }

    /// Events with a tick or end hook stay in the active set while sounding.
    pub fn needs_ticks(&self) -> bool {
        self.on_tick.is_some() || self.on_end.is_some()
    }

    pub(crate) fn span(&self, id: EventId) -> EventSpan {
        EventSpan {
            id,
            time: self.time,
            duration: self.duration,
            offset: self.offset,
            row: self.row,
        }
    }
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportEvent")
            .field("time", &self.time)
            .field("duration", &self.duration)
            .field("offset", &self.offset)
            .field("row", &self.row)
            .field("on_start", &self.on_start.is_some())
            .field("on_mid_start", &self.on_mid_start.is_some())
            .field("on_tick", &self.on_tick.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

/// An event taken off a transport by [`Transport::remove`]. Restoring it
/// puts it back under the same handle.
#[derive(Debug)]
pub struct RemovedEvent {
    pub(crate) id: EventId,
    pub(crate) event: TransportEvent,
}

impl RemovedEvent {
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn event(&self) -> &TransportEvent {
        &self.event
    }

    /// Re-adds the event and reconciles it with the current tick, as if it
    /// had just been scheduled.
    pub fn restore(self, transport: &mut Transport) -> crate::Result<EventId> {
        transport.insert(self.id, self.event)?;
        Ok(self.id)
    }
}

/// Position of an event on the transport timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TimelineEntry {
    pub time: f64,
    pub id: EventId,
}

impl Timed for TimelineEntry {
    fn time(&self) -> f64 {
        self.time
    }
}

pub(crate) fn invoke<A>(callback: &Callback<A>, transport: &mut Transport, arg: A) {
    match callback.try_borrow_mut() {
        Ok(mut f) => (&mut *f)(transport, arg),
        Err(_) => tracing::warn!("skipping re-entrant invocation of a transport callback"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(time: Ticks, duration: Ticks) -> EventSpan {
        TransportEvent::new(time, duration).span(EventId(1))
    }

    #[test]
    fn spans_cover_half_open_ranges() {
        let event = span(10, 5);
        assert!(!event.covers(9));
        assert!(event.covers(10));
        assert!(event.covers(14));
        assert!(!event.covers(15));
        assert_eq!(event.end(), 15);

        let blip = span(3, 0);
        assert!(blip.covers(3));
        assert!(!blip.covers(4));
    }

    #[test]
    fn only_tick_and_end_hooks_need_ticks() {
        assert!(!TransportEvent::new(0, 4).on_start(|_, _| ()).needs_ticks());
        assert!(TransportEvent::new(0, 4).on_end(|_, _| ()).needs_ticks());
        assert!(TransportEvent::new(0, 4).on_tick(|_, _| ()).needs_ticks());

        assert!(TransportEvent::try_new(f64::NAN, 1.0).is_err());
        assert!(TransportEvent::try_new(4.0, -1.0).is_err());
        assert!(TransportEvent::try_new(f64::INFINITY, 0.0).is_err());
        assert_eq!(TransportEvent::try_new(3.6, 2.2).unwrap().time, 4);

        let debug = format!("{:?}", TransportEvent::new(2, 4).with_row(7));
        assert!(debug.contains("row: 7"));
    }
}
