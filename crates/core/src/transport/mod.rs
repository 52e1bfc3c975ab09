mod embed;
mod emitter;
mod event;
mod position;

pub use embed::EmbedOptions;
pub use emitter::{Emitter, Subscription};
pub use event::{
    Callback, EventId, EventSpan, MidStartInfo, RemovedEvent, TickInfo, TransportEvent,
};
pub use position::{Position, TimeSignature};

use std::{collections::HashMap, fmt};

use event::{invoke, TimelineEntry};

use crate::clock::{Clock, ClockEvent, ClockState};
use crate::config::TransportConfig;
use crate::context::Context;
use crate::error::check_ticks;
use crate::signal::TickSignal;
use crate::timeline::Timeline;
use crate::{EngineError, Result, Seconds, Ticks};

/// Ticks are kept on an `f64` timeline, which is exact up to 2^53.
pub const MAX_TICKS: Ticks = 1 << 53;

/// Handle returned by [`Transport::add_filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(u64);

/// Payload of the before-start and before-end notifications.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub seconds: Seconds,
    pub ticks: Ticks,
}

/// Construction parameters for a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOptions {
    pub ppq: u32,
    pub bpm: f64,
    pub time_signature: TimeSignature,
    pub looping: bool,
    pub loop_start: Ticks,
    pub loop_end: Ticks,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for TransportOptions {
    fn from(config: &TransportConfig) -> Self {
        Self {
            ppq: config.ppq,
            bpm: config.bpm,
            time_signature: config.time_signature,
            looping: config.looping,
            loop_start: config.loop_start,
            loop_end: config.loop_end,
        }
    }
}

type Filter = Box<dyn Fn(&EventSpan) -> bool>;

/// Schedules events in ticks on top of a BPM-driven [`Clock`].
///
/// Each tick runs loop wrap, first-tick catch-up, exact starts and the
/// active-set sweep. Callbacks get `&mut Transport` and their edits are
/// reconciled against the tick right away.
pub struct Transport {
    clock: Clock,
    ppq: u32,
    time_signature: TimeSignature,
    events: HashMap<EventId, TransportEvent>,
    timeline: Timeline<TimelineEntry>,
    /// Started events that still want `on_tick`/`on_end`.
    active: Vec<EventId>,
    /// Events started during the tick in `current`.
    fired: Vec<EventId>,
    filters: Vec<(FilterId, Filter)>,
    looping: bool,
    loop_start: Ticks,
    loop_end: Ticks,
    first_tick: bool,
    /// Last processed tick, cleared when playback ends.
    current: Option<(Seconds, Ticks)>,
    /// Set while `process_tick` is running its phases.
    in_tick: bool,
    /// Bumped whenever the sounding set is flushed; a tick whose phases see
    /// it change stops early.
    epoch: u64,
    before_start: Emitter<Boundary>,
    before_end: Emitter<Boundary>,
    next_id: u64,
}

impl Transport {
    pub fn new(context: Context, options: TransportOptions) -> Result<Self> {
        check_loop(options.loop_start, options.loop_end)?;
        let tempo = TickSignal::bpm(options.bpm, options.ppq)?;
        tracing::debug!(
            ppq = options.ppq,
            bpm = options.bpm,
            signature = %options.time_signature,
            "transport created"
        );

        Ok(Self {
            clock: Clock::new(context, tempo),
            ppq: options.ppq,
            time_signature: options.time_signature,
            events: HashMap::new(),
            timeline: Timeline::new(),
            active: Vec::new(),
            fired: Vec::new(),
            filters: Vec::new(),
            looping: options.looping,
            loop_start: options.loop_start,
            loop_end: options.loop_end,
            first_tick: false,
            current: None,
            in_tick: false,
            epoch: 0,
            before_start: Emitter::new(),
            before_end: Emitter::new(),
            next_id: 0,
        })
    }

    /// Builds a transport from configuration, applying its tempo automation.
    pub fn from_config(context: Context, config: &TransportConfig) -> Result<Self> {
        let mut transport = Self::new(context, TransportOptions::from(config))?;
        for event in &config.tempo_automation {
            transport.tempo_mut().apply(*event)?;
        }
        Ok(transport)
    }

    pub fn context(&self) -> &Context {
        self.clock.context()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn ppq(&self) -> u32 {
        self.ppq
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn set_time_signature(&mut self, signature: TimeSignature) -> &mut Self {
        self.time_signature = signature;
        self
    }

    /// The BPM signal driving the clock.
    pub fn tempo(&self) -> &TickSignal {
        self.clock.frequency()
    }

    pub fn tempo_mut(&mut self) -> &mut TickSignal {
        self.clock.frequency_mut()
    }

    pub fn bpm(&self) -> f64 {
        self.tempo().get_value_at_time(self.context().now())
    }

    pub fn set_bpm(&mut self, bpm: f64) -> Result<&mut Self> {
        let now = self.context().now();
        self.tempo_mut().set_value_at_time(bpm, now)?;
        Ok(self)
    }

    // Playback

    pub fn start(&mut self, when: impl Into<Option<Seconds>>) -> Result<&mut Self> {
        self.clock.start(when.into(), None)?;
        Ok(self)
    }

    /// Starts playback from tick `ticks` instead of the stop position.
    pub fn start_at(&mut self, when: impl Into<Option<Seconds>>, ticks: Ticks) -> Result<&mut Self> {
        check_tick_range("start position", ticks)?;
        self.clock.start(when.into(), Some(ticks as f64))?;
        Ok(self)
    }

    /// Pauses playback. If `when` is not in the future, sounding events get
    /// their `on_end` right away. From inside a callback the default is the
    /// tick being processed.
    pub fn pause(&mut self, when: impl Into<Option<Seconds>>) -> Result<&mut Self> {
        let when: Option<Seconds> = when.into();
        let when = when.or_else(|| self.dispatch_time());
        self.clock.pause(when)?;
        let now = self.context().now();
        let at = when.unwrap_or(now);
        if at <= now {
            self.flush_active(at);
        }
        Ok(self)
    }

    /// Stops playback and returns the counter to where the run started.
    /// Active events are flushed immediately when `when` is not in the future.
    pub fn stop(&mut self, when: impl Into<Option<Seconds>>) -> Result<&mut Self> {
        let when: Option<Seconds> = when.into();
        let when = when.or_else(|| self.dispatch_time());
        self.clock.stop(when)?;
        let now = self.context().now();
        let at = when.unwrap_or(now);
        if at <= now {
            self.end_playback(at);
        }
        Ok(self)
    }

    pub fn state(&self) -> ClockState {
        self.clock.get_state()
    }

    // Position

    pub fn ticks(&self) -> Ticks {
        self.clock.ticks().floor() as Ticks
    }

    pub fn seconds(&self) -> Seconds {
        self.clock.seconds()
    }

    pub fn position(&self) -> Position {
        Position::from_ticks(self.clock.ticks(), self.ppq, self.time_signature)
    }

    /// How far the playhead is through the loop, in `[0, 1]`. Always zero
    /// when looping is off.
    pub fn progress(&self) -> f64 {
        if !self.looping {
            return 0.0;
        }
        let span = (self.loop_end - self.loop_start) as f64;
        ((self.clock.ticks() - self.loop_start as f64) / span).clamp(0.0, 1.0)
    }

    /// Moves the playhead. While playing, sounding events are ended and the
    /// next tick catches up on whatever spans the new position. Called from a
    /// callback, the jump lands on the tick being processed and the new
    /// position is processed before this returns.
    pub fn set_ticks(&mut self, ticks: Ticks) -> Result<&mut Self> {
        check_tick_range("position", ticks)?;
        if let Some(seconds) = self.dispatch_time() {
            if self.clock.state_at(seconds) == ClockState::Started {
                self.clock.set_ticks_at_time(ticks as f64, seconds)?;
                tracing::debug!(ticks, seconds, "transport repositioned mid-tick");
                self.flush_active(seconds);
                self.first_tick = true;
                self.process_tick(seconds, ticks, false);
                return Ok(self);
            }
        }
        let now = self.context().now();
        if self.clock.state_at(now) == ClockState::Started {
            self.flush_active(now);
            self.first_tick = true;
        }
        self.clock.set_ticks_at_time(ticks as f64, now)?;
        tracing::debug!(ticks, now, "transport repositioned");
        Ok(self)
    }

    pub fn set_position(&mut self, position: Position) -> Result<&mut Self> {
        let ticks = position.to_ticks(self.ppq, self.time_signature).round();
        self.set_ticks(ticks as Ticks)
    }

    /// Seconds needed to play `ticks` from now on, following the tempo
    /// automation.
    pub fn ticks_to_seconds(&self, ticks: f64) -> Seconds {
        self.tempo().ticks_to_time(ticks, self.context().now())
    }

    /// Ticks played during the next `seconds`.
    pub fn seconds_to_ticks(&self, seconds: Seconds) -> f64 {
        self.tempo().time_to_ticks(seconds, self.context().now())
    }

    // Looping

    pub fn set_loop(&mut self, enabled: bool) -> &mut Self {
        self.looping = enabled;
        self
    }

    pub fn set_loop_points(&mut self, start: Ticks, end: Ticks) -> Result<&mut Self> {
        check_loop(start, end)?;
        self.loop_start = start;
        self.loop_end = end;
        Ok(self)
    }

    pub fn loop_points(&self) -> (Ticks, Ticks) {
        (self.loop_start, self.loop_end)
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    // Scheduling

    /// Adds an event. If playback is already inside its span the event is
    /// started on the spot.
    pub fn schedule(&mut self, event: TransportEvent) -> Result<EventId> {
        check_span(&event)?;
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.insert(id, event)?;
        Ok(id)
    }

    /// Schedules a callback for a single tick.
    pub fn schedule_once(
        &mut self,
        time: Ticks,
        callback: impl FnMut(&mut Transport, TickInfo) + 'static,
    ) -> Result<EventId> {
        self.schedule(TransportEvent::new(time, 0).on_start(callback))
    }

    /// Calls `callback` every `interval` ticks from `start`, for `duration`
    /// ticks or for as long as playback lasts.
    pub fn schedule_repeat(
        &mut self,
        interval: Ticks,
        start: Ticks,
        duration: Option<Ticks>,
        mut callback: impl FnMut(&mut Transport, TickInfo) + 'static,
    ) -> Result<EventId> {
        if interval == 0 {
            return Err(EngineError::InvalidTicks {
                what: "repeat interval",
                value: 0.0,
            });
        }
        let duration = duration.unwrap_or_else(|| MAX_TICKS.saturating_sub(start));
        let event = TransportEvent::new(start, duration).on_tick(move |transport, info| {
            let elapsed = info.ticks - info.event.time;
            if info.ticks < info.event.end() && elapsed % interval == 0 {
                callback(transport, info);
            }
        });
        self.schedule(event)
    }

    pub(crate) fn insert(&mut self, id: EventId, event: TransportEvent) -> Result<()> {
        check_span(&event)?;
        if self.events.contains_key(&id) {
            return Err(EngineError::msg(format!("{id:?} is already scheduled")));
        }
        self.timeline.add(TimelineEntry {
            time: event.time as f64,
            id,
        })?;
        tracing::trace!(?id, time = event.time, duration = event.duration, "event scheduled");
        self.events.insert(id, event);
        self.check_now_active(id, false);
        Ok(())
    }

    /// Takes an event off the transport. An event that was sounding gets its
    /// `on_end` before this returns. Unknown handles are ignored.
    pub fn remove(&mut self, id: EventId) -> Option<RemovedEvent> {
        let event = self.events.remove(&id)?;
        self.timeline.remove(&TimelineEntry {
            time: event.time as f64,
            id,
        });
        self.fired.retain(|fired| *fired != id);

        if self.deactivate(id) {
            if let Some(callback) = event.on_end.clone() {
                let info = self.end_info(event.span(id));
                invoke(&callback, self, info);
            }
        }
        tracing::trace!(?id, "event removed");
        Some(RemovedEvent { id, event })
    }

    /// Removes every event starting at or after `after`.
    pub fn cancel(&mut self, after: Ticks) -> usize {
        let ids: Vec<EventId> = self
            .timeline
            .starting_at(after as f64)
            .iter()
            .map(|entry| entry.id)
            .collect();
        ids.into_iter().filter(|id| self.remove(*id).is_some()).count()
    }

    pub fn clear(&mut self) -> usize {
        self.cancel(0)
    }

    pub fn event(&self, id: EventId) -> Option<EventSpan> {
        self.span(id)
    }

    pub fn is_active(&self, id: EventId) -> bool {
        self.active.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns whether the event exists. Moving the start re-sorts the
    /// timeline and reconciles the event with the current tick.
    pub fn set_start_time(&mut self, id: EventId, time: Ticks) -> Result<bool> {
        self.update(id, |event| event.time = time)
    }

    pub fn set_offset(&mut self, id: EventId, offset: Ticks) -> Result<bool> {
        self.update(id, |event| event.offset = offset)
    }

    pub fn set_duration(&mut self, id: EventId, duration: Ticks) -> Result<bool> {
        self.update(id, |event| event.duration = duration)
    }

    pub fn set_row(&mut self, id: EventId, row: i32) -> Result<bool> {
        self.update(id, |event| event.row = row)
    }

    fn update(&mut self, id: EventId, edit: impl FnOnce(&mut TransportEvent)) -> Result<bool> {
        let Some(event) = self.events.get(&id) else {
            return Ok(false);
        };
        let was_covering = self
            .current
            .map_or(false, |(_, tick)| event.span(id).covers(tick));
        let previous = TimelineEntry {
            time: event.time as f64,
            id,
        };
        let mut edited = event.clone();
        edit(&mut edited);
        check_span(&edited)?;

        self.timeline.remove(&previous);
        self.timeline.add(TimelineEntry {
            time: edited.time as f64,
            id,
        })?;
        self.events.insert(id, edited);
        self.check_now_active(id, was_covering);
        Ok(true)
    }

    // Filters and notifications

    /// Adds a predicate every event must satisfy to start or keep sounding.
    pub fn add_filter(&mut self, filter: impl Fn(&EventSpan) -> bool + 'static) -> FilterId {
        let id = FilterId(self.next_id);
        self.next_id += 1;
        self.filters.push((id, Box::new(filter)));
        id
    }

    pub fn remove_filter(&mut self, id: FilterId) -> bool {
        let before = self.filters.len();
        self.filters.retain(|(candidate, _)| *candidate != id);
        self.filters.len() != before
    }

    /// Called on the first tick after a start, resume, reposition or loop wrap.
    pub fn on_did_before_start(&mut self, listener: impl FnMut(&Boundary) + 'static) -> Subscription {
        let id = self.next_subscription();
        self.before_start.subscribe(id, listener);
        id
    }

    /// Called before a loop wrap or stop ends every sounding event.
    pub fn on_did_before_end(&mut self, listener: impl FnMut(&Boundary) + 'static) -> Subscription {
        let id = self.next_subscription();
        self.before_end.subscribe(id, listener);
        id
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.before_start.unsubscribe(subscription) || self.before_end.unsubscribe(subscription)
    }

    fn next_subscription(&mut self) -> Subscription {
        let id = Subscription(self.next_id);
        self.next_id += 1;
        id
    }

    // Processing

    /// Catches up with the host time, processing every tick boundary since
    /// the previous call.
    pub fn process(&mut self) {
        let mut cursor = self.clock.begin();
        while let Some(event) = cursor.next(&self.clock) {
            match event {
                ClockEvent::Started { time, ticks } => {
                    tracing::debug!(time, ticks, "transport started");
                    self.first_tick = true;
                }
                ClockEvent::Paused { time } => {
                    tracing::debug!(time, "transport paused");
                    self.flush_active(time);
                }
                ClockEvent::Stopped { time } => {
                    tracing::debug!(time, "transport stopped");
                    self.end_playback(time);
                }
                ClockEvent::Tick { time, ticks } => self.process_tick(time, ticks, false),
            }
        }
    }

    /// Runs one tick boundary. Embedded transports are driven through this
    /// with `is_child` set, which disables looping.
    pub fn process_tick(&mut self, seconds: Seconds, tick: Ticks, is_child: bool) {
        let mut tick = tick;
        if !is_child && self.looping && tick >= self.loop_end {
            tracing::debug!(seconds, tick, loop_start = self.loop_start, "loop wrap");
            self.before_end.emit(&Boundary {
                seconds,
                ticks: tick,
            });
            self.flush_active(seconds);
            if let Err(err) = self.clock.set_ticks_at_time(self.loop_start as f64, seconds) {
                tracing::warn!(%err, "failed to rebase clock at loop wrap");
            }
            tick = self.loop_start;
            self.first_tick = true;
        }

        tracing::trace!(seconds, tick, "tick");
        self.current = Some((seconds, tick));
        self.fired.clear();
        let outer = std::mem::replace(&mut self.in_tick, true);
        let epoch = self.epoch;

        if std::mem::take(&mut self.first_tick) {
            self.before_start.emit(&Boundary {
                seconds,
                ticks: tick,
            });
            self.catch_up(seconds, tick, epoch);
        }
        self.start_exact(seconds, tick, epoch);
        self.sweep(seconds, tick, epoch);
        self.in_tick = outer;
    }

    /// Time of the tick whose callbacks are running, if any.
    fn dispatch_time(&self) -> Option<Seconds> {
        self.current
            .filter(|_| self.in_tick)
            .map(|(seconds, _)| seconds)
    }

    /// Starts events whose span contains `tick` but began before it.
    fn catch_up(&mut self, seconds: Seconds, tick: Ticks, epoch: u64) {
        let candidates: Vec<EventId> = self
            .timeline
            .before(tick as f64)
            .iter()
            .map(|entry| entry.id)
            .collect();

        for id in candidates {
            if self.epoch != epoch {
                return;
            }
            let Some(span) = self.span(id) else { continue };
            if !(span.time < tick && tick < span.end()) || self.already_started(id) {
                continue;
            }
            if self.passes_filters(&span) {
                self.begin_event(id, span, seconds, tick);
            }
        }
    }

    fn start_exact(&mut self, seconds: Seconds, tick: Ticks, epoch: u64) {
        let candidates: Vec<EventId> = self
            .timeline
            .at_time(tick as f64)
            .iter()
            .map(|entry| entry.id)
            .collect();

        for id in candidates {
            if self.epoch != epoch {
                return;
            }
            let Some(span) = self.span(id) else { continue };
            if span.time != tick || self.already_started(id) {
                continue;
            }
            if self.passes_filters(&span) {
                self.begin_event(id, span, seconds, tick);
            }
        }
    }

    fn sweep(&mut self, seconds: Seconds, tick: Ticks, epoch: u64) {
        for id in self.active.clone() {
            if self.epoch != epoch {
                return;
            }
            if !self.active.contains(&id) {
                continue;
            }
            let Some(span) = self.span(id) else {
                self.deactivate(id);
                continue;
            };
            let info = TickInfo {
                seconds,
                ticks: tick,
                event: span,
            };

            if !self.passes_filters(&span) || span.end() < tick || span.time > tick {
                self.end_event(id, info);
            } else if span.end() == tick {
                self.fire_tick(id, info);
                self.end_event(id, info);
            } else {
                self.fire_tick(id, info);
            }
        }
    }

    /// Reconciles an event that was added or edited against the last
    /// processed tick.
    fn check_now_active(&mut self, id: EventId, was_covering: bool) {
        let Some((seconds, tick)) = self.current else { return };
        let Some(span) = self.span(id) else { return };

        if span.covers(tick) {
            if !was_covering && !self.already_started(id) && self.passes_filters(&span) {
                self.begin_event(id, span, seconds, tick);
            }
        } else if self.is_active(id) {
            self.end_event(
                id,
                TickInfo {
                    seconds,
                    ticks: tick,
                    event: span,
                },
            );
        }
    }

    fn already_started(&self, id: EventId) -> bool {
        self.fired.contains(&id) || self.active.contains(&id)
    }

    /// Fires `on_start` or `on_mid_start` depending on where `tick` falls in
    /// the span, then tracks the event if it wants further notifications.
    fn begin_event(&mut self, id: EventId, span: EventSpan, seconds: Seconds, tick: Ticks) {
        let epoch = self.epoch;
        self.fired.push(id);
        if span.time == tick {
            if let Some(callback) = self.events.get(&id).and_then(|e| e.on_start.clone()) {
                let info = TickInfo {
                    seconds,
                    ticks: tick,
                    event: span,
                };
                invoke(&callback, self, info);
            }
        } else if let Some(callback) = self.events.get(&id).and_then(|e| e.on_mid_start.clone()) {
            let ticks_offset = tick - span.time;
            let info = MidStartInfo {
                seconds,
                ticks: tick,
                ticks_offset,
                seconds_offset: self.seconds_offset(seconds, ticks_offset),
                event: span,
            };
            invoke(&callback, self, info);
        }

        let needs_ticks = self.events.get(&id).map_or(false, TransportEvent::needs_ticks);
        if needs_ticks && self.epoch == epoch && !self.active.contains(&id) {
            self.active.push(id);
        }
    }

    fn fire_tick(&mut self, id: EventId, info: TickInfo) {
        if let Some(callback) = self.events.get(&id).and_then(|e| e.on_tick.clone()) {
            invoke(&callback, self, info);
        }
    }

    /// Drops the event from the active set and fires `on_end` if it was
    /// still there.
    fn end_event(&mut self, id: EventId, info: TickInfo) {
        if !self.deactivate(id) {
            return;
        }
        if let Some(callback) = self.events.get(&id).and_then(|e| e.on_end.clone()) {
            invoke(&callback, self, info);
        }
    }

    fn deactivate(&mut self, id: EventId) -> bool {
        let before = self.active.len();
        self.active.retain(|active| *active != id);
        self.active.len() != before
    }

    /// Ends every sounding event. The current tick is forgotten first so
    /// edits made from `on_end` do not restart anything.
    pub(crate) fn flush_active(&mut self, seconds: Seconds) {
        let tick = self.current.map_or_else(
            || self.clock.get_ticks_at_time(seconds).floor() as Ticks,
            |(_, tick)| tick,
        );
        self.current = None;
        self.fired.clear();
        self.epoch += 1;

        for id in std::mem::take(&mut self.active) {
            let Some(span) = self.span(id) else { continue };
            if let Some(callback) = self.events.get(&id).and_then(|e| e.on_end.clone()) {
                let info = TickInfo {
                    seconds,
                    ticks: tick,
                    event: span,
                };
                invoke(&callback, self, info);
            }
        }
    }

    fn end_playback(&mut self, seconds: Seconds) {
        if self.current.is_some() || !self.active.is_empty() {
            let ticks = self.current.map_or(0, |(_, tick)| tick);
            self.before_end.emit(&Boundary { seconds, ticks });
        }
        self.flush_active(seconds);
        self.first_tick = false;
    }

    pub(crate) fn mark_first_tick(&mut self) {
        self.first_tick = true;
    }

    fn end_info(&self, event: EventSpan) -> TickInfo {
        let (seconds, ticks) = self.current.unwrap_or_else(|| {
            let now = self.context().now();
            (now, self.clock.get_ticks_at_time(now).floor() as Ticks)
        });
        TickInfo {
            seconds,
            ticks,
            event,
        }
    }

    fn span(&self, id: EventId) -> Option<EventSpan> {
        self.events.get(&id).map(|event| event.span(id))
    }

    fn passes_filters(&self, span: &EventSpan) -> bool {
        self.filters.iter().all(|(_, filter)| filter(span))
    }

    /// Wall time spent on the last `ticks_offset` ticks before `seconds`.
    fn seconds_offset(&self, seconds: Seconds, ticks_offset: Ticks) -> Seconds {
        let tempo = self.tempo();
        let area = tempo.get_ticks_at_time(seconds);
        let ticks = ticks_offset as f64;
        if area >= ticks {
            let start = tempo.get_time_of_tick(area - ticks);
            if start.is_finite() {
                return (seconds - start).max(0.0);
            }
        }
        // Position was rebased ahead of the tempo curve: use the current rate.
        let rate = tempo.get_rate_at_time(seconds);
        if rate > 0.0 {
            ticks / rate
        } else {
            0.0
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("state", &self.state())
            .field("ppq", &self.ppq)
            .field("events", &self.events.len())
            .field("active", &self.active)
            .field("filters", &self.filters.len())
            .field("looping", &self.looping)
            .field("loop", &(self.loop_start..self.loop_end))
            .field("current", &self.current)
            .finish()
    }
}

fn check_loop(start: Ticks, end: Ticks) -> Result<()> {
    if end <= start {
        return Err(EngineError::InvalidLoop { start, end });
    }
    check_tick_range("loop end", end)
}

fn check_tick_range(what: &'static str, ticks: Ticks) -> Result<()> {
    if ticks <= MAX_TICKS {
        Ok(())
    } else {
        Err(EngineError::InvalidTicks {
            what,
            value: ticks as f64,
        })
    }
}

fn check_span(event: &TransportEvent) -> Result<()> {
    match event.time.checked_add(event.duration) {
        Some(end) => check_tick_range("event end", end),
        None => Err(EngineError::InvalidTicks {
            what: "event end",
            value: event.time as f64 + event.duration as f64,
        }),
    }
}

/// Converts a fractional tick count coming from outside the engine,
/// rejecting NaN, infinite and negative values.
pub fn ticks_from_f64(what: &'static str, value: f64) -> Result<Ticks> {
    let value = check_ticks(what, value)?;
    let ticks = value.round();
    if ticks > MAX_TICKS as f64 {
        return Err(EngineError::InvalidTicks { what, value });
    }
    Ok(ticks as Ticks)
}
