mod state;

pub use state::{ClockState, StateEvent, StateTimeline};

use crate::error::{check_ticks, check_time};
use crate::timeline::{Timed, Timeline};
use crate::{Context, Result, Seconds, TickSignal, Ticks};

/// Tolerance used when deciding whether a position sits on a tick boundary.
const TICK_EPSILON: f64 = 1e-6;

/// Something the clock observed while catching up to the host time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockEvent {
    Started { time: Seconds, ticks: f64 },
    Paused { time: Seconds },
    Stopped { time: Seconds },
    Tick { time: Seconds, ticks: Ticks },
}

impl ClockEvent {
    pub fn time(&self) -> Seconds {
        match *self {
            Self::Started { time, .. }
            | Self::Paused { time }
            | Self::Stopped { time }
            | Self::Tick { time, .. } => time,
        }
    }
}

/// Rebases the tick counter at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TickOffset {
    time: Seconds,
    ticks: f64,
    seconds: Seconds,
}

impl Timed for TickOffset {
    fn time(&self) -> f64 {
        self.time
    }
}

#[derive(Debug, Clone)]
pub struct Clock {
    context: Context,
    frequency: TickSignal,
    state: StateTimeline,
    offsets: Timeline<TickOffset>,
    last_update: Seconds,
}

impl Clock {
    pub fn new(context: Context, frequency: TickSignal) -> Self {
        let last_update = context.now();
        Self {
            context,
            frequency,
            state: StateTimeline::new(ClockState::Stopped),
            offsets: Timeline::new(),
            last_update,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn frequency(&self) -> &TickSignal {
        &self.frequency
    }

    pub fn frequency_mut(&mut self) -> &mut TickSignal {
        &mut self.frequency
    }

    pub fn states(&self) -> &StateTimeline {
        &self.state
    }

    /// Host time up to which [`process`](Self::process) has run.
    pub fn last_update(&self) -> Seconds {
        self.last_update
    }

    /// Schedules a start at `when` (default: now). Starting a clock that is
    /// already started at that time is a no-op. When `offset` is given the
    /// counter jumps to it at the start time.
    pub fn start(&mut self, when: Option<Seconds>, offset: Option<f64>) -> Result<&mut Self> {
        let when = self.resolve(when)?;
        let offset = offset.map(|ticks| check_ticks("start offset", ticks)).transpose()?;

        if self.state.state_at(when) != ClockState::Started {
            self.state.set_state_at_time(ClockState::Started, when)?;
            if let Some(ticks) = offset {
                self.set_ticks_at_time(ticks, when)?;
            }
            tracing::debug!(when, ?offset, "clock start scheduled");
        }
        Ok(self)
    }

    /// Schedules a pause at `when`. The counter freezes until the next start.
    pub fn pause(&mut self, when: Option<Seconds>) -> Result<&mut Self> {
        let when = self.resolve(when)?;
        if self.state.state_at(when) == ClockState::Started {
            self.state.set_state_at_time(ClockState::Paused, when)?;
            tracing::debug!(when, "clock pause scheduled");
        }
        Ok(self)
    }

    /// Schedules a stop at `when`, discarding anything queued after it. The
    /// counter returns to the origin the last run started from.
    pub fn stop(&mut self, when: Option<Seconds>) -> Result<&mut Self> {
        let when = self.resolve(when)?;
        let origin = self.origin_at(when);

        self.state.cancel(when);
        self.offsets.cancel(when);
        self.state.set_state_at_time(ClockState::Stopped, when)?;
        self.offsets.add(TickOffset {
            time: when,
            ticks: origin,
            seconds: 0.0,
        })?;
        tracing::debug!(when, origin, "clock stop scheduled");
        Ok(self)
    }

    /// Drops every state change and tick rebase at or after `after`.
    pub fn cancel(&mut self, after: Seconds) -> Result<&mut Self> {
        let after = check_time("cancel time", after)?;
        self.state.cancel(after);
        self.offsets.cancel(after);
        Ok(self)
    }

    /// State at the current host time.
    pub fn get_state(&self) -> ClockState {
        self.state_at(self.context.now())
    }

    pub fn state_at(&self, time: Seconds) -> ClockState {
        self.state.state_at(time)
    }

    /// Tick position at the current host time.
    pub fn ticks(&self) -> f64 {
        self.get_ticks_at_time(self.context.now())
    }

    /// Tick position at `time`, past or future. Ticks accumulate only while
    /// started, hold while paused and return to the origin on stop.
    pub fn get_ticks_at_time(&self, time: Seconds) -> f64 {
        self.position_at(time).0
    }

    /// Seconds spent started since the last stop, following the same rules
    /// as ticks.
    pub fn get_seconds_at_time(&self, time: Seconds) -> Seconds {
        self.position_at(time).1
    }

    pub fn seconds(&self) -> Seconds {
        self.get_seconds_at_time(self.context.now())
    }

    /// Rebases the counter so that it reads `ticks` at `time`. Later rebases
    /// are discarded.
    pub fn set_ticks_at_time(&mut self, ticks: f64, time: Seconds) -> Result<&mut Self> {
        let ticks = check_ticks("ticks", ticks)?;
        let time = check_time("rebase time", time)?;
        let seconds = self.frequency.get_duration_of_ticks(ticks, time);

        self.offsets.cancel(time);
        self.offsets.add(TickOffset {
            time,
            ticks,
            seconds: if seconds.is_finite() { seconds } else { 0.0 },
        })?;
        Ok(self)
    }

    /// Wall time of the first tick boundary strictly after `after`, if the
    /// clock ever gets there without changing state.
    pub fn next_tick_time(&self, after: Seconds) -> Option<Seconds> {
        self.next_tick(after, false, f64::INFINITY)
            .map(|(time, _)| time)
    }

    /// Catches up to the host time, reporting transitions and every tick
    /// boundary in `[last update, now)` in time order.
    pub fn process(&mut self, mut on_event: impl FnMut(ClockEvent)) {
        let mut cursor = self.begin();
        while let Some(event) = cursor.next(self) {
            on_event(event);
        }
    }

    /// Opens the window `[last update, now)` and marks it as processed. The
    /// returned cursor is advanced with [`TickCursor::next`], which only
    /// borrows the clock, so owners can mutate it between steps.
    pub fn begin(&mut self) -> TickCursor {
        let start = self.last_update;
        let end = self.context.now().max(start);
        self.last_update = end;
        TickCursor {
            position: start,
            inclusive: true,
            end,
            watermark: (start, 0),
        }
    }

    fn resolve(&self, when: Option<Seconds>) -> Result<Seconds> {
        check_time("when", when.unwrap_or_else(|| self.context.now()))
    }

    /// Tick value the current run started from: the latest rebase between the
    /// previous stop and the start that followed it.
    fn origin_at(&self, time: Seconds) -> f64 {
        let stopped = self.state.last_state(ClockState::Stopped, time);
        let since = stopped.map_or(f64::NEG_INFINITY, |event| event.time);
        let started = self
            .state
            .events()
            .starting_at(since)
            .iter()
            .take_while(|event| event.time <= time)
            .find(|event| event.state == ClockState::Started)
            .map_or(time, |event| event.time);

        self.offsets
            .starting_at(since)
            .iter()
            .take_while(|offset| offset.time <= started)
            .last()
            .map_or(0.0, |offset| offset.ticks)
    }

    /// Replays transitions and rebases since the last stop. At equal times
    /// the state change is applied before the rebase.
    fn position_at(&self, time: Seconds) -> (f64, Seconds) {
        let since = self
            .state
            .last_state(ClockState::Stopped, time)
            .map_or(f64::NEG_INFINITY, |event| event.time);

        let mut states = self
            .state
            .events()
            .starting_at(since)
            .iter()
            .take_while(|event| event.time <= time)
            .peekable();
        let mut offsets = self
            .offsets
            .starting_at(since)
            .iter()
            .take_while(|offset| offset.time <= time)
            .peekable();

        let mut ticks = 0.0;
        let mut seconds = 0.0;
        let mut running = false;
        let mut segment_start = since;

        loop {
            let take_state = match (states.peek(), offsets.peek()) {
                (Some(state), Some(offset)) => state.time <= offset.time,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };

            if take_state {
                let Some(event) = states.next() else { break };
                if running {
                    ticks += self.elapsed_ticks(segment_start, event.time);
                    seconds += event.time - segment_start;
                }
                running = event.state == ClockState::Started;
                if event.state == ClockState::Stopped {
                    ticks = 0.0;
                    seconds = 0.0;
                }
                segment_start = event.time;
            } else {
                let Some(offset) = offsets.next() else { break };
                ticks = offset.ticks;
                seconds = offset.seconds;
                segment_start = offset.time;
            }
        }

        if running {
            ticks += self.elapsed_ticks(segment_start, time);
            seconds += time - segment_start;
        }
        (ticks, seconds)
    }

    fn elapsed_ticks(&self, from: Seconds, to: Seconds) -> f64 {
        self.frequency.get_ticks_at_time(to) - self.frequency.get_ticks_at_time(from)
    }

    /// First integer tick boundary at or after (`inclusive`) or strictly
    /// after `from` and before `limit`, staying inside the started span
    /// that contains `from`. Rebases met on the way re-anchor the count.
    fn next_tick(&self, from: Seconds, inclusive: bool, limit: Seconds) -> Option<(Seconds, Ticks)> {
        let mut from = from;
        let mut inclusive = inclusive;
        loop {
            if from >= limit {
                return None;
            }
            let current = self.state.events().get(from)?;
            if current.state != ClockState::Started {
                return None;
            }

            let (anchor_time, anchor_ticks) = match self.offsets.get(from) {
                Some(offset) if offset.time >= current.time => (offset.time, offset.ticks),
                _ => (current.time, self.get_ticks_at_time(current.time)),
            };
            let anchor_area = self.frequency.get_ticks_at_time(anchor_time);
            let position = anchor_ticks + self.frequency.get_ticks_at_time(from) - anchor_area;
            let mut boundary = if inclusive {
                (position - TICK_EPSILON).ceil()
            } else {
                (position + TICK_EPSILON).floor() + 1.0
            }
            .max(0.0);
            let tick_time = |boundary: f64| {
                if boundary == anchor_ticks {
                    anchor_time
                } else {
                    self.frequency
                        .get_time_of_tick(anchor_area + boundary - anchor_ticks)
                }
            };
            let mut time = tick_time(boundary);
            if inclusive && time < from {
                // Already reported by the window that ended at `from`.
                boundary += 1.0;
                time = tick_time(boundary);
            }
            let time = time.max(from);

            if let Some(offset) = self.offsets.get_after(from) {
                if offset.time <= time && offset.time < limit {
                    from = offset.time;
                    inclusive = true;
                    continue;
                }
            }
            return (time < limit).then_some((time, boundary as Ticks));
        }
    }
}

/// Incremental walk over one processing window of a [`Clock`].
#[derive(Debug, Clone)]
pub struct TickCursor {
    position: Seconds,
    inclusive: bool,
    end: Seconds,
    /// Time of the last reported transition and how many transitions at
    /// that time have been reported.
    watermark: (Seconds, usize),
}

impl TickCursor {
    /// End of the window (exclusive).
    pub fn end(&self) -> Seconds {
        self.end
    }

    /// Next transition or tick boundary in the window. State queued at the
    /// same instant as a tick is reported before that tick.
    pub fn next(&mut self, clock: &Clock) -> Option<ClockEvent> {
        let transition = self.pending_transition(clock);
        let limit = transition.map_or(self.end, |event| event.time);

        if let Some((time, ticks)) = clock.next_tick(self.position, self.inclusive, limit) {
            self.position = time;
            self.inclusive = false;
            return Some(ClockEvent::Tick { time, ticks });
        }

        let event = transition?;
        self.watermark = if event.time == self.watermark.0 {
            (event.time, self.watermark.1 + 1)
        } else {
            (event.time, 1)
        };
        if event.time >= self.position {
            self.position = event.time;
            self.inclusive = true;
        }

        let time = event.time;
        Some(match event.state {
            ClockState::Started => ClockEvent::Started {
                time,
                ticks: clock.get_ticks_at_time(time),
            },
            ClockState::Paused => ClockEvent::Paused { time },
            ClockState::Stopped => ClockEvent::Stopped { time },
        })
    }

    fn pending_transition(&self, clock: &Clock) -> Option<StateEvent> {
        let (time, reported) = self.watermark;
        let events = clock.state.events();
        let group = events.at_time(time);
        let candidate = if reported < group.len() {
            Some(group[reported])
        } else {
            events.get_after(time).copied()
        };
        candidate.filter(|event| event.time < self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(rate: f64) -> Clock {
        Clock::new(Context::new(48_000), TickSignal::new(rate).unwrap())
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn drain(clock: &mut Clock, until: Seconds) -> Vec<ClockEvent> {
        clock.context().set_now(until).unwrap();
        let mut events = Vec::new();
        clock.process(|event| events.push(event));
        events
    }

    fn ticks_of(events: &[ClockEvent]) -> Vec<Ticks> {
        events
            .iter()
            .filter_map(|event| match event {
                ClockEvent::Tick { ticks, .. } => Some(*ticks),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn pause_freezes_and_stop_resets_ticks() {
        let mut clock = clock(10.0);
        clock.start(Some(0.0), None).unwrap().pause(Some(0.1)).unwrap();

        let paused = clock.get_ticks_at_time(0.1);
        assert_close(paused, 1.0);
        for time in [0.1, 0.5, 3.0, 100.0] {
            assert_close(clock.get_ticks_at_time(time), paused);
        }

        clock.stop(Some(0.2)).unwrap();
        assert_close(clock.get_ticks_at_time(0.15), 1.0);
        assert_close(clock.get_ticks_at_time(0.2), 0.0);
        assert_close(clock.get_ticks_at_time(7.0), 0.0);
    }

    #[test]
    fn future_transitions_describe_a_whole_timeline() {
        let mut clock = clock(4.0);
        clock
            .start(Some(1.0), None)
            .unwrap()
            .pause(Some(2.0))
            .unwrap()
            .start(Some(3.0), None)
            .unwrap()
            .stop(Some(5.0))
            .unwrap();

        assert_eq!(clock.state_at(0.5), ClockState::Stopped);
        assert_eq!(clock.state_at(1.5), ClockState::Started);
        assert_eq!(clock.state_at(2.5), ClockState::Paused);
        assert_eq!(clock.state_at(4.0), ClockState::Started);
        assert_eq!(clock.state_at(5.0), ClockState::Stopped);
        assert_eq!(clock.get_state(), ClockState::Stopped);

        assert_close(clock.get_ticks_at_time(1.5), 2.0);
        assert_close(clock.get_ticks_at_time(2.5), 4.0);
        assert_close(clock.get_ticks_at_time(4.0), 8.0);
        assert_close(clock.get_seconds_at_time(4.0), 2.0);
    }

    #[test]
    fn set_ticks_rebases_and_stop_returns_to_origin() {
        let mut clock = clock(10.0);
        clock.set_ticks_at_time(50.0, 0.0).unwrap();
        clock.start(Some(0.0), None).unwrap();
        assert_close(clock.get_ticks_at_time(1.0), 60.0);

        clock.set_ticks_at_time(5.0, 2.0).unwrap();
        assert_close(clock.get_ticks_at_time(2.5), 10.0);

        clock.stop(Some(3.0)).unwrap();
        assert_close(clock.get_ticks_at_time(3.5), 50.0);
        assert!(clock.set_ticks_at_time(-1.0, 0.0).is_err());
    }

    #[test]
    fn reports_every_boundary_across_coarse_windows() {
        let mut clock = clock(10.0);
        clock.start(Some(0.0), None).unwrap();

        let mut events = drain(&mut clock, 0.35);
        events.extend(drain(&mut clock, 0.35));
        events.extend(drain(&mut clock, 1.0));

        assert!(matches!(events[0], ClockEvent::Started { time, .. } if time == 0.0));
        assert_eq!(ticks_of(&events), (0..10).collect::<Vec<_>>());
        for event in &events[1..] {
            if let ClockEvent::Tick { time, ticks } = event {
                assert_close(*time, *ticks as f64 / 10.0);
            }
        }
    }

    #[test]
    fn windows_ending_on_a_tick_do_not_repeat_it() {
        let mut clock = clock(10.0);
        clock.start(Some(0.0), None).unwrap();

        let mut events = Vec::new();
        for _ in 0..10 {
            clock.context().advance(0.1).unwrap();
            clock.process(|event| events.push(event));
        }
        assert_eq!(ticks_of(&events), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn resumes_on_the_next_whole_tick_after_a_pause() {
        let mut clock = clock(10.0);
        clock
            .start(Some(0.0), None)
            .unwrap()
            .pause(Some(0.15))
            .unwrap()
            .start(Some(0.5), None)
            .unwrap();

        let events = drain(&mut clock, 1.0);
        assert_eq!(ticks_of(&events), vec![0, 1, 2, 3, 4, 5, 6]);
        assert!(events
            .iter()
            .any(|event| matches!(event, ClockEvent::Paused { time } if *time == 0.15)));

        let resumed_tick = events
            .iter()
            .find_map(|event| match event {
                ClockEvent::Tick { time, ticks: 2 } => Some(*time),
                _ => None,
            })
            .unwrap();
        assert_close(resumed_tick, 0.55);
    }

    #[test]
    fn ticks_follow_tempo_automation() {
        let mut clock = clock(10.0);
        clock.frequency_mut().set_value_at_time(20.0, 0.5).unwrap();
        clock.start(Some(0.0), None).unwrap();

        let events = drain(&mut clock, 1.0);
        assert_eq!(ticks_of(&events), (0..15).collect::<Vec<_>>());
        assert_eq!(clock.next_tick_time(0.99).map(|t| (t * 100.0).round()), Some(100.0));
    }

    #[test]
    fn start_with_offset_and_rejects_bad_times() {
        let mut clock = clock(10.0);
        clock.start(Some(0.0), Some(8.0)).unwrap();
        let events = drain(&mut clock, 0.25);
        assert_eq!(ticks_of(&events), vec![8, 9, 10]);

        assert!(clock.start(Some(f64::NAN), None).is_err());
        assert!(clock.pause(Some(-1.0)).is_err());
        assert!(clock.start(Some(1.0), Some(-3.0)).is_err());
    }
}
