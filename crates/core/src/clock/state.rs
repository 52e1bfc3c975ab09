use serde::{Deserialize, Serialize};

use crate::timeline::{Timed, Timeline};
use crate::Result;

/// Playback state of a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockState {
    #[default]
    Stopped,
    Started,
    Paused,
}

/// A state change scheduled at a point in wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateEvent {
    pub state: ClockState,
    pub time: f64,
}

impl Timed for StateEvent {
    fn time(&self) -> f64 {
        self.time
    }
}

/// Answers "what state is the clock in at time t" for past and future t.
#[derive(Debug, Clone)]
pub struct StateTimeline {
    initial: ClockState,
    events: Timeline<StateEvent>,
}

impl StateTimeline {
    pub fn new(initial: ClockState) -> Self {
        Self {
            initial,
            events: Timeline::new(),
        }
    }

    pub fn events(&self) -> &Timeline<StateEvent> {
        &self.events
    }

    pub fn state_at(&self, time: f64) -> ClockState {
        self.events
            .get(time)
            .map_or(self.initial, |event| event.state)
    }

    pub fn set_state_at_time(&mut self, state: ClockState, time: f64) -> Result<()> {
        self.events.add(StateEvent { state, time })
    }

    /// Latest transition into `state` at or before `time`.
    pub fn last_state(&self, state: ClockState, time: f64) -> Option<StateEvent> {
        let through = self.events.before(time).len() + self.events.at_time(time).len();
        self.events
            .iter()
            .take(through)
            .rev()
            .find(|event| event.state == state)
            .copied()
    }

    /// Drops transitions at or after `time`.
    pub fn cancel(&mut self, time: f64) {
        self.events.cancel(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_state_queries_in_past_and_future() {
        let mut states = StateTimeline::new(ClockState::Stopped);
        states.set_state_at_time(ClockState::Started, 1.0).unwrap();
        states.set_state_at_time(ClockState::Paused, 2.0).unwrap();
        states.set_state_at_time(ClockState::Started, 3.0).unwrap();

        assert_eq!(states.state_at(0.5), ClockState::Stopped);
        assert_eq!(states.state_at(1.0), ClockState::Started);
        assert_eq!(states.state_at(2.5), ClockState::Paused);
        assert_eq!(states.state_at(10.0), ClockState::Started);

        assert_eq!(states.last_state(ClockState::Started, 2.5).map(|e| e.time), Some(1.0));
        assert_eq!(states.last_state(ClockState::Started, 3.0).map(|e| e.time), Some(3.0));
        assert_eq!(states.last_state(ClockState::Stopped, 5.0), None);

        states.cancel(2.0);
        assert_eq!(states.state_at(10.0), ClockState::Started);
        assert_eq!(states.events().len(), 1);
    }
}
