mod automation;
mod segment;

pub use automation::AutomationEvent;

use segment::{Curve, Segment};

use crate::error::check_time;
use crate::timeline::{Timed, Timeline};
use crate::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct TickSignal {
    initial: f64,
    multiplier: f64,
    events: Timeline<AutomationEvent>,
    /// Piecewise description of the value, rebuilt after every mutation.
    segments: Vec<Segment>,
}

impl TickSignal {
    /// A signal whose value is the tick rate in ticks per second.
    pub fn new(ticks_per_second: f64) -> Result<Self> {
        Self::with_multiplier(ticks_per_second, 1.0)
    }

    /// A tempo signal in beats per minute ticking at `ppq` pulses per beat.
    pub fn bpm(bpm: f64, ppq: u32) -> Result<Self> {
        if ppq == 0 {
            return Err(EngineError::InvalidValue {
                what: "ppq",
                value: 0.0,
            });
        }
        Self::with_multiplier(bpm, f64::from(ppq) / 60.0)
    }

    pub fn with_multiplier(value: f64, multiplier: f64) -> Result<Self> {
        check_rate("initial value", value)?;
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(EngineError::InvalidValue {
                what: "tick multiplier",
                value: multiplier,
            });
        }

        let mut signal = Self {
            initial: value,
            multiplier,
            events: Timeline::new(),
            segments: Vec::new(),
        };
        signal.rebuild();
        Ok(signal)
    }

    pub fn initial_value(&self) -> f64 {
        self.initial
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn events(&self) -> &Timeline<AutomationEvent> {
        &self.events
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) -> Result<&mut Self> {
        check_rate("value", value)?;
        let time = check_time("automation time", time)?;
        self.insert(AutomationEvent::SetValue { time, value })
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f64, time: f64) -> Result<&mut Self> {
        check_rate("ramp value", value)?;
        let time = check_time("ramp end time", time)?;
        self.insert(AutomationEvent::LinearRamp { time, value })
    }

    pub fn exponential_ramp_to_value_at_time(
        &mut self,
        value: f64,
        time: f64,
    ) -> Result<&mut Self> {
        if !(value.is_finite() && value > 0.0) {
            return Err(EngineError::InvalidValue {
                what: "exponential ramp value",
                value,
            });
        }
        let time = check_time("ramp end time", time)?;
        self.insert(AutomationEvent::ExponentialRamp { time, value })
    }

    /// Starts approaching `value` at `time`, covering ~63% of the remaining
    /// distance every `time_constant` seconds. A zero time constant jumps.
    pub fn set_target_at_time(
        &mut self,
        value: f64,
        time: f64,
        time_constant: f64,
    ) -> Result<&mut Self> {
        check_rate("target value", value)?;
        let time = check_time("target start time", time)?;
        if !(time_constant.is_finite() && time_constant >= 0.0) {
            return Err(EngineError::InvalidValue {
                what: "time constant",
                value: time_constant,
            });
        }
        self.insert(AutomationEvent::SetTarget {
            time,
            value,
            time_constant,
        })
    }

    /// Removes every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) -> Result<&mut Self> {
        let time = check_time("cancel time", time)?;
        self.events.cancel(time);
        self.rebuild();
        Ok(self)
    }

    /// Like [`cancel_scheduled_values`](Self::cancel_scheduled_values), but
    /// the value the curve had at `time` is kept from then on. A ramp that
    /// was in flight is shortened so it ends at `time` on that value.
    pub fn cancel_and_hold_at_time(&mut self, time: f64) -> Result<&mut Self> {
        let time = check_time("cancel time", time)?;
        let held = self.get_value_at_time(time);
        let in_flight = self.events.get_after(time).copied();

        self.events.cancel(time);
        let replacement = match in_flight {
            Some(AutomationEvent::LinearRamp { .. }) => {
                AutomationEvent::LinearRamp { time, value: held }
            }
            Some(AutomationEvent::ExponentialRamp { .. }) if held > 0.0 => {
                AutomationEvent::ExponentialRamp { time, value: held }
            }
            _ => AutomationEvent::SetValue { time, value: held },
        };
        self.insert(replacement)
    }

    /// Pins the current curve value at `time` so a following ramp starts
    /// from there instead of from the previous event.
    pub fn set_ramp_point(&mut self, time: f64) -> Result<&mut Self> {
        let time = check_time("ramp point", time)?;
        let value = self.get_value_at_time(time);
        self.insert(AutomationEvent::SetValue { time, value })
    }

    pub fn linear_ramp_to(&mut self, value: f64, ramp_time: f64, start: f64) -> Result<&mut Self> {
        check_rate("ramp value", value)?;
        check_time("ramp duration", ramp_time)?;
        self.set_ramp_point(start)?;
        self.linear_ramp_to_value_at_time(value, start + ramp_time)
    }

    pub fn exponential_ramp_to(
        &mut self,
        value: f64,
        ramp_time: f64,
        start: f64,
    ) -> Result<&mut Self> {
        check_time("ramp duration", ramp_time)?;
        if !(value.is_finite() && value > 0.0) {
            return Err(EngineError::InvalidValue {
                what: "exponential ramp value",
                value,
            });
        }
        self.set_ramp_point(start)?;
        self.exponential_ramp_to_value_at_time(value, start + ramp_time)
    }

    /// Approaches `value` so that it is within 1% of it after `ramp_time`.
    pub fn target_ramp_to(&mut self, value: f64, ramp_time: f64, start: f64) -> Result<&mut Self> {
        check_time("ramp duration", ramp_time)?;
        self.set_ramp_point(start)?;
        self.set_target_at_time(value, start, ramp_time / 100f64.ln())
    }

    /// Applies a serialised automation event, including `Cancel`.
    pub fn apply(&mut self, event: AutomationEvent) -> Result<&mut Self> {
        match event {
            AutomationEvent::SetValue { time, value } => self.set_value_at_time(value, time),
            AutomationEvent::LinearRamp { time, value } => {
                self.linear_ramp_to_value_at_time(value, time)
            }
            AutomationEvent::ExponentialRamp { time, value } => {
                self.exponential_ramp_to_value_at_time(value, time)
            }
            AutomationEvent::SetTarget {
                time,
                value,
                time_constant,
            } => self.set_target_at_time(value, time, time_constant),
            AutomationEvent::Cancel { time } => self.cancel_scheduled_values(time),
        }
    }

    /// Automation value, in the signal's own units, at `time`.
    pub fn get_value_at_time(&self, time: f64) -> f64 {
        match self.segment_at(time) {
            Some(segment) => segment.value_at(time - segment.start),
            None => self.initial,
        }
    }

    /// Tick rate (ticks per second) at `time`.
    pub fn get_rate_at_time(&self, time: f64) -> f64 {
        self.get_value_at_time(time) * self.multiplier
    }

    /// Ticks elapsed between time zero and `time`. Negative times yield 0.
    pub fn get_ticks_at_time(&self, time: f64) -> f64 {
        match self.segment_at(time) {
            Some(segment) => {
                let area = segment.area_at_start + segment.area(time - segment.start);
                (area * self.multiplier).max(0.0)
            }
            None => 0.0,
        }
    }

    /// Earliest time at which `ticks` ticks have elapsed since time zero.
    ///
    /// Returns `f64::INFINITY` when the rate drops to zero (or decays
    /// towards it) before that many ticks accumulate.
    pub fn get_time_of_tick(&self, ticks: f64) -> f64 {
        if ticks.is_nan() {
            return f64::NAN;
        }
        let area = ticks / self.multiplier;
        if area <= 0.0 {
            return 0.0;
        }

        let index = self.segments.partition_point(|s| s.area_at_start < area);
        if let Some(segment) = self.segments.get(index) {
            if segment.area_at_start == area {
                return segment.start;
            }
        }
        // The first segment starts at area zero, so `index` is at least one.
        let segment = &self.segments[index - 1];
        let dt = segment.solve(area - segment.area_at_start);
        if dt.is_finite() {
            segment.start + dt
        } else {
            f64::INFINITY
        }
    }

    /// Wall-clock duration of `ticks` ticks starting at `when`.
    pub fn get_duration_of_ticks(&self, ticks: f64, when: f64) -> f64 {
        let start = self.get_ticks_at_time(when);
        let end = self.get_time_of_tick(start + ticks);
        if end.is_finite() {
            (end - when).max(0.0)
        } else {
            f64::INFINITY
        }
    }

    /// Seconds needed to play `ticks` ticks from `when`.
    pub fn ticks_to_time(&self, ticks: f64, when: f64) -> f64 {
        self.get_duration_of_ticks(ticks, when)
    }

    /// Ticks played during `duration` seconds starting at `when`.
    pub fn time_to_ticks(&self, duration: f64, when: f64) -> f64 {
        self.get_ticks_at_time(when + duration) - self.get_ticks_at_time(when)
    }

    fn insert(&mut self, event: AutomationEvent) -> Result<&mut Self> {
        self.events.add(event)?;
        self.rebuild();
        Ok(self)
    }

    fn segment_at(&self, time: f64) -> Option<&Segment> {
        let index = self.segments.partition_point(|s| s.start <= time);
        index.checked_sub(1).map(|i| &self.segments[i])
    }

    /// Re-derives the piecewise curve and the cumulative areas. The initial
    /// value acts as an implicit `SetValue` at time zero.
    fn rebuild(&mut self) {
        let anchor = AutomationEvent::SetValue {
            time: 0.0,
            value: self.initial,
        };
        let points: Vec<AutomationEvent> = std::iter::once(anchor)
            .chain(self.events.iter().copied())
            .filter(|event| !matches!(event, AutomationEvent::Cancel { .. }))
            .collect();

        self.segments.clear();
        for (index, point) in points.iter().enumerate() {
            let next = points.get(index + 1);
            let start = point.time();
            let end = next.map_or(f64::INFINITY, Timed::time);

            let previous = self.segments.last();
            let start_value = match point {
                AutomationEvent::SetTarget { .. } => {
                    previous.map_or(self.initial, Segment::final_value)
                }
                other => other.value().unwrap_or(self.initial),
            };
            let area_at_start =
                previous.map_or(0.0, |segment| segment.area_at_start + segment.total_area());

            let curve = match next {
                Some(AutomationEvent::LinearRamp { value, .. }) => Curve::Linear {
                    from: start_value,
                    to: *value,
                },
                Some(AutomationEvent::ExponentialRamp { value, .. }) if start_value > 0.0 => {
                    Curve::Exponential {
                        from: start_value,
                        to: *value,
                    }
                }
                // An exponential ramp cannot leave zero: hold until it ends.
                Some(AutomationEvent::ExponentialRamp { .. }) => Curve::Constant { value: start_value },
                _ => match *point {
                    AutomationEvent::SetTarget {
                        value,
                        time_constant,
                        ..
                    } if time_constant > 0.0 => Curve::Target {
                        from: start_value,
                        target: value,
                        time_constant,
                    },
                    AutomationEvent::SetTarget { value, .. } => Curve::Constant { value },
                    _ => Curve::Constant { value: start_value },
                },
            };

            self.segments.push(Segment {
                start,
                end,
                curve,
                area_at_start,
            });
        }
    }
}

fn check_rate(what: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(EngineError::InvalidValue { what, value })
    }
}
