use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

/// Meter used to turn ticks into bars and beats. The beat is the note value
/// named by the denominator, so 6/8 has six eighth-note beats per bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl TimeSignature {
    pub fn new(numerator: u32, denominator: u32) -> Result<Self> {
        if numerator == 0 || !matches!(denominator, 1 | 2 | 4 | 8 | 16) {
            return Err(EngineError::msg(format!(
                "unsupported time signature {numerator}/{denominator}"
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn ticks_per_beat(&self, ppq: u32) -> f64 {
        f64::from(ppq) * 4.0 / f64::from(self.denominator)
    }

    pub fn ticks_per_bar(&self, ppq: u32) -> f64 {
        self.ticks_per_beat(ppq) * f64::from(self.numerator)
    }

    fn sixteenths_per_beat(&self) -> f64 {
        16.0 / f64::from(self.denominator)
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Musical position, displayed as `bars:beats:sixteenths` with zero-based
/// bars and beats.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub bars: u64,
    pub beats: u32,
    pub sixteenths: f64,
}

impl Position {
    pub fn from_ticks(ticks: f64, ppq: u32, signature: TimeSignature) -> Self {
        let beats = ticks.max(0.0) / signature.ticks_per_beat(ppq);
        let numerator = f64::from(signature.numerator);
        Self {
            bars: (beats / numerator).floor() as u64,
            beats: (beats.floor() % numerator) as u32,
            sixteenths: beats.fract() * signature.sixteenths_per_beat(),
        }
    }

    pub fn to_ticks(&self, ppq: u32, signature: TimeSignature) -> f64 {
        let beats = self.bars as f64 * f64::from(signature.numerator)
            + f64::from(self.beats)
            + self.sixteenths / signature.sixteenths_per_beat();
        beats * signature.ticks_per_beat(ppq)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sixteenths = (self.sixteenths * 1000.0).round() / 1000.0;
        write!(f, "{}:{}:{}", self.bars, self.beats, sixteenths)
    }
}

impl FromStr for Position {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || EngineError::msg(format!("invalid position '{s}', expected bars:beats:sixteenths"));
        let mut parts = s.trim().split(':');
        let bars = parts.next().ok_or_else(invalid)?.parse::<u64>().map_err(|_| invalid())?;
        let beats = match parts.next() {
            Some(part) => part.parse::<u32>().map_err(|_| invalid())?,
            None => 0,
        };
        let sixteenths = match parts.next() {
            Some(part) => part.parse::<f64>().map_err(|_| invalid())?,
            None => 0.0,
        };
        if parts.next().is_some() || !(sixteenths.is_finite() && sixteenths >= 0.0) {
            return Err(invalid());
        }
        Ok(Self {
            bars,
            beats,
            sixteenths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_ticks_as_bars_beats_sixteenths() {
        let common = TimeSignature::default();
        assert_eq!(Position::from_ticks(0.0, 192, common).to_string(), "0:0:0");
        assert_eq!(Position::from_ticks(192.0 * 5.0 + 96.0, 192, common).to_string(), "1:1:2");

        let compound = TimeSignature::new(6, 8).unwrap();
        assert_eq!(compound.ticks_per_bar(192), 576.0);
        assert_eq!(Position::from_ticks(576.0 + 144.0, 192, compound).to_string(), "1:1:1");
    }

    #[test]
    fn parses_positions_back_into_ticks() {
        let common = TimeSignature::default();
        let position: Position = "2:3:1.5".parse().unwrap();
        assert_eq!(position.to_ticks(192, common), 192.0 * 11.0 + 72.0);

        let bar: Position = "3".parse().unwrap();
        assert_eq!(bar.to_ticks(4, common), 48.0);

        assert!("1:x".parse::<Position>().is_err());
        assert!("1:2:3:4".parse::<Position>().is_err());
        assert!(TimeSignature::new(3, 5).is_err());
    }
}
