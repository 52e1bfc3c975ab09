use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::signal::AutomationEvent;
use crate::transport::TimeSignature;
use crate::{EngineError, Result, Ticks};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: HostConfig,
    pub transport: TransportConfig,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.host.validate()?;
        self.transport.validate()
    }
}

/// Settings of the offline renderer that drives the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub sample_rate: u32,
    pub block_size: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 512,
        }
    }
}

impl HostConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidConfig("sample_rate must be positive".into()));
        }
        if self.block_size == 0 {
            return Err(EngineError::InvalidConfig("block_size must be positive".into()));
        }
        Ok(())
    }
}

/// Musical settings of a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub ppq: u32,
    pub bpm: f64,
    pub time_signature: TimeSignature,
    pub looping: bool,
    pub loop_start: Ticks,
    pub loop_end: Ticks,
    /// Applied in order to the BPM signal; times are in seconds.
    pub tempo_automation: Vec<AutomationEvent>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let ppq = 192;
        let time_signature = TimeSignature::default();
        Self {
            ppq,
            bpm: 120.0,
            time_signature,
            looping: false,
            loop_start: 0,
            loop_end: 4 * time_signature.ticks_per_bar(ppq) as Ticks,
            tempo_automation: Vec::new(),
        }
    }
}

impl TransportConfig {
    fn validate(&self) -> Result<()> {
        if self.ppq == 0 {
            return Err(EngineError::InvalidConfig("ppq must be positive".into()));
        }
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "bpm must be finite and positive, got {}",
                self.bpm
            )));
        }
        TimeSignature::new(self.time_signature.numerator, self.time_signature.denominator)
            .map_err(|err| EngineError::InvalidConfig(err.to_string()))?;
        if self.loop_end <= self.loop_start {
            return Err(EngineError::InvalidConfig(format!(
                "loop_end ({}) must be greater than loop_start ({})",
                self.loop_end, self.loop_start
            )));
        }
        Ok(())
    }
}
