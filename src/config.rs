//! Application configuration
//!
//! Loaded from `config.toml` in the platform config directory; every field has
//! a default so a missing file or a partial file is fine.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub timing: TimingConfig,
    pub touch: TouchConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

/// Dispatch loop and retry timing, all in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_interval_ms: u64,
    pub debounce_ms: u64,
    pub enumeration_retry_ms: u64,
    pub icon_retry_ms: u64,
    /// Unanswered icon requests are dropped after this many sends
    pub icon_attempts: u32,
    pub max_frames_out_per_tick: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            enumeration_retry_ms: DEFAULT_ENUMERATION_RETRY_MS,
            icon_retry_ms: DEFAULT_ICON_RETRY_MS,
            icon_attempts: DEFAULT_ICON_ATTEMPTS,
            max_frames_out_per_tick: DEFAULT_FRAMES_OUT_PER_TICK,
        }
    }
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn enumeration_retry(&self) -> Duration {
        Duration::from_millis(self.enumeration_retry_ms)
    }

    pub fn icon_retry(&self) -> Duration {
        Duration::from_millis(self.icon_retry_ms)
    }
}

/// Touch detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    /// Reading must exceed `baseline * sensitivity` to count as a touch
    pub sensitivity: f32,
    /// Positions at or below this are treated as noise
    pub position_deadband: u8,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_TOUCH_SENSITIVITY,
            position_deadband: DEFAULT_POSITION_DEADBAND,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// `host:port` the host peer listens on
    pub address: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Default location: `<config dir>/fader-link/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "fader-link").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.timing;
        let timings = [
            ("tick_interval_ms", t.tick_interval_ms),
            ("debounce_ms", t.debounce_ms),
            ("enumeration_retry_ms", t.enumeration_retry_ms),
            ("icon_retry_ms", t.icon_retry_ms),
        ];
        for (name, value) in timings {
            if value == 0 {
                return Err(Error::Config(format!("timing.{name} must be non-zero")));
            }
        }
        if t.max_frames_out_per_tick == 0 {
            return Err(Error::Config(
                "timing.max_frames_out_per_tick must be non-zero".to_string(),
            ));
        }
        if t.icon_attempts == 0 {
            return Err(Error::Config("timing.icon_attempts must be non-zero".to_string()));
        }
        if !(self.touch.sensitivity > 1.0) {
            return Err(Error::Config(format!(
                "touch.sensitivity must be greater than 1.0, got {}",
                self.touch.sensitivity
            )));
        }
        Ok(())
    }
}
