//! Application configuration
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! missing) file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    AUDIO_QUEUE_CAPACITY, CHART_BORDER_PX, HISTORY_SIZE, SCATTER_POINTS,
};
use crate::error::{Error, Result};
use crate::render::ScaleStrategy;
use crate::stats::FilterParams;

const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub relay: RelayConfig,
    pub charts: ChartConfig,
    pub scatter: ScatterConfig,
    pub audio: AudioConfig,
}

/// Decoder-to-consumer handoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Audio frames queued before the producer blocks
    pub audio_queue_capacity: usize,
    /// Longest gap between the end of one dispatch and the next drain
    /// before an underrun is reported.
    /// Derived from the device buffer size when unset.
    pub underrun_budget_ms: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            audio_queue_capacity: AUDIO_QUEUE_CAPACITY,
            underrun_budget_ms: None,
        }
    }
}

impl RelayConfig {
    pub fn underrun_budget(&self) -> Option<Duration> {
        self.underrun_budget_ms.map(Duration::from_millis)
    }
}

/// Rolling line charts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Points kept per chart
    pub history_size: usize,
    pub border_px: f32,
    /// Shade the area under each line
    pub fill_under: bool,
    /// Vertical distance between Y axis labels
    pub label_spacing_px: f32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            history_size: HISTORY_SIZE,
            border_px: CHART_BORDER_PX,
            fill_under: false,
            label_spacing_px: 80.0,
        }
    }
}

/// Symbol scatter plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterConfig {
    pub capacity: usize,
    pub point_radius: f32,
    pub scale: ScaleStrategy,
    pub filter: FilterParams,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            capacity: SCATTER_POINTS,
            point_radius: 2.0,
            scale: ScaleStrategy::default(),
            filter: FilterParams::default(),
        }
    }
}

/// Audio output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Device buffer override in milliseconds; the device minimum is used when unset
    pub device_buffer_ms: Option<u32>,
    /// Output device by host name; the default output when unset
    pub device_name: Option<String>,
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            tracing::info!("Loading configuration from {}", path.display());
            Self::load(path)
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Per-user configuration file location
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "freedv", "freedv-relay")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<()> {
        if self.relay.audio_queue_capacity == 0 {
            return Err(Error::Config("relay.audio_queue_capacity must be > 0".into()));
        }
        if self.charts.history_size == 0 {
            return Err(Error::Config("charts.history_size must be > 0".into()));
        }
        if self.scatter.capacity == 0 {
            return Err(Error::Config("scatter.capacity must be > 0".into()));
        }
        if !(self.charts.label_spacing_px > 0.0) {
            return Err(Error::Config("charts.label_spacing_px must be > 0".into()));
        }

        let filter = &self.scatter.filter;
        if !(0.0..1.0).contains(&filter.beta) {
            return Err(Error::Config(format!(
                "scatter.filter.beta must be in [0, 1), got {}",
                filter.beta
            )));
        }
        if !(filter.floor > 0.0) {
            return Err(Error::Config("scatter.filter.floor must be > 0".into()));
        }
        if !(filter.gain > 0.0) {
            return Err(Error::Config("scatter.filter.gain must be > 0".into()));
        }

        self.scatter.scale.validate().map_err(Error::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.charts.history_size, 60);
        assert_eq!(config.scatter.filter.beta, 0.95);
        assert_eq!(
            config.scatter.scale,
            ScaleStrategy::Adaptive {
                scale_constant: 10000.0
            }
        );
    }

    #[test]
    fn test_partial_document() {
        let config = AppConfig::from_toml(
            r#"
            [charts]
            history_size = 120

            [scatter.scale]
            mode = "fixed"
            pixels_per_unit = 0.01
            "#,
        )
        .unwrap();
        assert_eq!(config.charts.history_size, 120);
        assert_eq!(config.charts.border_px, 40.0);
        assert_eq!(
            config.scatter.scale,
            ScaleStrategy::Fixed {
                pixels_per_unit: 0.01
            }
        );
        assert_eq!(config.relay.audio_queue_capacity, 256);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "freedv-relay-config-{}.toml",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(
            &path,
            "[relay]\nunderrun_budget_ms = 250\n\n[audio]\ndevice_name = \"USB Audio\"\n",
        )
        .unwrap();
        let config = AppConfig::load_or_default(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            config.relay.underrun_budget(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.audio.device_name.as_deref(), Some("USB Audio"));
        assert_eq!(config.audio.device_buffer_ms, None);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(AppConfig::from_toml("[scatter.filter]\nbeta = 1.5").is_err());
        assert!(AppConfig::from_toml("[charts]\nhistory_size = 0").is_err());
        assert!(AppConfig::from_toml(
            "[scatter.scale]\nmode = \"adaptive\"\nscale_constant = 0.0"
        )
        .is_err());
        assert!(AppConfig::from_toml("not toml ===").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("freedv-relay-does-not-exist.toml");
        let config = AppConfig::load_or_default(&path).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
