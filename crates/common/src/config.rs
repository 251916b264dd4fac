//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where telemetry exports are written.
    pub output_dir: PathBuf,

    /// Default display settings.
    pub display: DisplayDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default display parameters for hosts that do not report their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayDefaults {
    /// Display refresh rate (Hz).
    pub refresh_hz: f64,

    /// Drawing surface width in pixels.
    pub width: f64,

    /// Drawing surface height in pixels.
    pub height: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clothstim=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            display: DisplayDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DisplayDefaults {
    fn default() -> Self {
        Self {
            refresh_hz: 60.0,
            width: 1024.0,
            height: 768.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load `$XDG_CONFIG_HOME/clothstim/config.json`.
    ///
    /// A missing file yields defaults silently; an unreadable or malformed
    /// one is logged and also yields defaults.
    pub fn load() -> Self {
        let path = config_file_path();
        if !path.exists() {
            return Self::default();
        }
        Self::read_from(&path).unwrap_or_else(|reason| {
            tracing::warn!(path = %path.display(), %reason, "Ignoring app config");
            Self::default()
        })
    }

    fn read_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path).map_err(|e| format!("read failed: {e}"))?;
        serde_json::from_str(&content).map_err(|e| format!("parse failed: {e}"))
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clothstim").join("config.json")
}

/// Default telemetry output directory.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("clothstim").join("telemetry")
}
