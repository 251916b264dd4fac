//! Trial presentation parameters.
//!
//! A trial file is a JSON object; every field is optional and falls back to
//! the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use clothstim_common::error::{StimulusError, StimulusResult};

/// Default pixels-per-degree for a typical lab display at ~57 cm.
pub const DEFAULT_PIXELS_PER_DEGREE: f64 = 35.0;

/// What is shown during the inter-stimulus interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsiMode {
    /// Show each frame for one refresh, then an empty screen for the gap.
    #[default]
    Blank,
    /// Keep the current frame on screen for the hold duration.
    Hold,
}

impl IsiMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsiMode::Blank => "blank",
            IsiMode::Hold => "hold",
        }
    }
}

/// How the cloth size varies over the trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeVariationMode {
    /// Constant scale of 1.0.
    Disabled,
    /// Bounded log-scale random walk with reflection.
    #[default]
    RandomWalk,
    /// Linear log-space glide toward random waypoints, `steps` frame changes each.
    Interpolated { steps: u32 },
}

impl SizeVariationMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SizeVariationMode::Disabled)
    }
}

/// Trial configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    /// Sampling grid columns.
    pub grid_x: u32,
    /// Sampling grid rows.
    pub grid_y: u32,
    /// Anchor jitter as a fraction of the cell size.
    pub grid_jitter: f64,

    pub size_variation: SizeVariationMode,
    /// Multiplicative size step (> 1).
    pub scaling_ratio: f64,
    /// Smallest allowed cloth diagonal, in degrees of visual angle.
    pub min_size_deg: f64,
    /// Largest allowed cloth diagonal, in degrees of visual angle.
    pub max_size_deg: f64,
    pub pixels_per_degree: f64,
    /// Keep the scaling direction for this many steps. 0 or 1 redraws every step.
    pub direction_persistence: u32,

    /// Inter-stimulus gap in milliseconds.
    pub isi_ms: u32,
    /// Whether the gap lengthens the trial (true) or drops frames (false).
    pub isi_extends_duration: bool,
    pub isi_mode: IsiMode,
    /// Hold-mode frame duration. Falls back to `isi_ms`.
    pub frame_hold_ms: Option<u32>,

    pub reverse: bool,
    /// Explicit trial duration. Derived from `fps` and `cycles` when absent.
    pub duration_secs: Option<f64>,
    /// Source frame rate.
    pub fps: f64,
    /// Number of times the frame sequence is played.
    pub cycles: u32,

    /// Move the cloth center onto the surface center at setup.
    pub center_cloth: bool,
    /// Show a single frame for the whole trial.
    pub static_display: bool,
    /// Frame offset shown in static mode. Defaults to the first frame.
    pub static_frame: Option<u32>,

    /// Scrambled distractor dots drawn with the cloth.
    pub noise_dots: u32,
    /// Margin around the cloth bounds where distractors may start.
    pub noise_buffer_px: f64,

    pub dot_radius_px: f64,
    pub dot_color: String,

    /// Seed for reproducible sampling and size variation.
    pub seed: Option<u64>,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            grid_x: 10,
            grid_y: 10,
            grid_jitter: 0.0,
            size_variation: SizeVariationMode::RandomWalk,
            scaling_ratio: 1.05,
            min_size_deg: 4.0,
            max_size_deg: 8.0,
            pixels_per_degree: DEFAULT_PIXELS_PER_DEGREE,
            direction_persistence: 0,
            isi_ms: 0,
            isi_extends_duration: true,
            isi_mode: IsiMode::Blank,
            frame_hold_ms: None,
            reverse: false,
            duration_secs: None,
            fps: 30.0,
            cycles: 1,
            center_cloth: true,
            static_display: false,
            static_frame: None,
            noise_dots: 0,
            noise_buffer_px: 0.0,
            dot_radius_px: 3.0,
            dot_color: "white".to_string(),
            seed: None,
        }
    }
}

impl TrialConfig {
    /// Parse a trial config from JSON.
    pub fn from_json(content: &str) -> StimulusResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| StimulusError::configuration(format!("invalid trial config: {e}")))
    }

    /// Load a trial config file.
    pub fn load(path: &Path) -> StimulusResult<Self> {
        if !path.exists() {
            return Err(StimulusError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save as pretty JSON.
    pub fn save(&self, path: &Path) -> StimulusResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Hold-mode frame duration in milliseconds.
    pub fn hold_ms(&self) -> u32 {
        self.frame_hold_ms.unwrap_or(self.isi_ms)
    }

    /// Trial duration before any ISI inflation.
    pub fn base_duration_secs(&self, frame_count: usize) -> f64 {
        match self.duration_secs {
            Some(secs) => secs,
            None => (frame_count as f64 * self.cycles as f64) / self.fps,
        }
    }

    /// Check every parameter that must be valid before a trial can start.
    pub fn validate(&self) -> StimulusResult<()> {
        if self.grid_x == 0 || self.grid_y == 0 {
            return Err(StimulusError::configuration(format!(
                "grid must be at least 1x1, got {}x{}",
                self.grid_x, self.grid_y
            )));
        }
        if !self.grid_jitter.is_finite() || self.grid_jitter < 0.0 {
            return Err(StimulusError::configuration(
                "grid_jitter must be a non-negative number",
            ));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(StimulusError::configuration("fps must be positive"));
        }
        if self.cycles == 0 {
            return Err(StimulusError::configuration("cycles must be at least 1"));
        }
        if let Some(secs) = self.duration_secs {
            if !secs.is_finite() {
                return Err(StimulusError::configuration(
                    "duration_secs must be a finite number",
                ));
            }
        }
        if !self.dot_radius_px.is_finite() || self.dot_radius_px <= 0.0 {
            return Err(StimulusError::configuration("dot_radius_px must be positive"));
        }
        if !self.noise_buffer_px.is_finite() || self.noise_buffer_px < 0.0 {
            return Err(StimulusError::configuration(
                "noise_buffer_px must be non-negative",
            ));
        }

        if self.size_variation.is_enabled() {
            self.validate_size_bounds()?;
        }

        Ok(())
    }

    fn validate_size_bounds(&self) -> StimulusResult<()> {
        if !self.scaling_ratio.is_finite() || self.scaling_ratio <= 1.0 {
            return Err(StimulusError::configuration(format!(
                "scaling_ratio must be greater than 1, got {}",
                self.scaling_ratio
            )));
        }
        if !self.pixels_per_degree.is_finite() || self.pixels_per_degree <= 0.0 {
            return Err(StimulusError::configuration(
                "pixels_per_degree must be positive",
            ));
        }
        if !(self.min_size_deg > 0.0 && self.min_size_deg.is_finite()) {
            return Err(StimulusError::configuration("min_size_deg must be positive"));
        }
        if !self.max_size_deg.is_finite() || self.max_size_deg < self.min_size_deg {
            return Err(StimulusError::configuration(format!(
                "max_size_deg ({}) must not be below min_size_deg ({})",
                self.max_size_deg, self.min_size_deg
            )));
        }
        if let SizeVariationMode::Interpolated { steps: 0 } = self.size_variation {
            return Err(StimulusError::configuration(
                "interpolated size variation needs at least one step",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        TrialConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TrialConfig::from_json(r#"{"grid_x": 4, "isi_mode": "hold"}"#).unwrap();
        assert_eq!(config.grid_x, 4);
        assert_eq!(config.grid_y, 10);
        assert_eq!(config.isi_mode, IsiMode::Hold);
        assert_eq!(config.pixels_per_degree, DEFAULT_PIXELS_PER_DEGREE);
    }

    #[test]
    fn test_size_variation_json_forms() {
        let config = TrialConfig::from_json(r#"{"size_variation": "disabled"}"#).unwrap();
        assert_eq!(config.size_variation, SizeVariationMode::Disabled);

        let config =
            TrialConfig::from_json(r#"{"size_variation": {"interpolated": {"steps": 6}}}"#)
                .unwrap();
        assert_eq!(
            config.size_variation,
            SizeVariationMode::Interpolated { steps: 6 }
        );
    }

    #[test]
    fn test_zero_grid_is_configuration_error() {
        let config = TrialConfig {
            grid_y: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, StimulusError::Configuration { .. }));
    }

    #[test]
    fn test_inverted_size_bounds_rejected() {
        let config = TrialConfig {
            min_size_deg: 9.0,
            max_size_deg: 3.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_size_bounds_ignored_when_disabled() {
        let config = TrialConfig {
            size_variation: SizeVariationMode::Disabled,
            scaling_ratio: 0.5,
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_non_positive_duration_is_allowed() {
        let config = TrialConfig {
            duration_secs: Some(0.0),
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.base_duration_secs(100), 0.0);
    }

    #[test]
    fn test_derived_duration_and_hold() {
        let config = TrialConfig {
            fps: 25.0,
            cycles: 2,
            isi_ms: 40,
            ..Default::default()
        };
        assert!((config.base_duration_secs(50) - 4.0).abs() < 1e-12);
        assert_eq!(config.hold_ms(), 40);

        let config = TrialConfig {
            frame_hold_ms: Some(100),
            ..config
        };
        assert_eq!(config.hold_ms(), 100);
    }
}
