//! Per-tick telemetry.
//!
//! One record is appended for every tick that does not end the trial. The
//! log is append-only and is handed to the export sink once, in tick order.

use serde::{Deserialize, Serialize};

use clothstim_model::geometry::BoundingBox;
use clothstim_model::trial::{IsiMode, TrialConfig};

/// Column order of the tabular export.
pub const CSV_COLUMNS: [&str; 9] = [
    "cloth_width",
    "cloth_height",
    "scaling_factor",
    "isi",
    "isi_extends_duration",
    "frame",
    "time_elapsed",
    "phase_duration",
    "isi_mode",
];

/// Frame column: a data frame number or the blank sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameLabel {
    Frame(u32),
    Blank,
}

impl std::fmt::Display for FrameLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameLabel::Frame(n) => write!(f, "{n}"),
            FrameLabel::Blank => f.write_str("blank"),
        }
    }
}

/// ISI settings echoed into every row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsiSettings {
    pub isi_ms: u32,
    pub extends_duration: bool,
    pub mode: IsiMode,
}

impl IsiSettings {
    pub fn from_config(config: &TrialConfig) -> Self {
        Self {
            isi_ms: config.isi_ms,
            extends_duration: config.isi_extends_duration,
            mode: config.isi_mode,
        }
    }
}

/// One telemetry row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Width of the drawn cloth in pixels. `None` on blank rows.
    pub cloth_width: Option<f64>,
    /// Height of the drawn cloth in pixels. `None` on blank rows.
    pub cloth_height: Option<f64>,
    /// Scale applied this tick. `None` on blank rows.
    pub scale: Option<f64>,
    pub isi: IsiSettings,
    pub frame: FrameLabel,
    /// Seconds since the first tick.
    pub elapsed_secs: f64,
    /// Seconds spent in the current phase.
    pub phase_secs: f64,
}

impl TelemetryRecord {
    /// Row for a tick that drew a frame. An empty cloth reports zero extent.
    pub fn shown(
        bounds: Option<BoundingBox>,
        scale: f64,
        isi: IsiSettings,
        frame_number: u32,
        elapsed_secs: f64,
        phase_secs: f64,
    ) -> Self {
        let (w, h) = bounds.map(|b| (b.width(), b.height())).unwrap_or((0.0, 0.0));
        Self {
            cloth_width: Some(w),
            cloth_height: Some(h),
            scale: Some(scale),
            isi,
            frame: FrameLabel::Frame(frame_number),
            elapsed_secs,
            phase_secs,
        }
    }

    /// Row for a blank tick.
    pub fn blank(isi: IsiSettings, elapsed_secs: f64, phase_secs: f64) -> Self {
        Self {
            cloth_width: None,
            cloth_height: None,
            scale: None,
            isi,
            frame: FrameLabel::Blank,
            elapsed_secs,
            phase_secs,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.frame == FrameLabel::Blank
    }

    /// Field values in [`CSV_COLUMNS`] order. Numeric fields are empty on blank rows.
    pub fn csv_fields(&self) -> [String; 9] {
        fn opt(v: Option<f64>) -> String {
            v.map(|v| format!("{v:.4}")).unwrap_or_default()
        }
        [
            opt(self.cloth_width),
            opt(self.cloth_height),
            opt(self.scale),
            self.isi.isi_ms.to_string(),
            self.isi.extends_duration.to_string(),
            self.frame.to_string(),
            format!("{:.6}", self.elapsed_secs),
            format!("{:.6}", self.phase_secs),
            self.isi.mode.as_str().to_string(),
        ]
    }
}

/// Summary of the scale column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Append-only telemetry buffer.
#[derive(Debug, Default)]
pub struct TelemetryRecorder {
    records: Vec<TelemetryRecord>,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: TelemetryRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn blank_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_blank()).count()
    }

    pub fn visible_count(&self) -> usize {
        self.records.len() - self.blank_count()
    }

    pub fn scale_stats(&self) -> Option<ScaleStats> {
        let scales: Vec<f64> = self.records.iter().filter_map(|r| r.scale).collect();
        if scales.is_empty() {
            return None;
        }
        let min = scales.iter().copied().fold(f64::INFINITY, f64::min);
        let max = scales.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = scales.iter().sum::<f64>() / scales.len() as f64;
        Some(ScaleStats { min, max, mean })
    }
}
