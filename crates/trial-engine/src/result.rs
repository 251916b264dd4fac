//! Trial outcome summary.

use serde::{Deserialize, Serialize};

use clothstim_core::Degeneracy;

/// Why the trial stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The scheduler reached the end of the planned duration.
    Completed,
    /// The host cancelled or the engine was dropped early.
    Cancelled,
}

/// Summary returned when a trial ends and written next to the telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub reason: EndReason,
    /// Ticks that produced a telemetry row.
    pub ticks: u64,
    pub visible_ticks: u64,
    pub blank_ticks: u64,
    /// Ticks on which the displayed frame changed.
    pub frame_changes: u64,
    /// Steps taken by the size controller.
    pub size_steps: u64,
    pub selected_dots: usize,
    pub planned_duration_secs: f64,
    /// Elapsed time at the last tick.
    pub measured_duration_secs: f64,
    pub scale_min: Option<f64>,
    pub scale_max: Option<f64>,
    pub scale_mean: Option<f64>,
    /// Wall-clock time of the first tick (RFC 3339), if the trial ever ticked.
    pub started_at: Option<String>,
    pub degeneracies: Vec<Degeneracy>,
    /// Set when the telemetry sink failed; the trial itself still ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_error: Option<String>,
}

impl TrialResult {
    pub fn completed(&self) -> bool {
        self.reason == EndReason::Completed
    }
}
