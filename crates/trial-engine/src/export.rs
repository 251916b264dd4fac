//! Telemetry export sinks.
//!
//! A sink receives the full telemetry log exactly once, when the trial ends
//! or is cancelled.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clothstim_common::error::{StimulusError, StimulusResult};

use crate::result::TrialResult;
use crate::telemetry::{TelemetryRecord, CSV_COLUMNS};

/// Destination for a finished trial's telemetry.
pub trait TelemetrySink: Send {
    /// Write every record, in order, plus the result summary.
    fn export(&mut self, records: &[TelemetryRecord], result: &TrialResult) -> StimulusResult<()>;

    /// Human-readable sink name for logs.
    fn name(&self) -> &str;
}

/// Writes telemetry as CSV, with an optional JSON summary alongside.
///
/// The file is created and the header written at construction, so an
/// unwritable path fails during setup rather than at the end of a trial.
pub struct CsvTelemetryWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    summary_path: Option<PathBuf>,
    rows_written: u64,
}

impl CsvTelemetryWriter {
    pub fn new(path: PathBuf) -> StimulusResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&path).map_err(|e| {
            StimulusError::export(format!("Failed to create {}: {e}", path.display()))
        })?;
        writer
            .write_record(CSV_COLUMNS)
            .map_err(|e| StimulusError::export(format!("Failed to write header: {e}")))?;

        Ok(Self {
            writer,
            path,
            summary_path: None,
            rows_written: 0,
        })
    }

    /// Also write the trial result as pretty JSON to `<stem>.summary.json`.
    pub fn with_summary(mut self) -> Self {
        self.summary_path = Some(summary_path_for(&self.path));
        self
    }

    pub fn flush(&mut self) -> StimulusResult<()> {
        self.writer
            .flush()
            .map_err(|e| StimulusError::export(format!("Failed to flush telemetry: {e}")))
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary_path(&self) -> Option<&Path> {
        self.summary_path.as_deref()
    }
}

impl TelemetrySink for CsvTelemetryWriter {
    fn export(&mut self, records: &[TelemetryRecord], result: &TrialResult) -> StimulusResult<()> {
        for record in records {
            self.writer
                .write_record(record.csv_fields())
                .map_err(|e| StimulusError::export(format!("Failed to write row: {e}")))?;
            self.rows_written += 1;
        }
        self.flush()?;

        if let Some(summary) = &self.summary_path {
            let json = serde_json::to_string_pretty(result)?;
            std::fs::write(summary, json).map_err(|e| {
                StimulusError::export(format!("Failed to write {}: {e}", summary.display()))
            })?;
        }

        tracing::info!(
            path = %self.path.display(),
            rows = self.rows_written,
            "Telemetry written"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "csv"
    }
}

impl Drop for CsvTelemetryWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// `trial.csv` -> `trial.summary.json`.
pub fn summary_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "telemetry".to_string());
    path.with_file_name(format!("{stem}.summary.json"))
}

/// One captured export.
#[derive(Debug, Clone)]
pub struct ExportedTrial {
    pub records: Vec<TelemetryRecord>,
    pub result: TrialResult,
}

/// In-memory sink. Clones share storage, so a handle can be kept after the
/// sink is handed to the engine.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    exports: Arc<Mutex<Vec<ExportedTrial>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every export received so far.
    pub fn exports(&self) -> Vec<ExportedTrial> {
        self.exports
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn export_count(&self) -> usize {
        self.exports.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl TelemetrySink for MemorySink {
    fn export(&mut self, records: &[TelemetryRecord], result: &TrialResult) -> StimulusResult<()> {
        let mut guard = self
            .exports
            .lock()
            .map_err(|_| StimulusError::export("memory sink lock poisoned"))?;
        guard.push(ExportedTrial {
            records: records.to_vec(),
            result: result.clone(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
