//! Trial orchestration.
//!
//! [`TrialEngine::setup`] does all fallible work up front: config
//! validation, grid sampling, re-centering, size bounds, and scheduling.
//! After that, [`TrialEngine::tick`] never fails. Runtime degeneracies are
//! collected into the [`TrialResult`] instead of being raised.
//!
//! The telemetry log is handed to the sink exactly once, when the trial
//! completes, is cancelled, or the engine is dropped.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use clothstim_common::clock::wall_clock_now;
use clothstim_common::error::StimulusResult;
use clothstim_core::scheduler::{FrameScheduler, ScheduleConfig, TickAction};
use clothstim_core::{Degeneracy, GridSampler, SizeController};
use clothstim_model::geometry::{recenter, Point2D};
use clothstim_model::trajectory::Cloth;
use clothstim_model::trial::TrialConfig;

use crate::export::TelemetrySink;
use crate::renderer::Renderer;
use crate::result::{EndReason, TrialResult};
use crate::surface::{DotStyle, DrawSurface};
use crate::telemetry::{IsiSettings, TelemetryRecord, TelemetryRecorder};

/// Frame offset used for sampling, centering, and size bounds.
pub const REFERENCE_FRAME: usize = 0;

/// Engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Set up, waiting for the first tick.
    Ready,
    /// At least one tick has run.
    Running,
    /// Completed or cancelled. Terminal.
    Ended,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Continue,
    Ended(TrialResult),
}

/// A single point-light cloth trial.
pub struct TrialEngine {
    config: TrialConfig,
    state: EngineState,
    renderer: Renderer,
    size: SizeController,
    scheduler: FrameScheduler,
    telemetry: TelemetryRecorder,
    isi: IsiSettings,
    rng: SmallRng,
    sink: Option<Box<dyn TelemetrySink>>,
    frame_count: usize,
    first_frame: u32,
    selected_dots: usize,
    degeneracies: Vec<Degeneracy>,
    frame_changes: u64,
    last_elapsed: f64,
    started_at: Option<String>,
    result: Option<TrialResult>,
}

impl TrialEngine {
    /// Prepare a trial, seeding randomness from `config.seed` when set.
    pub fn setup(
        config: TrialConfig,
        cloth: &Cloth,
        surface: &dyn DrawSurface,
        sink: Box<dyn TelemetrySink>,
    ) -> StimulusResult<Self> {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self::setup_with_rng(config, cloth, surface, sink, rng)
    }

    /// Prepare a trial with an explicit random source.
    pub fn setup_with_rng(
        config: TrialConfig,
        cloth: &Cloth,
        surface: &dyn DrawSurface,
        sink: Box<dyn TelemetrySink>,
        mut rng: SmallRng,
    ) -> StimulusResult<Self> {
        config.validate()?;

        let frame_count = cloth.frame_count();
        let mut degeneracies = Vec::new();
        if frame_count == 0 {
            tracing::warn!("Trajectory data has no frames");
            degeneracies.push(Degeneracy::ZeroFrames);
        }

        let selection = GridSampler::from_config(&config).sample(cloth, REFERENCE_FRAME, &mut rng);
        if selection.is_empty() {
            tracing::warn!(dots = cloth.len(), "Grid sampling selected no dots");
            degeneracies.push(Degeneracy::EmptySelection);
        } else if selection.is_exhausted() {
            tracing::warn!(
                selected = selection.len(),
                cells = selection.cell_count(),
                "Dot pool exhausted before every grid cell was filled"
            );
            degeneracies.push(Degeneracy::PoolExhausted);
        }

        let mut sampled = selection.apply(cloth);
        if config.center_cloth {
            let (width, height) = surface.size();
            recenter(
                &mut sampled,
                Point2D::new(width / 2.0, height / 2.0),
                REFERENCE_FRAME,
            );
        }

        let extent = sampled
            .bounds_at(REFERENCE_FRAME)
            .map(|b| b.diagonal())
            .unwrap_or(0.0);
        let size = SizeController::from_config(&config, extent, &mut rng)?;
        if let Some(degeneracy) = size.degeneracy() {
            degeneracies.push(degeneracy);
        }

        let mut renderer = Renderer::new(sampled, REFERENCE_FRAME, DotStyle::from_config(&config));
        renderer.add_distractors(config.noise_dots, config.noise_buffer_px, &mut rng);

        let mut schedule = ScheduleConfig::derive(&config, frame_count);
        if let Some(index) = schedule.static_index {
            if frame_count > 0 && index >= frame_count {
                tracing::warn!(index, frame_count, "Static frame out of range; clamped");
                schedule.static_index = Some(frame_count - 1);
            }
        }
        if schedule.duration_secs <= 0.0 {
            tracing::warn!(
                duration_secs = schedule.duration_secs,
                "Trial duration is not positive"
            );
            degeneracies.push(Degeneracy::NonPositiveDuration);
        }

        tracing::info!(
            dots = cloth.len(),
            selected = selection.len(),
            frames = frame_count,
            duration_secs = schedule.duration_secs,
            isi_ms = config.isi_ms,
            isi_mode = config.isi_mode.as_str(),
            sink = sink.name(),
            "Trial ready"
        );

        Ok(Self {
            isi: IsiSettings::from_config(&config),
            config,
            state: EngineState::Ready,
            renderer,
            size,
            scheduler: FrameScheduler::new(schedule),
            telemetry: TelemetryRecorder::new(),
            rng,
            sink: Some(sink),
            frame_count,
            first_frame: cloth.first_frame(),
            selected_dots: selection.len(),
            degeneracies,
            frame_changes: 0,
            last_elapsed: 0.0,
            started_at: None,
            result: None,
        })
    }

    /// Advance the trial to host time `now` (seconds) and draw.
    ///
    /// The tick that ends the trial draws nothing and records no row. Ticks
    /// after the end return the stored result again.
    pub fn tick(&mut self, now: f64, surface: &mut dyn DrawSurface) -> TickOutcome {
        if let Some(result) = &self.result {
            return TickOutcome::Ended(result.clone());
        }

        let plan = self.scheduler.plan(now);
        self.scheduler.commit(&plan);
        if self.state == EngineState::Ready {
            self.state = EngineState::Running;
            self.started_at = Some(wall_clock_now());
        }
        self.last_elapsed = plan.elapsed;

        let record = match plan.action {
            TickAction::End => return TickOutcome::Ended(self.finish(EndReason::Completed)),
            TickAction::Draw { index } => {
                if plan.size_step {
                    self.size.step(&mut self.rng);
                    self.frame_changes += 1;
                }
                let scale = self.size.scale();
                let frame = self.source_frame(index);
                let bounds = self.renderer.render(surface, frame, scale);
                TelemetryRecord::shown(
                    bounds,
                    scale,
                    self.isi,
                    self.first_frame + frame as u32,
                    plan.elapsed,
                    plan.phase_secs,
                )
            }
            TickAction::Blank => {
                self.renderer.render_blank(surface);
                TelemetryRecord::blank(self.isi, plan.elapsed, plan.phase_secs)
            }
        };

        self.telemetry.append(record);
        TickOutcome::Continue
    }

    /// Stop early and flush telemetry.
    ///
    /// Idempotent: once ended, returns the stored result and exports nothing.
    pub fn cancel(&mut self) -> TrialResult {
        match &self.result {
            Some(result) => result.clone(),
            None => {
                tracing::info!(elapsed = self.last_elapsed, "Trial cancelled");
                self.finish(EndReason::Cancelled)
            }
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<&TrialResult> {
        self.result.as_ref()
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn size_controller(&self) -> &SizeController {
        &self.size
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn selected_dots(&self) -> usize {
        self.selected_dots
    }

    pub fn degeneracies(&self) -> &[Degeneracy] {
        &self.degeneracies
    }

    /// Planned duration in seconds, after ISI inflation.
    pub fn planned_duration_secs(&self) -> f64 {
        self.scheduler.config().duration_secs
    }

    fn source_frame(&self, index: usize) -> usize {
        match self.frame_count {
            0 => 0,
            n => index % n,
        }
    }

    fn finish(&mut self, reason: EndReason) -> TrialResult {
        self.state = EngineState::Ended;
        let stats = self.telemetry.scale_stats();
        let mut result = TrialResult {
            reason,
            ticks: self.telemetry.len() as u64,
            visible_ticks: self.telemetry.visible_count() as u64,
            blank_ticks: self.telemetry.blank_count() as u64,
            frame_changes: self.frame_changes,
            size_steps: self.size.steps_taken(),
            selected_dots: self.selected_dots,
            planned_duration_secs: self.planned_duration_secs(),
            measured_duration_secs: self.last_elapsed,
            scale_min: stats.map(|s| s.min),
            scale_max: stats.map(|s| s.max),
            scale_mean: stats.map(|s| s.mean),
            started_at: self.started_at.clone(),
            degeneracies: self.degeneracies.clone(),
            export_error: None,
        };

        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.export(self.telemetry.records(), &result) {
                tracing::error!(error = %e, sink = sink.name(), "Telemetry export failed");
                result.export_error = Some(e.to_string());
            }
        }

        tracing::info!(
            reason = ?result.reason,
            ticks = result.ticks,
            blank_ticks = result.blank_ticks,
            frame_changes = result.frame_changes,
            measured_secs = result.measured_duration_secs,
            "Trial ended"
        );
        self.result = Some(result.clone());
        result
    }
}

impl Drop for TrialEngine {
    fn drop(&mut self) {
        if self.result.is_none() {
            self.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::MemorySink;
    use crate::surface::RecordingSurface;
    use clothstim_model::trajectory::DotSample;
    use clothstim_model::trial::{IsiMode, SizeVariationMode};

    /// A 4x4 lattice of dots drifting right, `frames` frames long.
    fn lattice(frames: u32) -> Cloth {
        let mut samples = Vec::new();
        for f in 0..frames {
            for i in 0..16u32 {
                let x = (i % 4) as f64 * 20.0 + f as f64;
                let y = (i / 4) as f64 * 20.0;
                samples.push(DotSample::new(i + 1, f, x, y));
            }
        }
        Cloth::from_samples(&samples).unwrap()
    }

    fn config() -> TrialConfig {
        TrialConfig {
            grid_x: 2,
            grid_y: 2,
            fps: 10.0,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn screen() -> RecordingSurface {
        RecordingSurface::counting(800.0, 600.0)
    }

    fn run(engine: &mut TrialEngine, hz: f64) -> TrialResult {
        let mut surface = screen();
        for i in 0..100_000u64 {
            if let TickOutcome::Ended(result) = engine.tick(i as f64 / hz, &mut surface) {
                return result;
            }
        }
        panic!("trial never ended");
    }

    #[test]
    fn test_setup_rejects_invalid_config() {
        let bad = TrialConfig {
            grid_x: 0,
            ..config()
        };
        let err = TrialEngine::setup(bad, &lattice(5), &screen(), Box::new(MemorySink::new()))
            .err()
            .unwrap();
        assert!(err.is_setup_error());
    }

    #[test]
    fn test_completed_trial_exports_once_in_order() {
        let sink = MemorySink::new();
        let mut engine =
            TrialEngine::setup(config(), &lattice(5), &screen(), Box::new(sink.clone()))
                .unwrap();
        let result = run(&mut engine, 60.0);
        drop(engine);

        assert_eq!(result.reason, EndReason::Completed);
        assert_eq!(result.selected_dots, 4);
        assert_eq!(sink.export_count(), 1);

        let exported = &sink.exports()[0];
        assert_eq!(exported.records.len() as u64, result.ticks);
        for pair in exported.records.windows(2) {
            assert!(pair[1].elapsed_secs >= pair[0].elapsed_secs);
        }
        assert!((result.planned_duration_secs - 0.5).abs() < 1e-9);
        assert!(result.measured_duration_secs >= 0.5);
    }

    #[test]
    fn test_size_disabled_keeps_scale_one() {
        let cfg = TrialConfig {
            size_variation: SizeVariationMode::Disabled,
            ..config()
        };
        let mut engine =
            TrialEngine::setup(cfg, &lattice(8), &screen(), Box::new(MemorySink::new()))
                .unwrap();
        let result = run(&mut engine, 60.0);
        assert!(engine
            .telemetry()
            .records()
            .iter()
            .all(|r| r.scale == Some(1.0)));
        assert_eq!(result.scale_min, Some(1.0));
        assert_eq!(result.scale_max, Some(1.0));
    }

    #[test]
    fn test_blank_rows_have_no_geometry() {
        let cfg = TrialConfig {
            isi_ms: 50,
            ..config()
        };
        let mut engine =
            TrialEngine::setup(cfg, &lattice(5), &screen(), Box::new(MemorySink::new()))
                .unwrap();
        let result = run(&mut engine, 120.0);
        assert!(result.blank_ticks > 0);

        for record in engine.telemetry().records() {
            if record.is_blank() {
                assert!(record.cloth_width.is_none() && record.scale.is_none());
            } else {
                assert!(record.cloth_width.is_some() && record.scale.is_some());
            }
        }
    }

    #[test]
    fn test_zero_gap_never_blanks() {
        let mut engine =
            TrialEngine::setup(config(), &lattice(6), &screen(), Box::new(MemorySink::new()))
                .unwrap();
        let result = run(&mut engine, 60.0);
        assert_eq!(result.blank_ticks, 0);
        assert_eq!(result.visible_ticks, result.ticks);
    }

    #[test]
    fn test_size_steps_only_on_frame_changes() {
        let cfg = TrialConfig {
            isi_mode: IsiMode::Hold,
            frame_hold_ms: Some(100),
            ..config()
        };
        let mut engine =
            TrialEngine::setup(cfg, &lattice(5), &screen(), Box::new(MemorySink::new()))
                .unwrap();
        let result = run(&mut engine, 60.0);
        assert_eq!(result.size_steps, result.frame_changes);
        assert!(result.frame_changes > 0);
        assert!(result.frame_changes < result.ticks);
    }

    #[test]
    fn test_cancel_flushes_exactly_once() {
        let sink = MemorySink::new();
        let mut engine =
            TrialEngine::setup(config(), &lattice(30), &screen(), Box::new(sink.clone()))
                .unwrap();
        let mut surface = RecordingSurface::new(800.0, 600.0);
        for i in 0..5 {
            assert_eq!(
                engine.tick(i as f64 / 60.0, &mut surface),
                TickOutcome::Continue
            );
        }

        let result = engine.cancel();
        assert_eq!(result.reason, EndReason::Cancelled);
        assert_eq!(result.ticks, 5);
        assert_eq!(engine.cancel(), result);
        assert!(matches!(
            engine.tick(1.0, &mut surface),
            TickOutcome::Ended(_)
        ));
        drop(engine);

        assert_eq!(sink.export_count(), 1);
        assert_eq!(sink.exports()[0].records.len(), 5);
    }

    #[test]
    fn test_drop_before_end_exports_as_cancelled() {
        let sink = MemorySink::new();
        {
            let mut engine =
                TrialEngine::setup(config(), &lattice(30), &screen(), Box::new(sink.clone()))
                    .unwrap();
            let mut surface = RecordingSurface::new(800.0, 600.0);
            engine.tick(0.0, &mut surface);
        }
        let exports = sink.exports();
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].result.reason, EndReason::Cancelled);
    }

    #[test]
    fn test_empty_cloth_reaches_end_without_drawing() {
        let sink = MemorySink::new();
        let mut engine =
            TrialEngine::setup(config(), &Cloth::empty(), &screen(), Box::new(sink.clone()))
                .unwrap();
        let mut surface = RecordingSurface::new(800.0, 600.0);
        let outcome = engine.tick(0.0, &mut surface);

        let TickOutcome::Ended(result) = outcome else {
            panic!("expected the first tick to end the trial");
        };
        assert_eq!(result.ticks, 0);
        assert!(result.degeneracies.contains(&Degeneracy::ZeroFrames));
        assert!(result.degeneracies.contains(&Degeneracy::EmptySelection));
        assert_eq!(surface.dot_batches(), 0);
        assert_eq!(sink.export_count(), 1);
    }

    #[test]
    fn test_zero_duration_ends_on_first_tick() {
        let cfg = TrialConfig {
            duration_secs: Some(0.0),
            ..config()
        };
        let mut engine =
            TrialEngine::setup(cfg, &lattice(5), &screen(), Box::new(MemorySink::new()))
                .unwrap();
        let result = run(&mut engine, 60.0);
        assert_eq!(result.ticks, 0);
        assert!(result
            .degeneracies
            .contains(&Degeneracy::NonPositiveDuration));
    }

    #[test]
    fn test_centering_moves_cloth_to_surface_center() {
        let engine =
            TrialEngine::setup(config(), &lattice(5), &screen(), Box::new(MemorySink::new()))
                .unwrap();
        let center = engine.renderer().cloth().center_at(REFERENCE_FRAME).unwrap();
        assert!((center.x - 400.0).abs() < 1e-9);
        assert!((center.y - 300.0).abs() < 1e-9);
        assert_eq!(engine.renderer().anchor(), center);
    }

    #[test]
    fn test_centering_follows_surface_size() {
        let surface = RecordingSurface::counting(200.0, 100.0);
        let engine =
            TrialEngine::setup(config(), &lattice(5), &surface, Box::new(MemorySink::new()))
                .unwrap();
        let center = engine.renderer().cloth().center_at(REFERENCE_FRAME).unwrap();
        assert!((center.x - 100.0).abs() < 1e-9);
        assert!((center.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_telemetry() {
        let run_once = || {
            let sink = MemorySink::new();
            let mut engine =
                TrialEngine::setup(config(), &lattice(5), &screen(), Box::new(sink.clone()))
                    .unwrap();
            run(&mut engine, 60.0);
            drop(engine);
            sink.exports()[0].records.clone()
        };
        assert_eq!(run_once(), run_once());
    }
}
