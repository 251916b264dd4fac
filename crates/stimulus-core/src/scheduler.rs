//! ISI-driven frame scheduling.
//!
//! Maps elapsed time to the displayed frame index and decides, tick by tick,
//! whether the frame is shown, held, or replaced by a blank gap.
//!
//! # Lifecycle
//!
//! `Idle → Running → Ended`. The first tick starts the clock. Every tick
//! checks the elapsed time against the trial duration before anything else,
//! so a non-positive duration ends on the very first tick.
//!
//! # Frame mapping
//!
//! `index = floor(clamp(elapsed / duration, 0, 1) * total_frames)`, mirrored
//! for reverse playback and clamped to `[0, total_frames - 1]`. Advances
//! always recompute the index from the current time rather than stepping by
//! one, so frames are skipped when the gap or hold outlasts a frame slot.
//!
//! # Planning
//!
//! [`FrameScheduler::plan`] is pure: it returns the decision for a tick
//! without touching the scheduler. [`FrameScheduler::commit`] applies it.
//! Drawing and size changes are left to the caller.

use clothstim_common::clock::ms_to_secs;
use clothstim_model::trial::{IsiMode, TrialConfig};

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Ended,
}

/// Sub-phase of a running trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The current frame is drawn once (blank mode).
    Visible,
    /// Nothing is drawn until the gap elapses (blank mode).
    BlankWait,
    /// The current frame stays on screen (hold mode).
    HoldWait,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Visible => "visible",
            Phase::BlankWait => "blank",
            Phase::HoldWait => "hold",
        }
    }
}

/// Displayed frame and the phase it is in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    pub index: usize,
    pub phase: Phase,
    /// Elapsed seconds at which `phase` was entered.
    pub phase_start: f64,
}

/// What the host should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Draw the frame at this sequence index.
    Draw { index: usize },
    /// Clear the surface and draw nothing.
    Blank,
    /// The trial is over. Nothing is drawn or recorded.
    End,
}

/// Decision for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickPlan {
    /// Seconds since the first tick.
    pub elapsed: f64,
    pub action: TickAction,
    /// Phase the tick is reported in. `None` on the ending tick.
    pub phase: Option<Phase>,
    /// Seconds spent in `phase` so far.
    pub phase_secs: f64,
    /// Whether the displayed frame changed, which calls for one size step.
    pub size_step: bool,
    state: SchedulerState,
    frame: Option<FrameState>,
    start: f64,
}

impl TickPlan {
    pub fn is_end(&self) -> bool {
        matches!(self.action, TickAction::End)
    }

    /// Scheduler state after this tick is committed.
    pub fn next_state(&self) -> SchedulerState {
        self.state
    }
}

/// Timing parameters, with cycles and ISI inflation already applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleConfig {
    /// Effective trial duration in seconds.
    pub duration_secs: f64,
    /// Frames in the full sequence, including cycle repetition.
    pub total_frames: usize,
    pub hold_ms: f64,
    pub isi_ms: f64,
    pub isi_extends_duration: bool,
    pub mode: IsiMode,
    pub reverse: bool,
    /// Pin every tick to this index.
    pub static_index: Option<usize>,
}

impl ScheduleConfig {
    /// Derive the schedule for a cloth with `frame_count` frames.
    ///
    /// When the gap extends the trial, the base duration is inflated once by
    /// `(total_frames - 1) * isi_ms / 1000`.
    pub fn derive(config: &TrialConfig, frame_count: usize) -> Self {
        let total_frames = frame_count * config.cycles as usize;
        let base = config.base_duration_secs(frame_count);
        let isi_ms = config.isi_ms as f64;

        let duration_secs = if config.isi_extends_duration && total_frames > 0 {
            base + ms_to_secs((total_frames - 1) as f64 * isi_ms)
        } else {
            base
        };

        let static_index = config
            .static_display
            .then(|| config.static_frame.unwrap_or(0) as usize);

        Self {
            duration_secs,
            total_frames,
            hold_ms: config.hold_ms() as f64,
            isi_ms,
            isi_extends_duration: config.isi_extends_duration,
            mode: config.isi_mode,
            reverse: config.reverse,
            static_index,
        }
    }

    /// Sequence index for an elapsed time.
    pub fn target_index(&self, elapsed: f64) -> usize {
        if self.total_frames == 0 {
            return 0;
        }
        let last = self.total_frames - 1;
        if let Some(index) = self.static_index {
            return index.min(last);
        }

        let fraction = if self.duration_secs > 0.0 {
            (elapsed / self.duration_secs).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let raw = ((fraction * self.total_frames as f64).floor() as usize).min(last);
        if self.reverse {
            last - raw
        } else {
            raw
        }
    }
}

/// Frame-advance state machine.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    config: ScheduleConfig,
    state: SchedulerState,
    frame: Option<FrameState>,
    /// Host timestamp of the first tick.
    start: Option<f64>,
}

impl FrameScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Idle,
            frame: None,
            start: None,
        }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn frame(&self) -> Option<FrameState> {
        self.frame
    }

    /// Host timestamp of the first tick, once running.
    pub fn start_time(&self) -> Option<f64> {
        self.start
    }

    /// Decide what happens at host time `now` (seconds).
    pub fn plan(&self, now: f64) -> TickPlan {
        match self.state {
            SchedulerState::Ended => {
                let start = self.start.unwrap_or(now);
                self.end_plan(now - start, start)
            }
            SchedulerState::Idle => {
                let initial = FrameState {
                    index: self.config.target_index(0.0),
                    phase: match self.config.mode {
                        IsiMode::Hold => Phase::HoldWait,
                        IsiMode::Blank => Phase::Visible,
                    },
                    phase_start: 0.0,
                };
                self.running_plan(0.0, now, initial)
            }
            SchedulerState::Running => {
                let start = self.start.unwrap_or(now);
                match self.frame {
                    Some(frame) => self.running_plan(now - start, start, frame),
                    None => self.end_plan(now - start, start),
                }
            }
        }
    }

    /// Apply a plan produced by [`plan`](Self::plan).
    pub fn commit(&mut self, plan: &TickPlan) {
        if self.state == SchedulerState::Idle {
            tracing::debug!(
                duration_secs = self.config.duration_secs,
                total_frames = self.config.total_frames,
                mode = self.config.mode.as_str(),
                "Frame scheduler running"
            );
        }
        if plan.state == SchedulerState::Ended && self.state != SchedulerState::Ended {
            tracing::debug!(elapsed = plan.elapsed, "Frame scheduler ended");
        }
        self.state = plan.state;
        self.frame = plan.frame;
        self.start = Some(plan.start);
    }

    /// Plan and commit in one call.
    pub fn tick(&mut self, now: f64) -> TickPlan {
        let plan = self.plan(now);
        self.commit(&plan);
        plan
    }

    fn end_plan(&self, elapsed: f64, start: f64) -> TickPlan {
        TickPlan {
            elapsed,
            action: TickAction::End,
            phase: None,
            phase_secs: 0.0,
            size_step: false,
            state: SchedulerState::Ended,
            frame: self.frame,
            start,
        }
    }

    fn running_plan(&self, elapsed: f64, start: f64, frame: FrameState) -> TickPlan {
        if elapsed >= self.config.duration_secs || self.config.total_frames == 0 {
            return self.end_plan(elapsed, start);
        }

        let (next, action, phase, phase_secs, size_step) = match self.config.mode {
            IsiMode::Hold => self.hold_tick(elapsed, frame),
            IsiMode::Blank => self.blank_tick(elapsed, frame),
        };

        TickPlan {
            elapsed,
            action,
            phase: Some(phase),
            phase_secs,
            size_step,
            state: SchedulerState::Running,
            frame: Some(next),
            start,
        }
    }

    fn hold_tick(
        &self,
        elapsed: f64,
        frame: FrameState,
    ) -> (FrameState, TickAction, Phase, f64, bool) {
        let mut next = FrameState {
            phase: Phase::HoldWait,
            ..frame
        };
        let mut changed = false;

        if (elapsed - frame.phase_start) * 1000.0 >= self.config.hold_ms {
            let target = self.config.target_index(elapsed);
            next.phase_start = elapsed;
            changed = target != frame.index;
            next.index = target;
        }

        (
            next,
            TickAction::Draw { index: next.index },
            Phase::HoldWait,
            elapsed - next.phase_start,
            changed,
        )
    }

    fn blank_tick(
        &self,
        elapsed: f64,
        frame: FrameState,
    ) -> (FrameState, TickAction, Phase, f64, bool) {
        match frame.phase {
            Phase::BlankWait => {
                let gap_over = self.config.isi_ms <= 0.0
                    || (elapsed - frame.phase_start) * 1000.0 >= self.config.isi_ms;
                if !gap_over {
                    return (
                        frame,
                        TickAction::Blank,
                        Phase::BlankWait,
                        elapsed - frame.phase_start,
                        false,
                    );
                }

                // Back to Visible and drawn on this same tick, so a zero gap
                // never produces a blank row.
                let target = self.config.target_index(elapsed);
                let next = FrameState {
                    index: target,
                    phase: Phase::BlankWait,
                    phase_start: elapsed,
                };
                (
                    next,
                    TickAction::Draw { index: target },
                    Phase::Visible,
                    0.0,
                    target != frame.index,
                )
            }
            Phase::Visible | Phase::HoldWait => {
                let next = FrameState {
                    index: frame.index,
                    phase: Phase::BlankWait,
                    phase_start: elapsed,
                };
                (
                    next,
                    TickAction::Draw { index: frame.index },
                    Phase::Visible,
                    elapsed - frame.phase_start,
                    false,
                )
            }
        }
    }
}
