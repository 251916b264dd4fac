//! Size variation: a bounded random walk on the log of the cloth scale.
//!
//! Bounds are given in degrees of visual angle and converted to scale
//! factors against the cloth's initial pixel diagonal, so the perceived
//! extent stays within fixed limits whatever the native pixel size.
//!
//! Working in log space makes each additive step a multiplicative change
//! of `scaling_ratio`. A step that would cross a bound is reflected once:
//! the direction flips and the flipped step is applied instead. From any
//! starting point inside the range the walk stays inside `[log_min, log_max]`
//! as long as `ln(scaling_ratio) <= (log_max - log_min) / 2`. A larger step
//! can overshoot after the bounce; this is not clamped.

use rand::Rng;

use clothstim_common::error::{StimulusError, StimulusResult};
use clothstim_model::trial::{SizeVariationMode, TrialConfig};

use crate::degeneracy::Degeneracy;

/// Direction of the next log-scale step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Grow,
    Shrink,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Grow => 1.0,
            Direction::Shrink => -1.0,
        }
    }

    pub fn flipped(&self) -> Direction {
        match self {
            Direction::Grow => Direction::Shrink,
            Direction::Shrink => Direction::Grow,
        }
    }

    /// Uniform draw from `{Grow, Shrink}`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Direction {
        if rng.random_bool(0.5) {
            Direction::Grow
        } else {
            Direction::Shrink
        }
    }
}

/// When a new direction is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionPolicy {
    /// Draw a fresh direction on every step.
    RedrawEachStep,
    /// Keep the direction for `steps` consecutive steps, then redraw.
    /// A bounce flips the direction and restarts the count.
    Persist { steps: u32 },
}

impl DirectionPolicy {
    /// `0` and `1` both mean "redraw every step".
    pub fn from_persistence(steps: u32) -> Self {
        if steps <= 1 {
            DirectionPolicy::RedrawEachStep
        } else {
            DirectionPolicy::Persist { steps }
        }
    }
}

/// Linear scale limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeBounds {
    pub min_scale: f64,
    pub max_scale: f64,
}

impl SizeBounds {
    /// Convert angular limits to scale factors for a cloth whose diagonal is
    /// `extent_px`. `None` when the cloth has no extent.
    pub fn from_angular(
        extent_px: f64,
        min_deg: f64,
        max_deg: f64,
        pixels_per_degree: f64,
    ) -> Option<Self> {
        if !(extent_px > 0.0 && extent_px.is_finite()) {
            return None;
        }
        Some(Self {
            min_scale: min_deg * pixels_per_degree / extent_px,
            max_scale: max_deg * pixels_per_degree / extent_px,
        })
    }

    pub fn contains(&self, scale: f64, tolerance: f64) -> bool {
        scale >= self.min_scale * (1.0 - tolerance) && scale <= self.max_scale * (1.0 + tolerance)
    }
}

/// Apply one reflected step.
///
/// Returns the new log value and the direction actually taken.
pub fn reflect_step(
    log_scale: f64,
    direction: Direction,
    log_step: f64,
    log_min: f64,
    log_max: f64,
) -> (f64, Direction) {
    let candidate = log_scale + direction.sign() * log_step;
    if candidate > log_max || candidate < log_min {
        let flipped = direction.flipped();
        (log_scale + flipped.sign() * log_step, flipped)
    } else {
        (candidate, direction)
    }
}

#[derive(Debug, Clone, Copy)]
struct Waypoint {
    from: f64,
    to: f64,
    done: u32,
    total: u32,
}

/// Scale state machine. Stepped once per displayed-frame change.
#[derive(Debug, Clone)]
pub struct SizeController {
    mode: SizeVariationMode,
    policy: DirectionPolicy,
    log_scale: f64,
    log_min: f64,
    log_max: f64,
    log_step: f64,
    direction: Direction,
    steps_in_direction: u32,
    waypoint: Option<Waypoint>,
    steps_taken: u64,
    degeneracy: Option<Degeneracy>,
}

impl SizeController {
    /// A controller that always reports a scale of 1.0.
    pub fn disabled() -> Self {
        Self {
            mode: SizeVariationMode::Disabled,
            policy: DirectionPolicy::RedrawEachStep,
            log_scale: 0.0,
            log_min: 0.0,
            log_max: 0.0,
            log_step: 0.0,
            direction: Direction::Grow,
            steps_in_direction: 0,
            waypoint: None,
            steps_taken: 0,
            degeneracy: None,
        }
    }

    /// Build from explicit bounds.
    ///
    /// The initial log scale is uniform in `[log_min, log_max]` and the initial
    /// direction uniform in `{Grow, Shrink}`.
    pub fn new<R: Rng + ?Sized>(
        mode: SizeVariationMode,
        bounds: SizeBounds,
        scaling_ratio: f64,
        policy: DirectionPolicy,
        rng: &mut R,
    ) -> StimulusResult<Self> {
        if !mode.is_enabled() {
            return Ok(Self::disabled());
        }
        if !(scaling_ratio > 1.0 && scaling_ratio.is_finite()) {
            return Err(StimulusError::configuration(format!(
                "scaling_ratio must be greater than 1, got {scaling_ratio}"
            )));
        }
        if !(bounds.min_scale > 0.0 && bounds.min_scale <= bounds.max_scale)
            || !bounds.max_scale.is_finite()
        {
            return Err(StimulusError::configuration(format!(
                "invalid scale bounds [{}, {}]",
                bounds.min_scale, bounds.max_scale
            )));
        }

        let log_min = bounds.min_scale.ln();
        let log_max = bounds.max_scale.ln();
        let log_step = scaling_ratio.ln();
        if log_step > (log_max - log_min) / 2.0 {
            tracing::warn!(
                log_step,
                range = log_max - log_min,
                "Scaling step exceeds half the size range; a bounce may overshoot the bounds"
            );
        }

        let log_scale = rng.random_range(log_min..=log_max);
        let direction = Direction::random(rng);

        Ok(Self {
            mode,
            policy,
            log_scale,
            log_min,
            log_max,
            log_step,
            direction,
            steps_in_direction: 0,
            waypoint: None,
            steps_taken: 0,
            degeneracy: None,
        })
    }

    /// Build from a trial config and the sampled cloth's initial diagonal.
    ///
    /// A cloth with no extent degrades to a fixed scale of 1.0.
    pub fn from_config<R: Rng + ?Sized>(
        config: &TrialConfig,
        extent_px: f64,
        rng: &mut R,
    ) -> StimulusResult<Self> {
        if !config.size_variation.is_enabled() {
            return Ok(Self::disabled());
        }

        let Some(bounds) = SizeBounds::from_angular(
            extent_px,
            config.min_size_deg,
            config.max_size_deg,
            config.pixels_per_degree,
        ) else {
            tracing::warn!(extent_px, "Cloth has no extent; size variation disabled");
            let mut controller = Self::disabled();
            controller.degeneracy = Some(Degeneracy::ZeroExtent);
            return Ok(controller);
        };

        let controller = Self::new(
            config.size_variation,
            bounds,
            config.scaling_ratio,
            DirectionPolicy::from_persistence(config.direction_persistence),
            rng,
        )?;
        tracing::info!(
            extent_px,
            min_scale = bounds.min_scale,
            max_scale = bounds.max_scale,
            initial_scale = controller.scale(),
            "Size controller ready"
        );
        Ok(controller)
    }

    /// Build with a known starting state. Useful for deterministic hosts.
    pub fn with_state(
        mode: SizeVariationMode,
        bounds: SizeBounds,
        scaling_ratio: f64,
        policy: DirectionPolicy,
        initial_scale: f64,
        direction: Direction,
    ) -> Self {
        Self {
            mode,
            policy,
            log_scale: initial_scale.ln(),
            log_min: bounds.min_scale.ln(),
            log_max: bounds.max_scale.ln(),
            log_step: scaling_ratio.ln(),
            direction,
            steps_in_direction: 0,
            waypoint: None,
            steps_taken: 0,
            degeneracy: None,
        }
    }

    /// Current linear scale. Never mutates.
    pub fn scale(&self) -> f64 {
        if self.mode.is_enabled() {
            self.log_scale.exp()
        } else {
            1.0
        }
    }

    pub fn log_scale(&self) -> f64 {
        self.log_scale
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn mode(&self) -> SizeVariationMode {
        self.mode
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    pub fn degeneracy(&self) -> Option<Degeneracy> {
        self.degeneracy
    }

    /// Linear bounds, when size variation is active.
    pub fn bounds(&self) -> Option<SizeBounds> {
        self.mode.is_enabled().then(|| SizeBounds {
            min_scale: self.log_min.exp(),
            max_scale: self.log_max.exp(),
        })
    }

    /// Advance one step and return the new scale.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        match self.mode {
            SizeVariationMode::Disabled => {
                self.steps_taken += 1;
                1.0
            }
            SizeVariationMode::RandomWalk => self.step_with(|| Direction::random(rng)),
            SizeVariationMode::Interpolated { steps } => {
                let (lo, hi) = (self.log_min, self.log_max);
                self.step_interpolated(steps, || rng.random_range(lo..=hi))
            }
        }
    }

    /// Random-walk step with an explicit direction source.
    ///
    /// `draw` is only called when the direction policy asks for a new direction.
    pub fn step_with<F>(&mut self, draw: F) -> f64
    where
        F: FnOnce() -> Direction,
    {
        self.steps_taken += 1;
        if !self.mode.is_enabled() {
            return 1.0;
        }

        let wanted = match self.policy {
            DirectionPolicy::RedrawEachStep => draw(),
            DirectionPolicy::Persist { steps } => {
                if self.steps_in_direction >= steps {
                    self.steps_in_direction = 0;
                    draw()
                } else {
                    self.direction
                }
            }
        };

        let (next, taken) = reflect_step(
            self.log_scale,
            wanted,
            self.log_step,
            self.log_min,
            self.log_max,
        );
        if taken != wanted {
            tracing::trace!(log_scale = next, "Size walk bounced off a bound");
            self.steps_in_direction = 0;
        }
        self.steps_in_direction += 1;
        self.direction = taken;
        self.log_scale = next;
        self.scale()
    }

    fn step_interpolated<F>(&mut self, steps: u32, draw_target: F) -> f64
    where
        F: FnOnce() -> f64,
    {
        self.steps_taken += 1;
        let total = steps.max(1);

        let mut waypoint = match self.waypoint {
            Some(wp) if wp.done < wp.total => wp,
            _ => Waypoint {
                from: self.log_scale,
                to: draw_target(),
                done: 0,
                total,
            },
        };
        waypoint.done += 1;

        let t = waypoint.done as f64 / waypoint.total as f64;
        self.log_scale = waypoint.from + (waypoint.to - waypoint.from) * t;
        self.direction = if waypoint.to >= waypoint.from {
            Direction::Grow
        } else {
            Direction::Shrink
        };
        self.waypoint = Some(waypoint);
        self.scale()
    }
}
