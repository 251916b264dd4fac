//! Refresh-driven tick loops.
//!
//! The engine only needs a stream of monotonic timestamps. A
//! [`RefreshSource`] supplies them from a simulated display, and
//! [`RealtimeDriver`] supplies them from a tokio interval at the display's
//! refresh rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use clothstim_common::clock::{refresh_interval_secs, TrialClock};

use crate::result::TrialResult;
use crate::surface::DrawSurface;
use crate::trial::{TickOutcome, TrialEngine};

/// Fallback when a non-positive refresh rate is requested.
const DEFAULT_REFRESH_HZ: f64 = 60.0;

/// A source of display-refresh timestamps, in seconds.
pub trait RefreshSource {
    /// Timestamp of the next refresh, or `None` when the host stops.
    fn next_refresh(&mut self) -> Option<f64>;
}

/// Evenly spaced refreshes at a fixed rate, starting at zero.
#[derive(Debug, Clone)]
pub struct SimulatedRefresh {
    interval: f64,
    count: u64,
    limit: Option<u64>,
}

impl SimulatedRefresh {
    pub fn new(refresh_hz: f64) -> Self {
        Self {
            interval: refresh_interval_secs(effective_hz(refresh_hz)),
            count: 0,
            limit: None,
        }
    }

    /// Stop after `limit` refreshes, as if the host quit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn refreshes(&self) -> u64 {
        self.count
    }
}

impl RefreshSource for SimulatedRefresh {
    fn next_refresh(&mut self) -> Option<f64> {
        if self.limit.is_some_and(|limit| self.count >= limit) {
            return None;
        }
        let t = self.count as f64 * self.interval;
        self.count += 1;
        Some(t)
    }
}

/// Tick the engine once per refresh until it ends or the source runs dry.
///
/// Running out of refreshes cancels the trial.
pub fn run_trial(
    engine: &mut TrialEngine,
    source: &mut dyn RefreshSource,
    surface: &mut dyn DrawSurface,
) -> TrialResult {
    while let Some(now) = source.next_refresh() {
        if let TickOutcome::Ended(result) = engine.tick(now, surface) {
            return result;
        }
    }
    engine.cancel()
}

/// Drives a trial from the wall clock at a fixed refresh rate.
pub struct RealtimeDriver {
    refresh_hz: f64,
    stop_flag: Arc<AtomicBool>,
}

impl RealtimeDriver {
    pub fn new(refresh_hz: f64) -> Self {
        Self {
            refresh_hz: effective_hz(refresh_hz),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run until the trial ends or the stop flag is set.
    ///
    /// Late refreshes are skipped rather than bunched, so elapsed time stays
    /// tied to the clock.
    pub async fn run(&self, engine: &mut TrialEngine, surface: &mut dyn DrawSurface) -> TrialResult {
        let period = Duration::from_secs_f64(refresh_interval_secs(self.refresh_hz));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let clock = TrialClock::start();
        tracing::info!(
            refresh_hz = self.refresh_hz,
            epoch = clock.epoch_wall(),
            "Realtime driver started"
        );

        loop {
            let instant = interval.tick().await;
            if self.stop_flag.load(Ordering::Relaxed) {
                tracing::info!("Stop requested");
                return engine.cancel();
            }
            let now = clock.secs_at(instant.into_std());
            if let TickOutcome::Ended(result) = engine.tick(now, surface) {
                return result;
            }
        }
    }

    /// Set the stop flag.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Get the stop flag for external coordination.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn refresh_hz(&self) -> f64 {
        self.refresh_hz
    }
}

fn effective_hz(refresh_hz: f64) -> f64 {
    if refresh_hz > 0.0 && refresh_hz.is_finite() {
        refresh_hz
    } else {
        tracing::warn!(refresh_hz, "Invalid refresh rate; using default");
        DEFAULT_REFRESH_HZ
    }
}
