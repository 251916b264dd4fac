//! Clock and timing utilities for trial presentation.
//!
//! Every tick timestamp handed to the engine is measured against a
//! monotonic epoch recorded when the host starts driving the trial.

use std::time::Instant;

/// A trial clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment presentation started).
#[derive(Debug, Clone)]
pub struct TrialClock {
    /// The instant presentation started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl TrialClock {
    /// Create a new trial clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: wall_clock_now(),
        }
    }

    /// Seconds between the epoch and `instant` (zero if `instant` is earlier).
    pub fn secs_at(&self, instant: Instant) -> f64 {
        instant.saturating_duration_since(self.epoch).as_secs_f64()
    }

    /// Wall-clock time at the epoch.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Current wall-clock time as RFC 3339.
pub fn wall_clock_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Convert milliseconds to seconds.
pub fn ms_to_secs(ms: f64) -> f64 {
    ms / 1000.0
}

/// Nominal interval between display refreshes, in seconds.
pub fn refresh_interval_secs(refresh_hz: f64) -> f64 {
    if refresh_hz > 0.0 {
        1.0 / refresh_hz
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = TrialClock::start();
        let now = clock.secs_at(Instant::now());
        assert!((0.0..1.0).contains(&now));
        assert!(!clock.epoch_wall().is_empty());
    }

    #[test]
    fn test_secs_at_before_epoch_is_zero() {
        let earlier = Instant::now();
        let clock = TrialClock::start();
        assert_eq!(clock.secs_at(earlier), 0.0);
    }

    #[test]
    fn test_ms_to_secs() {
        assert!((ms_to_secs(1500.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_refresh_interval() {
        assert!((refresh_interval_secs(60.0) - 1.0 / 60.0).abs() < 1e-12);
        assert_eq!(refresh_interval_secs(0.0), 0.0);
    }
}
