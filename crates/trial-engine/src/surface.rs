//! Drawing surface port.
//!
//! The engine never owns a window. Hosts implement [`DrawSurface`] over
//! whatever canvas they present on.

use clothstim_model::geometry::Point2D;
use clothstim_model::trial::TrialConfig;

/// Appearance of a dot.
#[derive(Debug, Clone, PartialEq)]
pub struct DotStyle {
    /// Radius in pixels.
    pub radius: f64,
    /// Color name or hex string, passed through to the host.
    pub color: String,
}

impl DotStyle {
    pub fn from_config(config: &TrialConfig) -> Self {
        Self {
            radius: config.dot_radius_px,
            color: config.dot_color.clone(),
        }
    }
}

impl Default for DotStyle {
    fn default() -> Self {
        Self {
            radius: 3.0,
            color: "white".to_string(),
        }
    }
}

/// A host canvas the renderer draws on once per tick.
pub trait DrawSurface {
    /// Width and height in pixels.
    fn size(&self) -> (f64, f64);

    /// Erase everything drawn so far.
    fn clear(&mut self);

    /// Draw filled dots at the given pixel positions.
    fn draw_dots(&mut self, dots: &[Point2D], style: &DotStyle);
}

/// A recorded draw command.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Clear,
    Dots(Vec<Point2D>),
}

/// Headless surface that records every call. Used for simulation and tests.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    width: f64,
    height: f64,
    calls: Vec<DrawCall>,
    keep_calls: bool,
    clears: u64,
    dot_batches: u64,
    last_dots: Vec<Point2D>,
}

impl RecordingSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            calls: Vec::new(),
            keep_calls: true,
            clears: 0,
            dot_batches: 0,
            last_dots: Vec::new(),
        }
    }

    /// Count calls without storing them. For long simulated runs.
    pub fn counting(width: f64, height: f64) -> Self {
        Self {
            keep_calls: false,
            ..Self::new(width, height)
        }
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn clears(&self) -> u64 {
        self.clears
    }

    /// Number of non-empty `draw_dots` calls.
    pub fn dot_batches(&self) -> u64 {
        self.dot_batches
    }

    /// Dots currently on screen.
    pub fn last_dots(&self) -> &[Point2D] {
        &self.last_dots
    }
}

impl DrawSurface for RecordingSurface {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.clears += 1;
        self.last_dots.clear();
        if self.keep_calls {
            self.calls.push(DrawCall::Clear);
        }
    }

    fn draw_dots(&mut self, dots: &[Point2D], _style: &DotStyle) {
        if dots.is_empty() {
            return;
        }
        self.dot_batches += 1;
        self.last_dots.extend_from_slice(dots);
        if self.keep_calls {
            self.calls.push(DrawCall::Dots(dots.to_vec()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_surface_tracks_screen() {
        let mut surface = RecordingSurface::new(800.0, 600.0);
        let style = DotStyle::default();
        surface.clear();
        surface.draw_dots(&[Point2D::new(1.0, 2.0)], &style);
        surface.draw_dots(&[], &style);
        assert_eq!(surface.size(), (800.0, 600.0));
        assert_eq!(surface.clears(), 1);
        assert_eq!(surface.dot_batches(), 1);
        assert_eq!(surface.last_dots().len(), 1);
        assert_eq!(surface.calls().len(), 2);

        surface.clear();
        assert!(surface.last_dots().is_empty());
    }

    #[test]
    fn test_counting_surface_stores_no_calls() {
        let mut surface = RecordingSurface::counting(10.0, 10.0);
        surface.clear();
        surface.draw_dots(&[Point2D::ORIGIN], &DotStyle::default());
        assert!(surface.calls().is_empty());
        assert_eq!(surface.dot_batches(), 1);
    }
}
