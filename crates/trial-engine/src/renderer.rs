//! Per-tick cloth rendering.
//!
//! The sampled cloth is drawn scaled about its reference-frame center, so
//! size changes never move the cloth across the screen. Optional distractor
//! dots reuse the motion of a random cloth dot from a scrambled start
//! position; they are drawn but never counted in telemetry geometry.

use rand::Rng;

use clothstim_model::geometry::{bounding_box, BoundingBox, Point2D};
use clothstim_model::trajectory::Cloth;

use crate::surface::{DotStyle, DrawSurface};

/// A scrambled copy of one cloth dot's motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distractor {
    /// Index into the sampled cloth's trajectories.
    pub source: usize,
    /// Offset added to the source dot's position at every frame.
    pub offset: Point2D,
}

/// Draws one frame of the sampled cloth per call.
#[derive(Debug, Clone)]
pub struct Renderer {
    cloth: Cloth,
    anchor: Point2D,
    style: DotStyle,
    distractors: Vec<Distractor>,
    reference_frame: usize,
}

impl Renderer {
    /// `cloth` is the sampled (and possibly recentered) cloth.
    pub fn new(cloth: Cloth, reference_frame: usize, style: DotStyle) -> Self {
        let anchor = cloth.center_at(reference_frame).unwrap_or(Point2D::ORIGIN);
        Self {
            cloth,
            anchor,
            style,
            distractors: Vec::new(),
            reference_frame,
        }
    }

    /// Add `count` distractors whose reference positions are uniform in the
    /// cloth's reference bounds expanded by `buffer_px`.
    pub fn add_distractors<R: Rng + ?Sized>(&mut self, count: u32, buffer_px: f64, rng: &mut R) {
        if count == 0 {
            return;
        }
        let Some(bounds) = self.cloth.bounds_at(self.reference_frame) else {
            tracing::warn!(count, "No cloth dots to drive distractors; none added");
            return;
        };
        let region = bounds.expand(buffer_px.max(0.0));

        for _ in 0..count {
            let source = rng.random_range(0..self.cloth.len());
            let x = lerp(region.min_x, region.max_x, rng.random::<f64>());
            let y = lerp(region.min_y, region.max_y, rng.random::<f64>());
            let origin = self.cloth.trajectories()[source]
                .position(self.reference_frame)
                .unwrap_or(Point2D::ORIGIN);
            self.distractors.push(Distractor {
                source,
                offset: Point2D::new(x - origin.x, y - origin.y),
            });
        }
        tracing::debug!(count, buffer_px, "Distractor dots added");
    }

    pub fn cloth(&self) -> &Cloth {
        &self.cloth
    }

    /// Scale anchor in surface pixels.
    pub fn anchor(&self) -> Point2D {
        self.anchor
    }

    pub fn style(&self) -> &DotStyle {
        &self.style
    }

    pub fn distractors(&self) -> &[Distractor] {
        &self.distractors
    }

    /// Cloth dot positions at `frame`, scaled about the anchor.
    pub fn cloth_positions(&self, frame: usize, scale: f64) -> Vec<Point2D> {
        self.cloth
            .positions_at(frame)
            .iter()
            .map(|p| p.scaled_about(&self.anchor, scale))
            .collect()
    }

    pub fn distractor_positions(&self, frame: usize, scale: f64) -> Vec<Point2D> {
        self.distractors
            .iter()
            .filter_map(|d| {
                self.cloth.trajectories()[d.source]
                    .position(frame)
                    .map(|p| p.offset(d.offset.x, d.offset.y))
            })
            .map(|p| p.scaled_about(&self.anchor, scale))
            .collect()
    }

    /// Clear the surface and draw `frame` at `scale`.
    ///
    /// Returns the bounds of the cloth dots as drawn, or `None` when the
    /// cloth is empty.
    pub fn render(
        &self,
        surface: &mut dyn DrawSurface,
        frame: usize,
        scale: f64,
    ) -> Option<BoundingBox> {
        let dots = self.cloth_positions(frame, scale);
        let bounds = bounding_box(&dots);

        surface.clear();
        surface.draw_dots(&dots, &self.style);
        if !self.distractors.is_empty() {
            surface.draw_dots(&self.distractor_positions(frame, scale), &self.style);
        }
        bounds
    }

    /// Clear the surface and draw nothing.
    pub fn render_blank(&self, surface: &mut dyn DrawSurface) {
        surface.clear();
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;
    use clothstim_model::trajectory::DotSample;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    /// Two dots, three frames, moving right by 10 px per frame.
    fn cloth() -> Cloth {
        let mut samples = Vec::new();
        for f in 0..3u32 {
            let dx = f as f64 * 10.0;
            samples.push(DotSample::new(1, f, 100.0 + dx, 100.0));
            samples.push(DotSample::new(2, f, 140.0 + dx, 120.0));
        }
        Cloth::from_samples(&samples).unwrap()
    }

    #[test]
    fn test_scale_about_reference_center() {
        let renderer = Renderer::new(cloth(), 0, DotStyle::default());
        assert_eq!(renderer.anchor(), Point2D::new(120.0, 110.0));

        let dots = renderer.cloth_positions(0, 2.0);
        assert_eq!(dots[0], Point2D::new(80.0, 90.0));
        assert_eq!(dots[1], Point2D::new(160.0, 130.0));
    }

    #[test]
    fn test_render_reports_drawn_bounds() {
        let renderer = Renderer::new(cloth(), 0, DotStyle::default());
        let mut surface = RecordingSurface::new(400.0, 400.0);
        let bounds = renderer.render(&mut surface, 1, 1.5).unwrap();
        assert!((bounds.width() - 60.0).abs() < 1e-9);
        assert!((bounds.height() - 30.0).abs() < 1e-9);
        assert_eq!(surface.clears(), 1);
        assert_eq!(surface.last_dots().len(), 2);
    }

    #[test]
    fn test_empty_cloth_draws_nothing() {
        let renderer = Renderer::new(Cloth::empty(), 0, DotStyle::default());
        let mut surface = RecordingSurface::new(100.0, 100.0);
        assert!(renderer.render(&mut surface, 0, 1.0).is_none());
        assert_eq!(surface.dot_batches(), 0);
    }

    #[test]
    fn test_distractors_follow_source_motion_and_skip_bounds() {
        let mut renderer = Renderer::new(cloth(), 0, DotStyle::default());
        let mut rng = SmallRng::seed_from_u64(21);
        renderer.add_distractors(5, 20.0, &mut rng);
        assert_eq!(renderer.distractors().len(), 5);

        let region = renderer
            .cloth()
            .bounds_at(0)
            .unwrap()
            .expand(20.0 + 1e-9);
        let start = renderer.distractor_positions(0, 1.0);
        let later = renderer.distractor_positions(2, 1.0);
        for (a, b) in start.iter().zip(&later) {
            assert!(region.contains(a));
            assert!((b.x - a.x - 20.0).abs() < 1e-9);
            assert!((b.y - a.y).abs() < 1e-9);
        }

        let mut surface = RecordingSurface::new(400.0, 400.0);
        let bounds = renderer.render(&mut surface, 0, 1.0).unwrap();
        assert_eq!(surface.last_dots().len(), 7);
        assert!((bounds.width() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_distractors_need_a_cloth() {
        let mut renderer = Renderer::new(Cloth::empty(), 0, DotStyle::default());
        let mut rng = SmallRng::seed_from_u64(1);
        renderer.add_distractors(3, 10.0, &mut rng);
        assert!(renderer.distractors().is_empty());
    }
}
