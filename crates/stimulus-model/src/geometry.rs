//! Points, bounding boxes, and cloth re-centering.
//!
//! Geometry is returned as value objects and passed by value between
//! components; nothing here caches extents between calls.

use serde::{Deserialize, Serialize};

use crate::trajectory::Cloth;

/// A 2D point in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const ORIGIN: Point2D = Point2D { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Linear interpolation between two points.
    pub fn lerp(a: &Point2D, b: &Point2D, t: f64) -> Point2D {
        let t = t.clamp(0.0, 1.0);
        Point2D {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
        }
    }

    /// Translate by `(dx, dy)`.
    pub fn offset(&self, dx: f64, dy: f64) -> Point2D {
        Point2D {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Scale this point about `anchor` by `factor`.
    pub fn scaled_about(&self, anchor: &Point2D, factor: f64) -> Point2D {
        Point2D {
            x: anchor.x + (self.x - anchor.x) * factor,
            y: anchor.y + (self.y - anchor.y) * factor,
        }
    }
}

/// Axis-aligned bounding box in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// `min + (max - min) / 2` on each axis.
    pub fn center(&self) -> Point2D {
        Point2D {
            x: self.min_x + self.width() / 2.0,
            y: self.min_y + self.height() / 2.0,
        }
    }

    /// Diagonal extent `sqrt(w^2 + h^2)`.
    pub fn diagonal(&self) -> f64 {
        (self.width().powi(2) + self.height().powi(2)).sqrt()
    }

    /// Grow the box by `margin` on every side.
    pub fn expand(&self, margin: f64) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn contains(&self, p: &Point2D) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// Bounding box of a point set. `None` when there are no points.
pub fn bounding_box<'a, I>(points: I) -> Option<BoundingBox>
where
    I: IntoIterator<Item = &'a Point2D>,
{
    let mut iter = points.into_iter();
    let first = iter.next()?;
    let init = BoundingBox {
        min_x: first.x,
        min_y: first.y,
        max_x: first.x,
        max_y: first.y,
    };
    Some(iter.fold(init, |b, p| BoundingBox {
        min_x: b.min_x.min(p.x),
        min_y: b.min_y.min(p.y),
        max_x: b.max_x.max(p.x),
        max_y: b.max_y.max(p.y),
    }))
}

/// Translate every position of every trajectory so that the cloth's center
/// at `frame` lands on `target`.
///
/// Returns the applied offset. An empty cloth is left untouched and yields a
/// zero offset.
pub fn recenter(cloth: &mut Cloth, target: Point2D, frame: usize) -> Point2D {
    let Some(center) = cloth.center_at(frame) else {
        return Point2D::ORIGIN;
    };

    let dx = target.x - center.x;
    let dy = target.y - center.y;
    cloth.translate(dx, dy);

    tracing::debug!(dx, dy, "Re-centered cloth");
    Point2D::new(dx, dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::DotTrajectory;

    fn square_cloth() -> Cloth {
        Cloth::new(
            vec![
                DotTrajectory::new(1, vec![Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0)]),
                DotTrajectory::new(2, vec![Point2D::new(10.0, 0.0), Point2D::new(11.0, 1.0)]),
                DotTrajectory::new(3, vec![Point2D::new(0.0, 20.0), Point2D::new(1.0, 21.0)]),
            ],
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_bounding_box_and_center() {
        let pts = [
            Point2D::new(2.0, 3.0),
            Point2D::new(-4.0, 7.0),
            Point2D::new(6.0, -1.0),
        ];
        let b = bounding_box(&pts).unwrap();
        assert_eq!(b.min_x, -4.0);
        assert_eq!(b.max_x, 6.0);
        assert_eq!(b.min_y, -1.0);
        assert_eq!(b.max_y, 7.0);
        assert_eq!(b.center(), Point2D::new(1.0, 3.0));
        assert!((b.diagonal() - (100.0f64 + 64.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_box_empty() {
        let pts: [Point2D; 0] = [];
        assert!(bounding_box(&pts).is_none());
    }

    #[test]
    fn test_recenter_moves_center_to_target() {
        let mut cloth = square_cloth();
        let target = Point2D::new(512.0, 384.0);
        let offset = recenter(&mut cloth, target, 0);

        let center = cloth.center_at(0).unwrap();
        assert!((center.x - target.x).abs() < 1e-9);
        assert!((center.y - target.y).abs() < 1e-9);
        assert!((offset.x - 507.0).abs() < 1e-9);

        // Other frames move by the same offset.
        let later = cloth.trajectories()[0].position(1).unwrap();
        assert!((later.x - (1.0 + offset.x)).abs() < 1e-9);
    }

    #[test]
    fn test_recenter_empty_cloth_is_noop() {
        let mut cloth = Cloth::empty();
        let offset = recenter(&mut cloth, Point2D::new(5.0, 5.0), 0);
        assert_eq!(offset, Point2D::ORIGIN);
    }

    #[test]
    fn test_scaled_about_anchor() {
        let p = Point2D::new(12.0, 10.0);
        let scaled = p.scaled_about(&Point2D::new(10.0, 10.0), 2.0);
        assert_eq!(scaled, Point2D::new(14.0, 10.0));
    }

    proptest::proptest! {
        #[test]
        fn prop_bounding_box_contains_all_points(
            coords in proptest::collection::vec((-1e4f64..1e4, -1e4f64..1e4), 1..64)
        ) {
            let pts: Vec<Point2D> = coords.iter().map(|&(x, y)| Point2D::new(x, y)).collect();
            let b = bounding_box(&pts).unwrap();
            for p in &pts {
                proptest::prop_assert!(b.contains(p));
            }
            proptest::prop_assert!(b.width() >= 0.0 && b.height() >= 0.0);
        }
    }
}
