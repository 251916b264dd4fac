//! Grid-based spatial downsampling of a dense cloth.
//!
//! # Algorithm
//!
//! 1. **Bounds** of the cloth at the reference frame define the grid region.
//! 2. **Cells** are visited row by row (`iy` outer, `ix` inner).
//! 3. **Anchor** per cell: cell center plus `jitter * (U(0,1) - 0.5) * cell_size`,
//!    drawn independently for x then y.
//! 4. **Assign** the nearest dot not yet taken. Ties go to the dot that comes
//!    first in the cloth. Once every dot is taken, remaining cells stay empty.

use rand::Rng;

use clothstim_model::geometry::{BoundingBox, Point2D};
use clothstim_model::trajectory::{Cloth, DotId};
use clothstim_model::trial::TrialConfig;

/// A cell of the sampling grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub ix: u32,
    pub iy: u32,
}

/// Dots chosen by the sampler, in cell scan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridSelection {
    entries: Vec<(GridCell, DotId)>,
    cells: usize,
}

impl GridSelection {
    pub fn entries(&self) -> &[(GridCell, DotId)] {
        &self.entries
    }

    pub fn dot_ids(&self) -> Vec<DotId> {
        self.entries.iter().map(|(_, id)| *id).collect()
    }

    /// Dot assigned to a cell, if any.
    pub fn dot_in(&self, cell: GridCell) -> Option<DotId> {
        self.entries
            .iter()
            .find(|(c, _)| *c == cell)
            .map(|(_, id)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of grid cells, filled or not.
    pub fn cell_count(&self) -> usize {
        self.cells
    }

    /// Whether the dot pool ran out before every cell was filled.
    pub fn is_exhausted(&self) -> bool {
        self.entries.len() < self.cells
    }

    /// The sampled cloth: selected trajectories in selection order.
    pub fn apply(&self, cloth: &Cloth) -> Cloth {
        cloth.select(&self.dot_ids())
    }
}

/// Grid sampler parameters.
#[derive(Debug, Clone, Copy)]
pub struct GridSampler {
    pub grid_x: u32,
    pub grid_y: u32,
    /// Anchor jitter as a fraction of the cell size. 0 = exact cell centers.
    pub jitter: f64,
}

impl GridSampler {
    pub fn new(grid_x: u32, grid_y: u32, jitter: f64) -> Self {
        Self {
            grid_x,
            grid_y,
            jitter,
        }
    }

    pub fn from_config(config: &TrialConfig) -> Self {
        Self::new(config.grid_x, config.grid_y, config.grid_jitter)
    }

    /// Anchor of cell `(ix, iy)` given two uniform draws in `[0, 1)`.
    pub fn anchor(&self, bounds: &BoundingBox, cell: GridCell, ux: f64, uy: f64) -> Point2D {
        let cell_w = bounds.width() / self.grid_x as f64;
        let cell_h = bounds.height() / self.grid_y as f64;
        let cx = bounds.min_x + (cell.ix as f64 + 0.5) * cell_w;
        let cy = bounds.min_y + (cell.iy as f64 + 0.5) * cell_h;
        Point2D::new(
            cx + self.jitter * (ux - 0.5) * cell_w,
            cy + self.jitter * (uy - 0.5) * cell_h,
        )
    }

    /// Select at most one dot per cell at the reference frame.
    ///
    /// A zero-sized grid or an empty cloth yields an empty selection.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        cloth: &Cloth,
        reference_frame: usize,
        rng: &mut R,
    ) -> GridSelection {
        let cells = self.grid_x as usize * self.grid_y as usize;
        let Some(bounds) = cloth.bounds_at(reference_frame) else {
            return GridSelection {
                entries: vec![],
                cells,
            };
        };
        if cells == 0 {
            return GridSelection::default();
        }

        let pool: Vec<(DotId, Point2D)> = cloth
            .trajectories()
            .iter()
            .filter_map(|t| t.position(reference_frame).map(|p| (t.id, p)))
            .collect();
        let mut taken = vec![false; pool.len()];
        let mut remaining = pool.len();
        let mut entries = Vec::with_capacity(cells.min(pool.len()));

        'scan: for iy in 0..self.grid_y {
            for ix in 0..self.grid_x {
                if remaining == 0 {
                    break 'scan;
                }

                let cell = GridCell { ix, iy };
                let ux: f64 = rng.random();
                let uy: f64 = rng.random();
                let anchor = self.anchor(&bounds, cell, ux, uy);

                let mut best: Option<(usize, f64)> = None;
                for (i, (_, p)) in pool.iter().enumerate() {
                    if taken[i] {
                        continue;
                    }
                    let d = anchor.distance_to(p);
                    if best.map_or(true, |(_, bd)| d < bd) {
                        best = Some((i, d));
                    }
                }

                if let Some((i, _)) = best {
                    taken[i] = true;
                    remaining -= 1;
                    entries.push((cell, pool[i].0));
                }
            }
        }

        let selection = GridSelection { entries, cells };
        tracing::debug!(
            selected = selection.len(),
            cells,
            pool = pool.len(),
            "Grid sampling finished"
        );
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clothstim_model::trajectory::DotSample;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn cloth_from(points: &[(DotId, f64, f64)]) -> Cloth {
        let samples: Vec<DotSample> = points
            .iter()
            .map(|&(id, x, y)| DotSample::new(id, 0, x, y))
            .collect();
        Cloth::from_samples(&samples).unwrap()
    }

    #[test]
    fn test_two_by_two_matches_hand_computed_nearest() {
        // Bounds (0,0)-(100,100); anchors at (25,25), (75,25), (25,75), (75,75).
        let cloth = cloth_from(&[
            (1, 0.0, 0.0),
            (2, 100.0, 100.0),
            (3, 70.0, 30.0),
            (4, 20.0, 80.0),
        ]);
        let sampler = GridSampler::new(2, 2, 0.0);
        let mut rng = SmallRng::seed_from_u64(1);
        let selection = sampler.sample(&cloth, 0, &mut rng);

        // (25,25): dot1 at 35.36, dot3 at 45.28 → dot1.
        assert_eq!(selection.dot_in(GridCell { ix: 0, iy: 0 }), Some(1));
        // (75,25): dot3 at 7.07 → dot3.
        assert_eq!(selection.dot_in(GridCell { ix: 1, iy: 0 }), Some(3));
        // (25,75): dot4 at 7.07 → dot4.
        assert_eq!(selection.dot_in(GridCell { ix: 0, iy: 1 }), Some(4));
        // (75,75): only dot2 left.
        assert_eq!(selection.dot_in(GridCell { ix: 1, iy: 1 }), Some(2));
        assert_eq!(selection.dot_ids(), vec![1, 3, 4, 2]);
        assert!(!selection.is_exhausted());
    }

    #[test]
    fn test_tie_goes_to_input_order() {
        // Both dots are equidistant from the single anchor at (5,0).
        let cloth = cloth_from(&[(9, 10.0, 0.0), (4, 0.0, 0.0)]);
        let sampler = GridSampler::new(1, 1, 0.0);
        let mut rng = SmallRng::seed_from_u64(3);
        let selection = sampler.sample(&cloth, 0, &mut rng);
        assert_eq!(selection.dot_ids(), vec![9]);
    }

    #[test]
    fn test_pool_exhaustion_leaves_cells_empty() {
        let cloth = cloth_from(&[(1, 0.0, 0.0), (2, 10.0, 10.0)]);
        let sampler = GridSampler::new(3, 3, 0.5);
        let mut rng = SmallRng::seed_from_u64(11);
        let selection = sampler.sample(&cloth, 0, &mut rng);
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.cell_count(), 9);
        assert!(selection.is_exhausted());
    }

    #[test]
    fn test_zero_grid_yields_empty_selection() {
        let cloth = cloth_from(&[(1, 0.0, 0.0), (2, 10.0, 10.0)]);
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(GridSampler::new(0, 4, 0.0)
            .sample(&cloth, 0, &mut rng)
            .is_empty());
        assert!(GridSampler::new(4, 0, 0.0)
            .sample(&cloth, 0, &mut rng)
            .is_empty());
    }

    #[test]
    fn test_empty_cloth_yields_empty_selection() {
        let mut rng = SmallRng::seed_from_u64(0);
        let selection = GridSampler::new(2, 2, 0.0).sample(&Cloth::empty(), 0, &mut rng);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_jitter_stays_within_cell() {
        let bounds = BoundingBox {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 40.0,
            max_y: 20.0,
        };
        let sampler = GridSampler::new(4, 2, 1.0);
        let cell = GridCell { ix: 1, iy: 1 };
        let lo = sampler.anchor(&bounds, cell, 0.0, 0.0);
        let hi = sampler.anchor(&bounds, cell, 1.0, 1.0);
        assert_eq!(lo, Point2D::new(10.0, 10.0));
        assert_eq!(hi, Point2D::new(20.0, 20.0));
    }

    #[test]
    fn test_apply_keeps_selection_order() {
        let cloth = cloth_from(&[
            (1, 0.0, 0.0),
            (2, 100.0, 100.0),
            (3, 70.0, 30.0),
            (4, 20.0, 80.0),
        ]);
        let mut rng = SmallRng::seed_from_u64(5);
        let selection = GridSampler::new(2, 2, 0.0).sample(&cloth, 0, &mut rng);
        let sampled = selection.apply(&cloth);
        let ids: Vec<DotId> = sampled.trajectories().iter().map(|t| t.id).collect();
        assert_eq!(ids, selection.dot_ids());
    }
}
