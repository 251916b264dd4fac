//! Clothstim Stimulus Model
//!
//! Defines the core data contracts for point-light cloth trials:
//! - **Trajectories:** Per-dot positions indexed by frame, parsed from
//!   `(dot, frame, x, y)` tuples
//! - **Geometry:** Points, bounding boxes, and cloth re-centering
//! - **Trial:** Presentation parameters (grid, size variation, ISI, timing)
//!
//! All coordinates are in drawing-surface pixels.

pub mod geometry;
pub mod trajectory;
pub mod trial;

pub use geometry::*;
pub use trajectory::*;
pub use trial::*;
