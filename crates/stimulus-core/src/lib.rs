//! Clothstim Stimulus Core
//!
//! The state machines behind a point-light cloth trial:
//! - **Sampler:** Reduce a dense dot cloud to one representative dot per grid cell
//! - **Size:** Bounded log-scale random walk of the cloth scale
//! - **Scheduler:** Map elapsed time to displayed frames under blank/hold ISI
//!
//! This crate is pure computation with no I/O or drawing.
//! Randomness is always passed in, so every run can be reproduced from a seed.

pub mod degeneracy;
pub mod sampler;
pub mod scheduler;
pub mod size;

pub use degeneracy::Degeneracy;
pub use sampler::{GridSampler, GridSelection};
pub use scheduler::FrameScheduler;
pub use size::SizeController;
