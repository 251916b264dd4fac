//! Non-fatal runtime conditions.

use serde::{Deserialize, Serialize};

/// A condition that degrades the presentation without aborting the trial.
///
/// Degeneracies are collected into the trial result instead of being raised;
/// the trial still runs to its normal end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degeneracy {
    /// No dot was selected, so nothing is drawn.
    EmptySelection,
    /// The grid had more cells than dots; some cells stayed empty.
    PoolExhausted,
    /// The sampled cloth has no spatial extent, so size variation is off.
    ZeroExtent,
    /// The trial duration was zero or negative.
    NonPositiveDuration,
    /// The trajectory data had no frames.
    ZeroFrames,
}
