//! Clothstim Trial Engine
//!
//! Runs one point-light cloth trial on a host-provided surface:
//! - **Trial:** Setup, per-tick orchestration, cancellation, and the result
//! - **Renderer:** Scaled cloth drawing plus optional distractor dots
//! - **Telemetry:** One record per tick, exported once at the end
//! - **Driver:** Simulated and realtime refresh loops
//!
//! The engine owns no window. Hosts implement [`DrawSurface`] and feed
//! monotonic timestamps into [`TrialEngine::tick`].

pub mod driver;
pub mod export;
pub mod renderer;
pub mod result;
pub mod surface;
pub mod telemetry;
pub mod trial;

pub use driver::{run_trial, RealtimeDriver, RefreshSource, SimulatedRefresh};
pub use export::{CsvTelemetryWriter, MemorySink, TelemetrySink};
pub use result::{EndReason, TrialResult};
pub use surface::{DotStyle, DrawSurface, RecordingSurface};
pub use telemetry::{FrameLabel, TelemetryRecord, TelemetryRecorder};
pub use trial::{EngineState, TickOutcome, TrialEngine};
