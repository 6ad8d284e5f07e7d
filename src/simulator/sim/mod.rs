pub mod mode;
pub mod shell;
pub mod trace;

pub use mode::{RunMode, SimConfig, StepMode};
pub use trace::{JsonTrace, Observer, Snapshot};
