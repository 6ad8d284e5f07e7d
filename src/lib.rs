pub mod arch;
pub mod error;
pub mod simulator;

pub use error::{ConfigError, Result, UloopError};
pub use simulator::sim::mode::{RunMode, SimConfig, StepMode};
pub use simulator::utils::log;
pub use simulator::Simulator;
