pub mod config;
pub mod sim;
pub mod simulator;
pub mod sweep;
pub mod utils;

pub use simulator::Simulator;
pub use utils::log;
