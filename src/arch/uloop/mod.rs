pub mod conv;
pub mod execute;
pub mod loops;
pub mod program;
pub mod reference;
pub mod registers;
pub mod sequencer;

pub use conv::{micro_program, ConvParams};
pub use execute::execute;
pub use loops::{Advance, LoopHierarchy, LoopLevel};
pub use program::{AppliesOn, MicroOp, MicroProgram, OpKind, Schedule};
pub use reference::{ConvReference, Expected};
pub use registers::{AddressTriple, RegisterBank};
pub use sequencer::{ControlSignals, EngineState, Phase, Sequencer};
