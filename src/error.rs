//! Error types for the uloop engine and its harness

use thiserror::Error;

/// Result type alias for uloop operations
pub type Result<T> = std::result::Result<T, UloopError>;

/// Defects in the loop hierarchy, micro-program, register bank or problem size.
///
/// All of these are detected before the first cycle runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
  /// Loop hierarchy without any level
  #[error("loop hierarchy has no levels")]
  EmptyHierarchy,

  /// A loop level that would never execute
  #[error("loop level {level} has trip count {trip_count}, expected at least 1")]
  InvalidTripCount {
    /// Offending level (0 = innermost)
    level: usize,
    /// Trip count supplied for it
    trip_count: usize,
  },

  /// Register bank too small to hold the address triple
  #[error("register bank has {accumulators} accumulators out of {size} registers, need at least 3 accumulators")]
  MissingAddressRegisters {
    /// Accumulator count of the bank
    accumulators: usize,
    /// Total register count of the bank
    size: usize,
  },

  /// A micro-op names a register the bank does not have
  #[error("micro-op {op} references r{register}, bank has {size} registers")]
  UndefinedRegister {
    /// Position of the micro-op in the program
    op: usize,
    /// Register id referenced
    register: usize,
    /// Register count of the bank
    size: usize,
  },

  /// A micro-op writes a read-only operand register
  #[error("micro-op {op} writes operand register r{register} (accumulators are r0..r{accumulators})")]
  OperandWrite {
    /// Position of the micro-op in the program
    op: usize,
    /// Register id written
    register: usize,
    /// Accumulator count of the bank
    accumulators: usize,
  },

  /// A micro-op bound to a level the hierarchy does not have
  #[error("micro-op {op} is bound to loop level {level}, hierarchy has {nb_loops} levels")]
  UndefinedLoopLevel {
    /// Position of the micro-op in the program
    op: usize,
    /// Level referenced
    level: usize,
    /// Depth of the hierarchy
    nb_loops: usize,
  },

  /// Sequencer configured to issue nothing
  #[error("issue width must be at least 1")]
  ZeroIssueWidth,

  /// Problem-size parameter that is zero
  #[error("{name}={value} must be positive")]
  NonPositiveParameter {
    /// Parameter name
    name: &'static str,
    /// Value supplied
    value: usize,
  },

  /// Channel count that does not split into whole tiles
  #[error("{name}={value} is not a multiple of TP={tp}")]
  NotTileMultiple {
    /// Parameter name
    name: &'static str,
    /// Value supplied
    value: usize,
    /// Tile factor
    tp: usize,
  },

  /// Problem size whose addresses or iteration count do not fit the 64-bit registers
  #[error("{quantity} of {params} overflows 64-bit arithmetic")]
  ProblemTooLarge {
    /// Quantity that overflows
    quantity: &'static str,
    /// Offending problem size, as displayed
    params: String,
  },

  /// Malformed application configuration
  #[error("invalid configuration: {reason}")]
  InvalidSetting {
    /// What is wrong
    reason: String,
  },
}

/// Top-level error of a run
#[derive(Debug, Error)]
pub enum UloopError {
  /// Configuration defect, no cycle was executed
  #[error("configuration error: {0}")]
  Configuration(#[from] ConfigError),

  /// The loop nest did not terminate within the cycle budget
  #[error("cycle budget of {budget} cycles exceeded before the loop nest terminated")]
  CycleBudgetExceeded {
    /// Budget that was exhausted
    budget: u64,
  },

  /// I/O error while tracing or reading input
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  /// Configuration file or environment could not be loaded
  #[error("failed to load configuration: {0}")]
  ConfigLoad(#[from] config::ConfigError),

  /// Effective configuration could not be rendered
  #[error("failed to render configuration: {0}")]
  ConfigRender(#[from] toml::ser::Error),

  /// Sweep worker pool could not be created
  #[error("failed to build sweep thread pool: {0}")]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
