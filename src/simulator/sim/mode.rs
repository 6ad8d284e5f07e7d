use serde::{Deserialize, Serialize};

/// How the harness reacts to address mismatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
  /// Stop at the first mismatch, log nothing per iteration (sweeps)
  Fast,
  /// Run to the end and log every comparison (replaying a failure)
  Diagnostic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
  Continuous,
  Step,
}

pub const DEFAULT_CYCLE_BUDGET: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct SimConfig {
  pub run_mode: RunMode,
  pub step_mode: StepMode,
  /// Cycles after which a run that has not reached `done` is aborted
  pub cycle_budget: u64,
  /// Micro-ops issued per cycle at most
  pub issue_width: usize,
  /// JSON-lines trace of every committed cycle
  pub trace_file: Option<String>,
}

impl Default for SimConfig {
  fn default() -> Self {
    Self {
      run_mode: RunMode::Fast,
      step_mode: StepMode::Continuous,
      cycle_budget: DEFAULT_CYCLE_BUDGET,
      issue_width: 1,
      trace_file: None,
    }
  }
}

impl SimConfig {
  pub fn diagnostic() -> Self {
    Self {
      run_mode: RunMode::Diagnostic,
      ..Self::default()
    }
  }
}
