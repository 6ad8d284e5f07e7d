//! Parameter sweep over many independent convolution configurations.

use super::sim::mode::{RunMode, SimConfig, StepMode};
use super::simulator::{RunReport, Simulator};
use crate::arch::uloop::ConvParams;
use crate::error::{Result, UloopError};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Values taken by one swept parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Axis {
  List(Vec<usize>),
  /// Inclusive range
  Range { start: usize, end: usize, step: usize },
}

impl Axis {
  pub fn values(&self) -> Vec<usize> {
    match self {
      Axis::List(values) => values.clone(),
      Axis::Range { start, end, step } => (*start..=*end).step_by((*step).max(1)).collect(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSpace {
  pub tp: Axis,
  pub oh: Axis,
  pub ow: Axis,
  pub fs: Axis,
  pub nif: Axis,
  pub nof: Axis,
}

impl Default for SweepSpace {
  fn default() -> Self {
    Self {
      tp: Axis::List(vec![128]),
      oh: Axis::Range { start: 1, end: 3, step: 1 },
      ow: Axis::Range { start: 1, end: 3, step: 1 },
      fs: Axis::Range { start: 1, end: 5, step: 1 },
      nif: Axis::Range { start: 128, end: 1024, step: 128 },
      nof: Axis::Range { start: 128, end: 1024, step: 128 },
    }
  }
}

impl SweepSpace {
  /// Every valid configuration, `nof` varying fastest and `oh` slowest.
  /// Configurations violating the tile divisibility are left out.
  pub fn configurations(&self) -> Vec<ConvParams> {
    let mut configs = Vec::new();
    for tp in self.tp.values() {
      for oh in self.oh.values() {
        for ow in self.ow.values() {
          for fs in self.fs.values() {
            for nif in self.nif.values() {
              for nof in self.nof.values() {
                let params = ConvParams { tp, fs, oh, ow, nif, nof };
                match params.validate() {
                  Ok(()) => configs.push(params),
                  Err(e) => debug!("skipping {}: {}", params, e),
                }
              }
            }
          }
        }
      }
    }
    configs
  }
}

/// Why a configuration failed
#[derive(Debug)]
pub enum Failure {
  Mismatch(RunReport),
  Error(UloopError),
}

impl std::fmt::Display for Failure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Failure::Mismatch(report) => write!(f, "{} mismatches", report.mismatches),
      Failure::Error(e) => write!(f, "{}", e),
    }
  }
}

#[derive(Debug)]
pub struct SweepReport {
  pub total: usize,
  pub passed: usize,
  /// First failing configuration in enumeration order
  pub first_failure: Option<(ConvParams, Failure)>,
}

impl SweepReport {
  pub fn is_pass(&self) -> bool {
    self.first_failure.is_none()
  }
}

/// Run one configuration in fast mode
pub fn check(params: &ConvParams, config: &SimConfig) -> std::result::Result<RunReport, Failure> {
  let config = SimConfig {
    run_mode: RunMode::Fast,
    step_mode: StepMode::Continuous,
    trace_file: None,
    ..config.clone()
  };
  let report = Simulator::from_conv(params, config)
    .and_then(|mut sim| sim.run())
    .map_err(Failure::Error)?;
  if report.passed() {
    Ok(report)
  } else {
    Err(Failure::Mismatch(report))
  }
}

/// Check every configuration of `space` on `jobs` workers (0 = rayon default)
pub fn run_sweep(space: &SweepSpace, config: &SimConfig, jobs: usize) -> Result<SweepReport> {
  let configs = space.configurations();
  info!("sweeping {} configurations", configs.len());

  let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
  let outcomes: Vec<std::result::Result<RunReport, Failure>> =
    pool.install(|| configs.par_iter().map(|params| check(params, config)).collect());

  let mut passed = 0;
  let mut first_failure = None;
  for (params, outcome) in configs.iter().zip(outcomes) {
    match outcome {
      Ok(_) => passed += 1,
      Err(failure) => {
        warn!("> Config {}: {}", params, failure);
        if first_failure.is_none() {
          first_failure = Some((*params, failure));
        }
      },
    }
  }

  Ok(SweepReport {
    total: configs.len(),
    passed,
    first_failure,
  })
}

/// Re-run a configuration in diagnostic mode to get a readable trace
pub fn replay(params: &ConvParams, config: &SimConfig) -> Result<RunReport> {
  info!("> Replaying {}", params);
  Simulator::from_conv(params, replay_config(config))?.run()
}

/// Settings of a replay: diagnostic, non-interactive, everything else kept
pub fn replay_config(config: &SimConfig) -> SimConfig {
  SimConfig {
    run_mode: RunMode::Diagnostic,
    step_mode: StepMode::Continuous,
    ..config.clone()
  }
}
