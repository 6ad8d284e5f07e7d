use crate::arch::uloop::ConvParams;
use crate::error::{ConfigError, Result};
use crate::simulator::sim::mode::{RunMode, SimConfig, StepMode, DEFAULT_CYCLE_BUDGET};
use crate::simulator::sweep::{Axis, SweepSpace};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Embedded default configuration
pub const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// Simulation section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default = "default_run_mode")]
  pub run_mode: RunMode,
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub step_mode: bool,
  #[serde(default = "default_cycle_budget")]
  pub cycle_budget: u64,
  #[serde(default = "default_issue_width")]
  pub issue_width: usize,
  #[serde(default)]
  pub trace_file: String,
}

fn default_run_mode() -> RunMode {
  RunMode::Fast
}

fn default_cycle_budget() -> u64 {
  DEFAULT_CYCLE_BUDGET
}

fn default_issue_width() -> usize {
  1
}

impl Default for SimulationSection {
  fn default() -> Self {
    Self {
      run_mode: default_run_mode(),
      quiet: false,
      step_mode: false,
      cycle_budget: default_cycle_budget(),
      issue_width: default_issue_width(),
      trace_file: String::new(),
    }
  }
}

/// Sweep section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SweepSection {
  /// Worker threads, 0 lets rayon decide
  #[serde(default)]
  pub jobs: usize,
  #[serde(default)]
  pub space: SweepSpace,
}

/// Unified application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub simulation: SimulationSection,
  #[serde(default)]
  pub conv: ConvParams,
  #[serde(default)]
  pub sweep: SweepSection,
}

impl AppConfig {
  /// Harness settings derived from the simulation section
  pub fn sim_config(&self) -> SimConfig {
    let simulation = &self.simulation;
    SimConfig {
      run_mode: simulation.run_mode,
      step_mode: if simulation.step_mode {
        StepMode::Step
      } else {
        StepMode::Continuous
      },
      cycle_budget: simulation.cycle_budget,
      issue_width: simulation.issue_width,
      trace_file: if simulation.trace_file.is_empty() {
        None
      } else {
        Some(simulation.trace_file.clone())
      },
    }
  }

  /// Effective configuration as TOML
  pub fn to_toml(&self) -> Result<String> {
    Ok(toml::to_string_pretty(self)?)
  }
}

/// Command line values that take precedence over every file and environment layer
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
  pub quiet: bool,
  pub verbose: bool,
  pub step: bool,
  pub trace_file: Option<String>,
  pub cycle_budget: Option<u64>,
  pub issue_width: Option<usize>,
  pub jobs: Option<usize>,
  pub tp: Option<usize>,
  pub fs: Option<usize>,
  pub oh: Option<usize>,
  pub ow: Option<usize>,
  pub nif: Option<usize>,
  pub nof: Option<usize>,
}

/// Parse the embedded defaults on their own
pub fn load_default_config() -> Result<AppConfig> {
  toml::from_str::<AppConfig>(DEFAULT_CONFIG).map_err(|e| {
    ConfigError::InvalidSetting {
      reason: format!("embedded default.toml: {}", e),
    }
    .into()
  })
}

/// Layered load: embedded defaults, then `custom_path`, then `ULOOP_*` environment
/// variables (`ULOOP_SIMULATION__CYCLE_BUDGET=500`)
pub fn load_layers(custom_path: Option<&Path>) -> Result<AppConfig> {
  let mut builder = Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
  if let Some(path) = custom_path {
    builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
  }
  let config = builder
    .add_source(
      Environment::with_prefix("ULOOP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()?;
  Ok(config.try_deserialize::<AppConfig>()?)
}

/// Apply CLI values on top of the loaded configuration
pub fn apply_cli_overrides(config: &mut AppConfig, cli: &CliOverrides) {
  let simulation = &mut config.simulation;
  if cli.quiet {
    simulation.quiet = true;
  }
  if cli.verbose {
    simulation.run_mode = RunMode::Diagnostic;
  }
  if cli.step {
    simulation.step_mode = true;
  }
  if let Some(file) = &cli.trace_file {
    simulation.trace_file = file.clone();
  }
  if let Some(budget) = cli.cycle_budget {
    simulation.cycle_budget = budget;
  }
  if let Some(width) = cli.issue_width {
    simulation.issue_width = width;
  }
  if let Some(jobs) = cli.jobs {
    config.sweep.jobs = jobs;
  }

  let conv = &mut config.conv;
  for (slot, value) in [
    (&mut conv.tp, cli.tp),
    (&mut conv.fs, cli.fs),
    (&mut conv.oh, cli.oh),
    (&mut conv.ow, cli.ow),
    (&mut conv.nif, cli.nif),
    (&mut conv.nof, cli.nof),
  ] {
    if let Some(value) = value {
      *slot = value;
    }
  }
}

/// Check settings the engine cannot validate itself
pub fn validate_config(config: &AppConfig) -> Result<()> {
  if config.simulation.cycle_budget == 0 {
    return Err(invalid("cycle_budget must be positive"));
  }
  if config.simulation.issue_width == 0 {
    return Err(ConfigError::ZeroIssueWidth.into());
  }
  let space = &config.sweep.space;
  for (name, axis) in [
    ("tp", &space.tp),
    ("oh", &space.oh),
    ("ow", &space.ow),
    ("fs", &space.fs),
    ("nif", &space.nif),
    ("nof", &space.nof),
  ] {
    if let Axis::Range { step: 0, .. } = axis {
      return Err(invalid(&format!("sweep axis {} has a zero step", name)));
    }
    if axis.values().is_empty() {
      return Err(invalid(&format!("sweep axis {} is empty", name)));
    }
  }
  Ok(())
}

fn invalid(reason: &str) -> crate::error::UloopError {
  ConfigError::InvalidSetting {
    reason: reason.to_string(),
  }
  .into()
}

/// Load and merge configurations
///
/// Flow:
/// 1. embedded defaults
/// 2. custom configuration file, if any
/// 3. environment variables
/// 4. CLI overrides
/// 5. validation
pub fn load_and_merge_configs(custom_path: Option<&Path>, cli: &CliOverrides) -> Result<AppConfig> {
  let mut config = load_layers(custom_path)?;
  apply_cli_overrides(&mut config, cli);
  validate_config(&config)?;
  Ok(config)
}
