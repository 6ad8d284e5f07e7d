use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use uloop::simulator::config::{load_and_merge_configs, CliOverrides};
use uloop::simulator::sweep::{replay, run_sweep};
use uloop::simulator::utils::log::{init_log, set_quiet};
use uloop::simulator::utils::report::{print_run_report, print_sweep_report};
use uloop::simulator::Simulator;

/// uloop - cycle-level model of a nested-loop address generator
#[derive(Parser, Debug)]
#[command(name = "uloop")]
#[command(version = "0.1.0")]
#[command(about = "Checks a micro-programmed loop engine against closed-form convolution addresses", long_about = None)]
struct Args {
  #[command(subcommand)]
  command: Commands,

  /// Configuration file layered over the built-in defaults
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  /// Quiet mode (suppress log messages)
  #[arg(short, long, global = true)]
  quiet: bool,

  /// Output trace file path
  #[arg(long, value_name = "FILE", global = true)]
  trace_file: Option<String>,

  /// Abort a run that has not finished after this many cycles
  #[arg(long, value_name = "CYCLES", global = true)]
  cycle_budget: Option<u64>,

  /// Micro-ops issued per cycle at most
  #[arg(long, value_name = "N", global = true)]
  issue_width: Option<usize>,

  /// Tile factor
  #[arg(long, global = true)]
  tp: Option<usize>,

  /// Filter size
  #[arg(long, global = true)]
  fs: Option<usize>,

  /// Output height
  #[arg(long, global = true)]
  oh: Option<usize>,

  /// Output width
  #[arg(long, global = true)]
  ow: Option<usize>,

  /// Input channels
  #[arg(long, global = true)]
  nif: Option<usize>,

  /// Output channels
  #[arg(long, global = true)]
  nof: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Compare one configuration against the reference
  Check {
    /// Diagnostic mode: run to the end and log every comparison
    #[arg(short, long)]
    verbose: bool,
  },
  /// Run one configuration and print the generated address stream
  Run,
  /// Interactive stepping shell
  Step,
  /// Check every configuration of the sweep space
  Sweep {
    /// Worker threads (0 = one per core)
    #[arg(short, long)]
    jobs: Option<usize>,
  },
  /// Print the effective configuration as TOML
  PrintConfig,
}

fn main() -> uloop::Result<()> {
  init_log();

  let args = Args::parse();

  let mut cli = CliOverrides {
    quiet: args.quiet,
    trace_file: args.trace_file.clone(),
    cycle_budget: args.cycle_budget,
    issue_width: args.issue_width,
    tp: args.tp,
    fs: args.fs,
    oh: args.oh,
    ow: args.ow,
    nif: args.nif,
    nof: args.nof,
    ..CliOverrides::default()
  };
  match &args.command {
    Commands::Check { verbose } => cli.verbose = *verbose,
    Commands::Step => cli.step = true,
    Commands::Sweep { jobs } => cli.jobs = *jobs,
    Commands::Run | Commands::PrintConfig => {},
  }

  let config = load_and_merge_configs(args.config.as_deref(), &cli)?;
  set_quiet(config.simulation.quiet);
  let params = config.conv;

  let passed = match args.command {
    Commands::Check { .. } | Commands::Step => {
      let mut simulator = Simulator::from_conv(&params, config.sim_config())?;
      let report = simulator.run()?;
      print_run_report(&params, &report);
      report.passed()
    },
    Commands::Run => {
      let sim_config = config.sim_config();
      let mut simulator = Simulator::from_conv(&params, sim_config)?;
      info!("> Config {}", params);
      let mut nb_iter = 0u64;
      while !simulator.is_done() {
        let event = simulator.step()?;
        if let Some(comparison) = event.comparison {
          nb_iter += 1;
          println!("{:?} {}", event.idx, comparison.actual);
        }
      }
      simulator.finish()?;
      println!("nb_iter={} cycles={}", nb_iter, simulator.cycle());
      simulator.report().passed()
    },
    Commands::Sweep { .. } => {
      let sim_config = config.sim_config();
      let report = run_sweep(&config.sweep.space, &sim_config, config.sweep.jobs)?;
      print_sweep_report(&report);
      if let Some((failed, _)) = &report.first_failure {
        let replayed = replay(failed, &sim_config)?;
        print_run_report(failed, &replayed);
      }
      report.is_pass()
    },
    Commands::PrintConfig => {
      print!("{}", config.to_toml()?);
      true
    },
  };

  if !passed {
    error!("uloop: run did not match the reference");
    std::process::exit(1);
  }
  Ok(())
}
