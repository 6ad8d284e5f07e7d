use super::sim::mode::{RunMode, SimConfig, StepMode};
use super::sim::shell::{Command, Shell};
use super::sim::trace::{JsonTrace, Observer, Snapshot};
use crate::arch::uloop::{
  execute, micro_program, AddressTriple, ControlSignals, ConvParams, ConvReference, EngineState, Expected,
  LoopHierarchy, MicroProgram, RegisterBank, Schedule, Sequencer,
};
use crate::error::{Result, UloopError};
use log::{error, info, trace};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
  /// Engine and reference disagree on the address triple
  Address,
  /// Engine raised `ready` after the reference ran out of iterations
  ReferenceExhausted,
  /// Engine finished while the reference still had iterations
  ReferenceLeftover,
}

/// Context of a failed comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
  pub kind: MismatchKind,
  pub cycle: u64,
  /// Engine odometer position, innermost first
  pub idx: Vec<usize>,
  pub actual: Option<AddressTriple>,
  pub expected: Option<Expected>,
}

/// Outcome of one `ready` cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
  pub actual: AddressTriple,
  pub expected: Option<Expected>,
}

impl Comparison {
  pub fn matches(&self) -> bool {
    self.expected.map_or(false, |e| e.triple == self.actual)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleEvent {
  pub cycle: u64,
  /// Position the cycle worked on
  pub idx: Vec<usize>,
  pub signals: ControlSignals,
  pub comparison: Option<Comparison>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
  pub cycles: u64,
  pub committed_cycles: u64,
  pub ready_cycles: u64,
  pub mismatches: u64,
  pub first_mismatch: Option<Mismatch>,
  /// The engine reached `done`
  pub done: bool,
}

impl RunReport {
  pub fn passed(&self) -> bool {
    self.done && self.mismatches == 0
  }
}

/// Verification harness: runs the engine cycle by cycle and checks every `ready`
/// cycle against the closed-form reference.
pub struct Simulator {
  config: SimConfig,
  sequencer: Sequencer,
  registers: RegisterBank,
  state: EngineState,
  reference: ConvReference,
  cycle: u64,
  report: RunReport,
  observers: Vec<Box<dyn Observer>>,
}

impl Simulator {
  /// Build a harness from already-parsed inputs. Every configuration defect is
  /// reported here, before any cycle runs.
  pub fn new(
    config: SimConfig,
    loops: LoopHierarchy,
    program: MicroProgram,
    registers: RegisterBank,
    reference: ConvReference,
  ) -> Result<Self> {
    let schedule = Schedule::new(program, &loops, &registers, config.issue_width)?;
    let sequencer = Sequencer::new(loops, schedule);
    let state = sequencer.initial_state();

    let mut observers: Vec<Box<dyn Observer>> = Vec::new();
    if let Some(path) = &config.trace_file {
      observers.push(Box::new(JsonTrace::create(path)?));
    }

    Ok(Self {
      config,
      sequencer,
      registers,
      state,
      reference,
      cycle: 0,
      report: RunReport::default(),
      observers,
    })
  }

  /// Harness for a convolution layer with the built-in address program
  pub fn from_conv(params: &ConvParams, config: SimConfig) -> Result<Self> {
    params.validate()?;
    Self::new(
      config,
      params.loop_hierarchy()?,
      micro_program(),
      params.register_bank()?,
      params.reference()?,
    )
  }

  pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
    self.observers.push(observer);
  }

  pub fn config(&self) -> &SimConfig {
    &self.config
  }

  pub fn params(&self) -> &ConvParams {
    self.reference.params()
  }

  pub fn sequencer(&self) -> &Sequencer {
    &self.sequencer
  }

  pub fn registers(&self) -> &RegisterBank {
    &self.registers
  }

  pub fn state(&self) -> &EngineState {
    &self.state
  }

  pub fn cycle(&self) -> u64 {
    self.cycle
  }

  pub fn report(&self) -> &RunReport {
    &self.report
  }

  pub fn is_done(&self) -> bool {
    self.state.done
  }

  /// Simulate one cycle
  pub fn step(&mut self) -> Result<CycleEvent> {
    if self.state.done {
      let (signals, _) = self.sequencer.step(&self.state);
      return Ok(CycleEvent {
        cycle: self.cycle,
        idx: self.state.idx.clone(),
        signals,
        comparison: None,
      });
    }
    if self.cycle >= self.config.cycle_budget {
      return Err(UloopError::CycleBudgetExceeded {
        budget: self.config.cycle_budget,
      });
    }

    let candidate = execute(&self.state, self.sequencer.schedule(), &self.registers);
    let (signals, next) = self.sequencer.step(&self.state);
    let idx = std::mem::replace(&mut self.state, next).idx;
    let cycle = self.cycle;
    self.cycle += 1;
    self.report.cycles = self.cycle;

    if signals.commit {
      self.registers = candidate;
      self.report.committed_cycles += 1;
      let snapshot = Snapshot {
        cycle,
        idx: &idx,
        phase: self.state.phase,
        signals,
        registers: &self.registers,
      };
      trace!("cycle {} idx={:?} {:?} regs={:?}", cycle, idx, snapshot.phase, self.registers.values());
      for observer in self.observers.iter_mut() {
        observer.on_commit(&snapshot)?;
      }
    }

    let comparison = if signals.ready {
      Some(self.compare(cycle, &idx))
    } else {
      None
    };

    if signals.done {
      self.report.done = true;
      self.check_leftover(cycle, &idx);
    }

    Ok(CycleEvent {
      cycle,
      idx,
      signals,
      comparison,
    })
  }

  pub fn run(&mut self) -> Result<RunReport> {
    match self.config.step_mode {
      StepMode::Continuous => self.run_continuous()?,
      StepMode::Step => self.run_step_mode()?,
    }
    self.finish()?;
    Ok(self.report.clone())
  }

  /// Step until `done`, or until the first mismatch in fast mode
  fn run_continuous(&mut self) -> Result<()> {
    while !self.state.done && !self.should_stop() {
      self.step()?;
    }
    Ok(())
  }

  fn run_step_mode(&mut self) -> Result<()> {
    println!("Step mode - Enter steps one cycle, 'si N' N cycles, 'ni N' N iterations, 'r' registers, 'c' continue, 'q' quit");
    let mut shell = Shell::new()?;
    while !self.state.done && !self.should_stop() {
      match shell.read_command()? {
        Command::Step(n) => {
          for _ in 0..n {
            if self.state.done {
              break;
            }
            let event = self.step()?;
            print_event(&event);
          }
        },
        Command::Iter(n) => {
          let mut left = n;
          while left > 0 && !self.state.done && !self.should_stop() {
            let event = self.step()?;
            if event.signals.ready {
              print_event(&event);
              left -= 1;
            }
          }
        },
        Command::Continue => self.run_continuous()?,
        Command::Regs => println!("{:?}", self.registers.values()),
        Command::Quit => break,
      }
    }
    Ok(())
  }

  fn should_stop(&self) -> bool {
    self.config.run_mode == RunMode::Fast && self.report.mismatches > 0
  }

  /// Flush the observers
  pub fn finish(&mut self) -> Result<()> {
    for observer in self.observers.iter_mut() {
      observer.finish()?;
    }
    Ok(())
  }

  fn compare(&mut self, cycle: u64, idx: &[usize]) -> Comparison {
    self.report.ready_cycles += 1;
    let actual = self.registers.triple();
    let expected = self.reference.next();
    let comparison = Comparison { actual, expected };

    match expected {
      Some(e) if e.triple == actual => {
        if self.config.run_mode == RunMode::Diagnostic {
          info!("iter {:?} idx={:?}: {}", e.iteration, idx, actual);
        }
      },
      Some(_) => self.record(MismatchKind::Address, cycle, idx, Some(actual), expected, 1),
      None => self.record(MismatchKind::ReferenceExhausted, cycle, idx, Some(actual), None, 1),
    }
    comparison
  }

  fn check_leftover(&mut self, cycle: u64, idx: &[usize]) {
    if let Some(expected) = self.reference.next() {
      let leftover = 1 + self.reference.by_ref().count() as u64;
      self.record(MismatchKind::ReferenceLeftover, cycle, idx, None, Some(expected), leftover);
    }
  }

  fn record(
    &mut self,
    kind: MismatchKind,
    cycle: u64,
    idx: &[usize],
    actual: Option<AddressTriple>,
    expected: Option<Expected>,
    count: u64,
  ) {
    self.report.mismatches += count;
    if self.config.run_mode == RunMode::Diagnostic {
      error!("{:?} at cycle {} idx={:?}", kind, cycle, idx);
      if let Some(e) = &expected {
        error!("  high-level: {} iter {:?}", e.triple, e.iteration);
      }
      if let Some(a) = &actual {
        error!("  uloop:      {}", a);
      }
    }
    if self.report.first_mismatch.is_none() {
      self.report.first_mismatch = Some(Mismatch {
        kind,
        cycle,
        idx: idx.to_vec(),
        actual,
        expected,
      });
    }
  }
}

fn print_event(event: &CycleEvent) {
  match &event.comparison {
    Some(c) => println!(
      "[{}] idx={:?} {} {}",
      event.cycle,
      event.idx,
      c.actual,
      if c.matches() { "ok" } else { "MISMATCH" }
    ),
    None => println!("[{}] idx={:?}", event.cycle, event.idx),
  }
}
