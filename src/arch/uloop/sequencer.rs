use super::loops::LoopHierarchy;
use super::program::Schedule;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  /// Nothing issued yet for the first position
  Pending,
  /// Part of the current position's micro-ops has been issued
  MidProgram,
  /// The previous position completed, nothing issued yet for the current one
  IterationBoundary,
}

/// Engine state, mutated only through [`Sequencer::step`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineState {
  /// Odometer counters, index 0 innermost
  pub idx: Vec<usize>,
  pub phase: Phase,
  /// Next slot of the current position's schedule
  pub cursor: usize,
  /// Level that advanced on the way into this position, `None` at the first one
  pub carry: Option<usize>,
  pub done: bool,
}

impl EngineState {
  pub fn new(loops: &LoopHierarchy) -> Self {
    Self {
      idx: loops.reset_idx(),
      phase: Phase::Pending,
      cursor: 0,
      carry: None,
      done: false,
    }
  }

  /// Position not completed yet: nothing or only part of its schedule issued
  pub fn is_busy(&self) -> bool {
    self.phase != Phase::IterationBoundary
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControlSignals {
  /// The candidate registers of this cycle must be committed
  pub commit: bool,
  /// The committed registers hold a complete address triple
  pub ready: bool,
  /// The last position of the loop nest was just completed
  pub done: bool,
}

impl ControlSignals {
  pub fn busy(&self) -> bool {
    !self.ready && !self.done
  }
}

/// Cycle-level control of the engine: owns the odometer rules and the issue schedule
#[derive(Debug, Clone)]
pub struct Sequencer {
  loops: LoopHierarchy,
  schedule: Schedule,
}

impl Sequencer {
  pub fn new(loops: LoopHierarchy, schedule: Schedule) -> Self {
    Self { loops, schedule }
  }

  pub fn loops(&self) -> &LoopHierarchy {
    &self.loops
  }

  pub fn schedule(&self) -> &Schedule {
    &self.schedule
  }

  pub fn initial_state(&self) -> EngineState {
    EngineState::new(&self.loops)
  }

  /// One cycle: issue the next bundle of the current position, and once the
  /// position's schedule is exhausted raise `ready` and move the odometer.
  pub fn step(&self, state: &EngineState) -> (ControlSignals, EngineState) {
    if state.done {
      let signals = ControlSignals {
        commit: false,
        ready: false,
        done: true,
      };
      return (signals, state.clone());
    }

    let scheduled = self.schedule.scheduled(state.carry).len();
    let bundle = self.schedule.bundle(state.carry, state.cursor);
    let commit = !bundle.is_empty();

    if bundle.end < scheduled {
      let next = EngineState {
        idx: state.idx.clone(),
        phase: Phase::MidProgram,
        cursor: bundle.end,
        carry: state.carry,
        done: false,
      };
      let signals = ControlSignals {
        commit,
        ready: false,
        done: false,
      };
      return (signals, next);
    }

    let advance = self.loops.advance(&state.idx);
    let next = EngineState {
      carry: advance.stepped_level(),
      idx: advance.idx,
      phase: Phase::IterationBoundary,
      cursor: 0,
      done: advance.done,
    };
    let signals = ControlSignals {
      commit,
      ready: true,
      done: advance.done,
    };
    (signals, next)
  }
}
