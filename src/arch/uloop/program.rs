use super::loops::LoopHierarchy;
use super::registers::RegisterBank;
use crate::error::ConfigError;
use serde::Serialize;
use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
  /// `target += operand`
  Add,
  /// `target -= operand`
  Sub,
  /// `target = operand`, reloads an accumulator from a recomputed base
  Move,
}

/// When a micro-op fires relative to its loop level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliesOn {
  /// The level itself advances (the carry stops at it)
  EveryStep,
  /// The level resets to 0 because the carry passes through it
  LevelWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MicroOp {
  pub kind: OpKind,
  pub target: usize,
  /// Stride register for add/sub, base register for move
  pub operand: usize,
  pub level: usize,
  pub applies_on: AppliesOn,
}

impl MicroOp {
  pub fn add(target: usize, operand: usize, level: usize, applies_on: AppliesOn) -> Self {
    Self { kind: OpKind::Add, target, operand, level, applies_on }
  }

  pub fn sub(target: usize, operand: usize, level: usize, applies_on: AppliesOn) -> Self {
    Self { kind: OpKind::Sub, target, operand, level, applies_on }
  }

  pub fn mv(target: usize, operand: usize, level: usize, applies_on: AppliesOn) -> Self {
    Self { kind: OpKind::Move, target, operand, level, applies_on }
  }

  /// Does this op fire on a transition whose carry stopped at `stepped`?
  pub fn fires_on(&self, stepped: usize) -> bool {
    match self.applies_on {
      AppliesOn::EveryStep => self.level == stepped,
      AppliesOn::LevelWrap => self.level < stepped,
    }
  }

  /// Value written to the target, reading only `registers`
  pub fn apply(&self, registers: &RegisterBank) -> i64 {
    let operand = registers[self.operand];
    match self.kind {
      OpKind::Add => registers[self.target].wrapping_add(operand),
      OpKind::Sub => registers[self.target].wrapping_sub(operand),
      OpKind::Move => operand,
    }
  }
}

impl fmt::Display for MicroOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let trigger = match self.applies_on {
      AppliesOn::EveryStep => "step",
      AppliesOn::LevelWrap => "wrap",
    };
    match self.kind {
      OpKind::Add => write!(f, "r{} += r{}", self.target, self.operand)?,
      OpKind::Sub => write!(f, "r{} -= r{}", self.target, self.operand)?,
      OpKind::Move => write!(f, "r{} = r{}", self.target, self.operand)?,
    }
    write!(f, " @L{} {}", self.level, trigger)
  }
}

/// Ordered list of micro-ops, as delivered by the program loader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MicroProgram {
  ops: Vec<MicroOp>,
}

impl MicroProgram {
  pub fn new(ops: Vec<MicroOp>) -> Self {
    Self { ops }
  }

  pub fn ops(&self) -> &[MicroOp] {
    &self.ops
  }

  pub fn len(&self) -> usize {
    self.ops.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }

  /// Check every op against the hierarchy depth and the register bank layout
  pub fn validate(&self, loops: &LoopHierarchy, registers: &RegisterBank) -> Result<(), ConfigError> {
    let size = registers.len();
    for (op_id, op) in self.ops.iter().enumerate() {
      for register in [op.target, op.operand] {
        if register >= size {
          return Err(ConfigError::UndefinedRegister { op: op_id, register, size });
        }
      }
      if !registers.is_accumulator(op.target) {
        return Err(ConfigError::OperandWrite {
          op: op_id,
          register: op.target,
          accumulators: registers.accumulators(),
        });
      }
      if op.level >= loops.nb_loops() {
        return Err(ConfigError::UndefinedLoopLevel {
          op: op_id,
          level: op.level,
          nb_loops: loops.nb_loops(),
        });
      }
    }
    Ok(())
  }
}

/// Validated program with its per-transition issue lists.
///
/// `by_level[H]` holds, in program order, the ops fired by a transition whose
/// carry stopped at level H.
#[derive(Debug, Clone)]
pub struct Schedule {
  program: MicroProgram,
  by_level: Vec<Vec<usize>>,
  issue_width: usize,
}

impl Schedule {
  pub fn new(
    program: MicroProgram,
    loops: &LoopHierarchy,
    registers: &RegisterBank,
    issue_width: usize,
  ) -> Result<Self, ConfigError> {
    if issue_width == 0 {
      return Err(ConfigError::ZeroIssueWidth);
    }
    registers.validate()?;
    program.validate(loops, registers)?;

    let by_level: Vec<Vec<usize>> = (0..loops.nb_loops())
      .map(|stepped| {
        program
          .ops()
          .iter()
          .enumerate()
          .filter(|(_, op)| op.fires_on(stepped))
          .map(|(op_id, _)| op_id)
          .collect::<Vec<_>>()
      })
      .collect();

    Ok(Self {
      program,
      by_level,
      issue_width,
    })
  }

  pub fn program(&self) -> &MicroProgram {
    &self.program
  }

  pub fn issue_width(&self) -> usize {
    self.issue_width
  }

  /// Op ids issued at a position entered through `carry`; empty for the first position
  pub fn scheduled(&self, carry: Option<usize>) -> &[usize] {
    match carry {
      Some(level) => &self.by_level[level],
      None => &[],
    }
  }

  /// Slice of `scheduled(carry)` issued in the cycle starting at `cursor`.
  ///
  /// Grows in program order up to the issue width and stops before an op that
  /// writes or reads a register already written in the bundle.
  pub fn bundle(&self, carry: Option<usize>, cursor: usize) -> Range<usize> {
    let scheduled = self.scheduled(carry);
    let start = cursor.min(scheduled.len());
    let mut written: Vec<usize> = Vec::with_capacity(self.issue_width);
    let mut end = start;
    while end < scheduled.len() && end - start < self.issue_width {
      let op = &self.program.ops()[scheduled[end]];
      if written.contains(&op.target) || written.contains(&op.operand) {
        break;
      }
      written.push(op.target);
      end += 1;
    }
    start..end
  }

  /// Ops of the bundle issued at `cursor`
  pub fn bundle_ops(&self, carry: Option<usize>, cursor: usize) -> impl Iterator<Item = &MicroOp> + '_ {
    let scheduled = self.scheduled(carry);
    self.bundle(carry, cursor).map(move |slot| &self.program.ops()[scheduled[slot]])
  }
}
