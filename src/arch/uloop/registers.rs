use crate::error::ConfigError;
use serde::Serialize;
use std::ops::Index;

/// Weight offset register
pub const WEIGHT: usize = 0;
/// Input activation offset register
pub const INPUT: usize = 1;
/// Output activation offset register
pub const OUTPUT: usize = 2;

/// The three address streams produced by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddressTriple {
  pub weight: i64,
  pub input: i64,
  pub output: i64,
}

impl std::fmt::Display for AddressTriple {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "W={} x={} y={}", self.weight, self.input, self.output)
  }
}

/// Register file of the engine.
///
/// Registers `0..accumulators` are running accumulators written by micro-ops,
/// the remaining ones are operands loaded once and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterBank {
  values: Vec<i64>,
  accumulators: usize,
}

impl RegisterBank {
  pub fn new(accumulators: &[i64], operands: &[i64]) -> Self {
    let mut values = accumulators.to_vec();
    values.extend_from_slice(operands);
    Self {
      values,
      accumulators: accumulators.len(),
    }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn accumulators(&self) -> usize {
    self.accumulators
  }

  pub fn is_accumulator(&self, id: usize) -> bool {
    id < self.accumulators
  }

  pub fn get(&self, id: usize) -> Option<i64> {
    self.values.get(id).copied()
  }

  pub fn values(&self) -> &[i64] {
    &self.values
  }

  pub fn operands(&self) -> &[i64] {
    &self.values[self.accumulators..]
  }

  /// Overwrite an accumulator. Callers validate `id` up front.
  pub(crate) fn set(&mut self, id: usize, value: i64) {
    debug_assert!(self.is_accumulator(id), "r{} is an operand register", id);
    self.values[id] = value;
  }

  pub fn triple(&self) -> AddressTriple {
    AddressTriple {
      weight: self.values[WEIGHT],
      input: self.values[INPUT],
      output: self.values[OUTPUT],
    }
  }

  /// The bank must at least hold the address triple as accumulators
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.accumulators <= OUTPUT {
      return Err(ConfigError::MissingAddressRegisters {
        accumulators: self.accumulators,
        size: self.values.len(),
      });
    }
    Ok(())
  }
}

impl Index<usize> for RegisterBank {
  type Output = i64;

  fn index(&self, id: usize) -> &i64 {
    &self.values[id]
  }
}
