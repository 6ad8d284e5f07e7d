//! Tiled 2D convolution workload.
//!
//! Builds the loop nest, the initial register bank and the micro-program that
//! walks the weight, input and output tensors of a convolution tiled by `TP`
//! channels. Layouts: weights CoHWCi, activations HWC with the input padded to
//! `ow + fs - 1` columns.

use super::loops::LoopHierarchy;
use super::program::AppliesOn::{EveryStep, LevelWrap};
use super::program::{MicroOp, MicroProgram};
use super::reference::ConvReference;
use super::registers::{RegisterBank, INPUT, OUTPUT, WEIGHT};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Loop levels, innermost first
pub const LOOP_K_IN: usize = 0;
pub const LOOP_FILTER_J: usize = 1;
pub const LOOP_FILTER_I: usize = 2;
pub const LOOP_K_OUT: usize = 3;
pub const LOOP_J: usize = 4;
pub const LOOP_I: usize = 5;
pub const NB_LOOPS: usize = 6;

/// Input address at the start of the current filter row
pub const INPUT_ROW_BASE: usize = 3;
/// Input address of the current output pixel's window origin
pub const INPUT_PIXEL_BASE: usize = 4;
/// Input address of the current output row's window origin
pub const INPUT_LINE_BASE: usize = 5;
pub const NB_ACCUMULATORS: usize = 6;

/// Operand registers
pub const REG_TP: usize = 6;
pub const REG_NIF: usize = 7;
pub const REG_ROW_PITCH: usize = 8;
pub const REG_ZERO: usize = 9;

/// Problem size of one convolution layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvParams {
  /// Tile factor: channels processed together
  pub tp: usize,
  /// Filter size (square)
  pub fs: usize,
  /// Output height
  pub oh: usize,
  /// Output width
  pub ow: usize,
  /// Input channels
  pub nif: usize,
  /// Output channels
  pub nof: usize,
}

impl Default for ConvParams {
  fn default() -> Self {
    Self {
      tp: 128,
      fs: 3,
      oh: 3,
      ow: 3,
      nif: 384,
      nof: 384,
    }
  }
}

impl fmt::Display for ConvParams {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "TP={}, oh={}, ow={}, nof={}, nif={}, fs={}",
      self.tp, self.oh, self.ow, self.nof, self.nif, self.fs
    )
  }
}

impl ConvParams {
  pub fn validate(&self) -> Result<(), ConfigError> {
    for (name, value) in [
      ("TP", self.tp),
      ("fs", self.fs),
      ("oh", self.oh),
      ("ow", self.ow),
      ("nif", self.nif),
      ("nof", self.nof),
    ] {
      if value == 0 {
        return Err(ConfigError::NonPositiveParameter { name, value });
      }
    }
    for (name, value) in [("nif", self.nif), ("nof", self.nof)] {
      if value % self.tp != 0 {
        return Err(ConfigError::NotTileMultiple { name, value, tp: self.tp });
      }
    }
    self.check_extents()
  }

  /// Every address and the iteration count must fit an `i64`
  fn check_extents(&self) -> Result<(), ConfigError> {
    let too_large = |quantity| ConfigError::ProblemTooLarge {
      quantity,
      params: self.to_string(),
    };
    let product = |values: &[usize]| {
      values
        .iter()
        .try_fold(1u64, |acc, &v| acc.checked_mul(v as u64))
        .filter(|&p| p <= i64::MAX as u64)
    };

    let padded_w = self.ow.checked_add(self.fs - 1).ok_or_else(|| too_large("padded input width"))?;
    let padded_h = self.oh.checked_add(self.fs - 1).ok_or_else(|| too_large("padded input height"))?;
    product(&[self.nif, padded_w, padded_h]).ok_or_else(|| too_large("input tensor size"))?;
    product(&[self.nof, self.ow, self.oh]).ok_or_else(|| too_large("output tensor size"))?;
    product(&[self.nof, self.fs, self.fs, self.nif]).ok_or_else(|| too_large("weight tensor size"))?;
    product(&self.trip_counts()).ok_or_else(|| too_large("iteration count"))?;
    Ok(())
  }

  /// Trip counts, innermost first: input tiles, filter columns, filter rows,
  /// output tiles, output columns, output rows
  pub fn trip_counts(&self) -> [usize; NB_LOOPS] {
    [self.nif / self.tp, self.fs, self.fs, self.nof / self.tp, self.ow, self.oh]
  }

  pub fn loop_hierarchy(&self) -> Result<LoopHierarchy, ConfigError> {
    self.validate()?;
    LoopHierarchy::new(&self.trip_counts())
  }

  pub fn total_iterations(&self) -> u64 {
    self.trip_counts().iter().map(|&t| t as u64).product()
  }

  /// Distance between two rows of the padded input
  pub fn input_row_pitch(&self) -> i64 {
    (self.nif * (self.ow + self.fs - 1)) as i64
  }

  /// All accumulators start at the address of the first iteration (0)
  pub fn register_bank(&self) -> Result<RegisterBank, ConfigError> {
    self.validate()?;
    Ok(RegisterBank::new(
      &[0; NB_ACCUMULATORS],
      &[self.tp as i64, self.nif as i64, self.input_row_pitch(), 0],
    ))
  }

  /// Reference enumerator matching this problem size
  pub fn reference(&self) -> Result<ConvReference, ConfigError> {
    self.validate()?;
    Ok(ConvReference::new(*self))
  }
}

/// Micro-program generating the three address streams.
///
/// Weights and outputs are dense in iteration order, so they only ever advance by
/// `TP`; the weight stream restarts when the output tile loop wraps. The input
/// window keeps a base register per window level and reloads the address from it.
pub fn micro_program() -> MicroProgram {
  MicroProgram::new(vec![
    // next output row: move the line base one input row down
    MicroOp::add(INPUT_LINE_BASE, REG_ROW_PITCH, LOOP_I, EveryStep),
    MicroOp::mv(INPUT_PIXEL_BASE, INPUT_LINE_BASE, LOOP_J, LevelWrap),
    // next output column
    MicroOp::add(INPUT_PIXEL_BASE, REG_NIF, LOOP_J, EveryStep),
    // window restarts at the pixel origin
    MicroOp::mv(INPUT_ROW_BASE, INPUT_PIXEL_BASE, LOOP_FILTER_I, LevelWrap),
    MicroOp::mv(INPUT, INPUT_PIXEL_BASE, LOOP_FILTER_I, LevelWrap),
    // next filter row
    MicroOp::add(INPUT_ROW_BASE, REG_ROW_PITCH, LOOP_FILTER_I, EveryStep),
    MicroOp::mv(INPUT, INPUT_ROW_BASE, LOOP_FILTER_I, EveryStep),
    // next filter column continues right after the last input tile
    MicroOp::add(INPUT, REG_TP, LOOP_FILTER_J, EveryStep),
    MicroOp::add(INPUT, REG_TP, LOOP_K_IN, EveryStep),
    MicroOp::add(WEIGHT, REG_TP, LOOP_K_IN, EveryStep),
    MicroOp::add(WEIGHT, REG_TP, LOOP_FILTER_J, EveryStep),
    MicroOp::add(WEIGHT, REG_TP, LOOP_FILTER_I, EveryStep),
    MicroOp::add(WEIGHT, REG_TP, LOOP_K_OUT, EveryStep),
    MicroOp::mv(WEIGHT, REG_ZERO, LOOP_K_OUT, LevelWrap),
    MicroOp::add(OUTPUT, REG_TP, LOOP_K_OUT, EveryStep),
    MicroOp::add(OUTPUT, REG_TP, LOOP_J, EveryStep),
    MicroOp::add(OUTPUT, REG_TP, LOOP_I, EveryStep),
  ])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::uloop::program::Schedule;

  #[test]
  fn test_validate() {
    let ok = ConvParams { tp: 128, fs: 3, oh: 1, ow: 1, nif: 256, nof: 256 };
    assert!(ok.validate().is_ok());

    let zero_fs = ConvParams { fs: 0, ..ok };
    assert_eq!(
      zero_fs.validate(),
      Err(ConfigError::NonPositiveParameter { name: "fs", value: 0 })
    );

    let ragged = ConvParams { nof: 200, ..ok };
    assert_eq!(
      ragged.validate(),
      Err(ConfigError::NotTileMultiple { name: "nof", value: 200, tp: 128 })
    );
    assert!(ragged.loop_hierarchy().is_err());
    assert!(ragged.register_bank().is_err());
  }

  #[test]
  fn test_oversized_problem_rejected() {
    let huge = ConvParams { tp: 1 << 40, fs: 1, oh: 1, ow: 1 << 30, nif: 1 << 40, nof: 1 << 40 };
    match huge.validate() {
      Err(ConfigError::ProblemTooLarge { quantity, .. }) => assert_eq!(quantity, "input tensor size"),
      other => panic!("unexpected {:?}", other),
    }
    assert!(huge.register_bank().is_err());
    assert!(huge.reference().is_err());

    let wide_filter = ConvParams { tp: 1, fs: usize::MAX, oh: 2, ow: 2, nif: 1, nof: 1 };
    assert!(matches!(
      wide_filter.validate(),
      Err(ConfigError::ProblemTooLarge { quantity: "padded input width", .. })
    ));

    // largest weight tensor that still fits
    let edge = ConvParams { tp: 1 << 31, fs: 1, oh: 1, ow: 1, nif: 1 << 31, nof: 1 << 31 };
    assert!(edge.validate().is_ok());
    let over = ConvParams { nif: 1 << 32, nof: 1 << 32, ..edge };
    assert!(matches!(
      over.validate(),
      Err(ConfigError::ProblemTooLarge { quantity: "weight tensor size", .. })
    ));
  }

  #[test]
  fn test_trip_counts() {
    let p = ConvParams { tp: 128, fs: 3, oh: 2, ow: 5, nif: 384, nof: 256 };
    assert_eq!(p.trip_counts(), [3, 3, 3, 2, 5, 2]);
    assert_eq!(p.total_iterations(), 3 * 3 * 3 * 2 * 5 * 2);
    assert_eq!(p.input_row_pitch(), 384 * 7);
  }

  #[test]
  fn test_program_fits_bank_and_loops() {
    let p = ConvParams::default();
    let loops = p.loop_hierarchy().unwrap();
    let registers = p.register_bank().unwrap();
    assert_eq!(registers.len(), 10);
    assert_eq!(registers.accumulators(), NB_ACCUMULATORS);
    assert_eq!(registers[REG_ROW_PITCH], 384 * 5);
    let schedule = Schedule::new(micro_program(), &loops, &registers, 1).unwrap();
    // innermost step touches only the weight and input streams
    assert_eq!(schedule.scheduled(Some(LOOP_K_IN)).len(), 2);
    // new output row: line base, pixel base, row base, input, weight, output
    assert_eq!(schedule.scheduled(Some(LOOP_I)).len(), 6);
  }
}
