use super::conv::{ConvParams, NB_LOOPS};
use super::registers::AddressTriple;
use serde::Serialize;

/// One iteration of the high-level convolution loop nest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Expected {
  pub triple: AddressTriple,
  /// `(i, j, k_out_major, u_i, u_j, k_in_major)`, outermost first
  pub iteration: [usize; NB_LOOPS],
}

/// Closed-form address generator used as the oracle for the engine.
///
/// Finite: yields exactly `ConvParams::total_iterations` entries, then `None`
/// forever. `reset` restarts it.
#[derive(Debug, Clone)]
pub struct ConvReference {
  params: ConvParams,
  bounds: [usize; NB_LOOPS],
  cursor: [usize; NB_LOOPS],
  exhausted: bool,
}

impl ConvReference {
  pub(crate) fn new(params: ConvParams) -> Self {
    let bounds = [
      params.oh,
      params.ow,
      params.nof / params.tp,
      params.fs,
      params.fs,
      params.nif / params.tp,
    ];
    Self {
      params,
      bounds,
      cursor: [0; NB_LOOPS],
      exhausted: bounds.contains(&0),
    }
  }

  pub fn params(&self) -> &ConvParams {
    &self.params
  }

  pub fn reset(&mut self) {
    *self = Self::new(self.params);
  }

  pub fn is_exhausted(&self) -> bool {
    self.exhausted
  }

  /// Addresses of one iteration, straight from the layout formulas
  pub fn addresses(params: &ConvParams, iteration: [usize; NB_LOOPS]) -> AddressTriple {
    let [i, j, k_out_major, u_i, u_j, k_in_major] = iteration.map(|v| v as i64);
    let tp = params.tp as i64;
    let fs = params.fs as i64;
    let ow = params.ow as i64;
    let nif = params.nif as i64;
    let nof = params.nof as i64;

    let k_out = k_out_major * tp;
    let k_in = k_in_major * tp;
    AddressTriple {
      weight: (k_out / tp) * nif * fs * fs + u_i * nif * fs + u_j * nif + k_in,
      input: (i + u_i) * nif * (ow + fs - 1) + (j + u_j) * nif + k_in,
      output: i * nof * ow + j * nof + k_out,
    }
  }
}

impl Iterator for ConvReference {
  type Item = Expected;

  fn next(&mut self) -> Option<Expected> {
    if self.exhausted {
      return None;
    }
    let iteration = self.cursor;
    let item = Expected {
      triple: Self::addresses(&self.params, iteration),
      iteration,
    };

    // innermost loop is the last tuple entry
    let mut level = NB_LOOPS;
    loop {
      if level == 0 {
        self.exhausted = true;
        break;
      }
      level -= 1;
      self.cursor[level] += 1;
      if self.cursor[level] < self.bounds[level] {
        break;
      }
      self.cursor[level] = 0;
    }
    Some(item)
  }
}
