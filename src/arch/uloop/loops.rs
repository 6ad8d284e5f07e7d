use crate::error::ConfigError;
use serde::Serialize;
use std::ops::Range;

/// One level of the loop nest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopLevel {
  pub trip_count: usize,
}

/// Result of one odometer step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
  /// Counters after the step (all zero once done)
  pub idx: Vec<usize>,
  /// Levels that reset to 0 during the step, always `0..H`
  pub wrapped: Range<usize>,
  /// The carry left the outermost level
  pub done: bool,
}

impl Advance {
  /// Level that advanced without wrapping, `None` when the nest is exhausted
  pub fn stepped_level(&self) -> Option<usize> {
    if self.done {
      None
    } else {
      Some(self.wrapped.end)
    }
  }
}

/// Nested loop description, index 0 is the innermost level.
///
/// Acts as a mixed-radix odometer: each level is a digit with its own radix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopHierarchy {
  levels: Vec<LoopLevel>,
}

impl LoopHierarchy {
  pub fn new(trip_counts: &[usize]) -> Result<Self, ConfigError> {
    if trip_counts.is_empty() {
      return Err(ConfigError::EmptyHierarchy);
    }
    if let Some((level, &trip_count)) = trip_counts.iter().enumerate().find(|&(_, &t)| t < 1) {
      return Err(ConfigError::InvalidTripCount { level, trip_count });
    }
    Ok(Self {
      levels: trip_counts.iter().map(|&trip_count| LoopLevel { trip_count }).collect(),
    })
  }

  pub fn nb_loops(&self) -> usize {
    self.levels.len()
  }

  pub fn levels(&self) -> &[LoopLevel] {
    &self.levels
  }

  pub fn trip_count(&self, level: usize) -> usize {
    self.levels[level].trip_count
  }

  /// Number of positions in the whole nest
  pub fn total_iterations(&self) -> u64 {
    self.levels.iter().map(|l| l.trip_count as u64).product()
  }

  /// Counters of the first position
  pub fn reset_idx(&self) -> Vec<usize> {
    vec![0; self.levels.len()]
  }

  /// Step the odometer once from `idx`.
  ///
  /// A level with trip count 1 wraps every time the carry reaches it, so the carry
  /// keeps propagating through it.
  pub fn advance(&self, idx: &[usize]) -> Advance {
    debug_assert_eq!(idx.len(), self.levels.len());
    let mut next = idx.to_vec();
    let mut level = 0;
    loop {
      if level == self.levels.len() {
        return Advance {
          idx: self.reset_idx(),
          wrapped: 0..level,
          done: true,
        };
      }
      next[level] += 1;
      if next[level] < self.levels[level].trip_count {
        return Advance {
          idx: next,
          wrapped: 0..level,
          done: false,
        };
      }
      next[level] = 0;
      level += 1;
    }
  }
}
