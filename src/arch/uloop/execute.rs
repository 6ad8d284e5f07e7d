use super::program::Schedule;
use super::registers::RegisterBank;
use super::sequencer::EngineState;

/// Candidate register bank for the cycle described by `state`.
///
/// Every op of the issued bundle reads the bank as it was at the start of the
/// cycle. Nothing is committed here; the sequencer's `commit` decides whether the
/// candidate replaces `registers`.
pub fn execute(state: &EngineState, schedule: &Schedule, registers: &RegisterBank) -> RegisterBank {
  let mut candidate = registers.clone();
  if state.done {
    return candidate;
  }
  for op in schedule.bundle_ops(state.carry, state.cursor) {
    candidate.set(op.target, op.apply(registers));
  }
  candidate
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arch::uloop::loops::LoopHierarchy;
  use crate::arch::uloop::program::AppliesOn::*;
  use crate::arch::uloop::program::{MicroOp, MicroProgram};
  use crate::arch::uloop::sequencer::Phase;

  fn state(carry: Option<usize>, cursor: usize) -> EngineState {
    EngineState {
      idx: vec![1, 0],
      phase: Phase::IterationBoundary,
      cursor,
      carry,
      done: false,
    }
  }

  fn setup(width: usize) -> (Schedule, RegisterBank) {
    let loops = LoopHierarchy::new(&[2, 2]).unwrap();
    let registers = RegisterBank::new(&[5, 7, 0, 100], &[3, 40]);
    let program = MicroProgram::new(vec![
      MicroOp::add(3, 5, 1, EveryStep),
      MicroOp::mv(0, 3, 0, LevelWrap),
      MicroOp::add(0, 4, 0, EveryStep),
      MicroOp::sub(1, 4, 0, EveryStep),
    ]);
    let schedule = Schedule::new(program, &loops, &registers, width).unwrap();
    (schedule, registers)
  }

  #[test]
  fn test_applies_issued_bundle_only() {
    let (schedule, registers) = setup(2);
    let candidate = execute(&state(Some(0), 0), &schedule, &registers);
    assert_eq!(candidate.values(), &[8, 4, 0, 100, 3, 40]);
    // input bank untouched
    assert_eq!(registers.values(), &[5, 7, 0, 100, 3, 40]);
  }

  #[test]
  fn test_ops_read_pre_cycle_values() {
    let (schedule, registers) = setup(1);
    // outer step schedules r3 += r5 then r0 = r3, one per cycle
    let first = execute(&state(Some(1), 0), &schedule, &registers);
    assert_eq!(first[3], 140);
    assert_eq!(first[0], 5);
    let second = execute(&state(Some(1), 1), &schedule, &first);
    assert_eq!(second[0], 140);
  }

  #[test]
  fn test_deterministic() {
    let (schedule, registers) = setup(2);
    let s = state(Some(0), 0);
    assert_eq!(execute(&s, &schedule, &registers), execute(&s, &schedule, &registers));
  }

  #[test]
  fn test_first_position_and_done_are_no_ops() {
    let (schedule, registers) = setup(2);
    assert_eq!(execute(&state(None, 0), &schedule, &registers), registers);
    let mut finished = state(Some(0), 0);
    finished.done = true;
    assert_eq!(execute(&finished, &schedule, &registers), registers);
  }
}
