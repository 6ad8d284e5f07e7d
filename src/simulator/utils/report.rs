use crate::arch::uloop::ConvParams;
use crate::simulator::simulator::{Mismatch, RunReport};
use crate::simulator::sweep::SweepReport;

pub fn print_run_report(params: &ConvParams, report: &RunReport) {
  println!("\n--- uloop check: {} ---", params);
  println!("  cycles:          {}", report.cycles);
  println!("  committed:       {}", report.committed_cycles);
  println!("  ready:           {} / {}", report.ready_cycles, params.total_iterations());
  println!(
    "  mismatches:      {}{}",
    report.mismatches,
    if report.mismatches > 0 { " !!!" } else { "" }
  );
  if !report.done {
    println!("  run stopped before the loop nest terminated");
  }
  if let Some(mismatch) = &report.first_mismatch {
    print_mismatch(mismatch);
  }
  println!("--- End Report ---\n");
}

pub fn print_mismatch(mismatch: &Mismatch) {
  println!("  first mismatch ({:?}) at cycle {}, idx {:?}", mismatch.kind, mismatch.cycle, mismatch.idx);
  match &mismatch.expected {
    Some(e) => println!("    High-level: {}  iter {:?}", e.triple, e.iteration),
    None => println!("    High-level: <exhausted>"),
  }
  match &mismatch.actual {
    Some(a) => println!("    uLoop:      {}", a),
    None => println!("    uLoop:      <done>"),
  }
}

pub fn print_sweep_report(report: &SweepReport) {
  println!("\n--- uloop sweep ---");
  println!("  configurations: {}", report.total);
  println!("  passed:         {}", report.passed);
  match &report.first_failure {
    Some((params, failure)) => println!("  first failure:  {} ({})", params, failure),
    None => println!("  all configurations match the reference"),
  }
  println!("--- End Report ---\n");
}
