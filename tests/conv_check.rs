use std::cell::RefCell;
use std::rc::Rc;
use uloop::arch::uloop::{micro_program, AddressTriple, AppliesOn, ConvParams, MicroOp, MicroProgram};
use uloop::simulator::sim::trace::{Observer, Snapshot};
use uloop::simulator::simulator::CycleEvent;
use uloop::simulator::utils::log::init_log;
use uloop::{ConfigError, SimConfig, Simulator, UloopError};

fn conv(tp: usize, fs: usize, oh: usize, ow: usize, nif: usize, nof: usize) -> ConvParams {
  ConvParams { tp, fs, oh, ow, nif, nof }
}

fn with_width(issue_width: usize) -> SimConfig {
  SimConfig {
    issue_width,
    ..SimConfig::default()
  }
}

/// Every cycle event of a run to completion
fn events(params: &ConvParams, config: SimConfig) -> Vec<CycleEvent> {
  let mut sim = Simulator::from_conv(params, config).unwrap();
  let mut events = Vec::new();
  while !sim.is_done() {
    events.push(sim.step().unwrap());
  }
  events
}

fn ready_triples(params: &ConvParams, config: SimConfig) -> Vec<AddressTriple> {
  events(params, config)
    .into_iter()
    .filter_map(|e| e.comparison.map(|c| c.actual))
    .collect()
}

#[test]
fn scenario_a_small_filter_two_tiles() {
  init_log();
  let params = conv(128, 3, 1, 1, 256, 256);
  let mut sim = Simulator::from_conv(&params, SimConfig::diagnostic()).unwrap();
  let report = sim.run().unwrap();
  assert!(report.passed());
  assert_eq!(report.ready_cycles, 36);
  assert_eq!(report.mismatches, 0);
}

#[test]
fn scenario_b_pointwise() {
  let params = conv(128, 1, 2, 2, 128, 128);
  let triples = ready_triples(&params, SimConfig::default());
  assert_eq!(triples.len(), 4);
  assert!(triples.iter().all(|t| t.weight == 0));
  let inputs: Vec<i64> = triples.iter().map(|t| t.input).collect();
  assert_eq!(inputs, vec![0, 128, 256, 384]);
  let outputs: Vec<i64> = triples.iter().map(|t| t.output).collect();
  assert_eq!(outputs, vec![0, 128, 256, 384]);
}

#[test]
fn scenario_c_register_outside_bank() {
  let params = conv(128, 3, 1, 1, 256, 256);
  let mut ops = micro_program().ops().to_vec();
  ops.push(MicroOp::add(0, 10, 0, AppliesOn::EveryStep));
  let result = Simulator::new(
    SimConfig::default(),
    params.loop_hierarchy().unwrap(),
    MicroProgram::new(ops),
    params.register_bank().unwrap(),
    params.reference().unwrap(),
  );
  match result {
    Err(UloopError::Configuration(ConfigError::UndefinedRegister { register, size, .. })) => {
      assert_eq!(register, 10);
      assert_eq!(size, 10);
    },
    Err(other) => panic!("unexpected error: {}", other),
    Ok(_) => panic!("program with an undefined register was accepted"),
  }
}

#[test]
fn pointwise_row() {
  let params = conv(128, 1, 1, 4, 128, 128);
  let report = Simulator::from_conv(&params, SimConfig::default()).unwrap().run().unwrap();
  assert!(report.passed());
  assert_eq!(report.ready_cycles, 4);
}

#[test]
fn invalid_tiling_is_rejected() {
  let params = conv(128, 3, 1, 1, 200, 256);
  match Simulator::from_conv(&params, SimConfig::default()) {
    Err(UloopError::Configuration(ConfigError::NotTileMultiple { name, .. })) => assert_eq!(name, "nif"),
    Err(other) => panic!("unexpected error: {}", other),
    Ok(_) => panic!("ragged tiling was accepted"),
  }
}

#[test]
fn oversized_problem_is_rejected() {
  let params = conv(1 << 40, 1, 1, 1 << 30, 1 << 40, 1 << 40);
  match Simulator::from_conv(&params, SimConfig::default()) {
    Err(UloopError::Configuration(ConfigError::ProblemTooLarge { .. })) => {},
    Err(other) => panic!("unexpected error: {}", other),
    Ok(_) => panic!("overflowing problem size was accepted"),
  }
}

#[test]
fn single_tile_channels() {
  // TP = nif = nof collapses both channel loops to one trip
  let params = conv(256, 3, 2, 2, 256, 256);
  let report = Simulator::from_conv(&params, SimConfig::default()).unwrap().run().unwrap();
  assert!(report.passed());
  assert_eq!(report.ready_cycles, 3 * 3 * 2 * 2);
}

#[test]
fn ready_cadence_follows_trip_counts() {
  let params = conv(128, 2, 2, 3, 384, 256);
  let serial = Simulator::from_conv(&params, with_width(1)).unwrap().run().unwrap();
  assert_eq!(serial.ready_cycles, params.total_iterations());

  for width in [2, 4, 8] {
    let wide = Simulator::from_conv(&params, with_width(width)).unwrap().run().unwrap();
    assert!(wide.passed());
    assert_eq!(wide.ready_cycles, params.total_iterations());
    assert!(wide.cycles <= serial.cycles, "width {} took {} cycles", width, wide.cycles);
  }
}

#[test]
fn issue_width_does_not_change_addresses() {
  let params = conv(64, 3, 2, 2, 128, 192);
  let serial = ready_triples(&params, with_width(1));
  assert_eq!(serial, ready_triples(&params, with_width(2)));
  assert_eq!(serial, ready_triples(&params, with_width(4)));
}

#[test]
fn runs_are_deterministic() {
  let params = conv(128, 2, 3, 2, 256, 128);
  assert_eq!(events(&params, SimConfig::default()), events(&params, SimConfig::default()));
}

#[test]
fn stream_matches_closed_form() {
  let params = conv(128, 2, 2, 2, 256, 256);
  let expected: Vec<AddressTriple> = params.reference().unwrap().map(|e| e.triple).collect();
  assert_eq!(ready_triples(&params, SimConfig::default()), expected);
}

/// Counts committed cycles and remembers the triple of every ready commit
#[derive(Default)]
struct Recorder {
  commits: u64,
  ready: Vec<AddressTriple>,
}

struct SharedRecorder(Rc<RefCell<Recorder>>);

impl Observer for SharedRecorder {
  fn on_commit(&mut self, snapshot: &Snapshot<'_>) -> std::io::Result<()> {
    let mut recorder = self.0.borrow_mut();
    recorder.commits += 1;
    if snapshot.signals.ready {
      recorder.ready.push(snapshot.registers.triple());
    }
    Ok(())
  }
}

#[test]
fn observers_see_every_commit() {
  let params = conv(128, 3, 1, 2, 256, 128);
  let recorder = Rc::new(RefCell::new(Recorder::default()));
  let mut sim = Simulator::from_conv(&params, SimConfig::default()).unwrap();
  sim.add_observer(Box::new(SharedRecorder(recorder.clone())));
  let report = sim.run().unwrap();
  assert!(report.passed());

  let recorder = recorder.borrow();
  assert_eq!(recorder.commits, report.committed_cycles);
  // the first position issues nothing, so its ready cycle commits nothing
  assert_eq!(recorder.ready.len() as u64, report.ready_cycles - 1);
  let expected: Vec<AddressTriple> = params.reference().unwrap().skip(1).map(|e| e.triple).collect();
  assert_eq!(recorder.ready, expected);
}

#[test]
fn json_trace_file() {
  let path = std::env::temp_dir().join(format!("uloop-trace-{}.jsonl", std::process::id()));
  let params = conv(128, 1, 1, 2, 128, 128);
  let config = SimConfig {
    trace_file: Some(path.to_string_lossy().to_string()),
    ..SimConfig::default()
  };
  let report = Simulator::from_conv(&params, config).unwrap().run().unwrap();
  assert!(report.passed());

  let text = std::fs::read_to_string(&path).unwrap();
  std::fs::remove_file(&path).unwrap();
  let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
  assert_eq!(lines.len() as u64, report.committed_cycles);
  let last = lines.last().unwrap();
  assert_eq!(last["done"], serde_json::json!(true));
  assert_eq!(last["idx"], serde_json::json!([0, 0, 0, 0, 1, 0]));
  assert_eq!(last["registers"][1], serde_json::json!(128));
}

macro_rules! test_case {
  ($name:ident, $tp:expr, $fs:expr, $oh:expr, $ow:expr, $nif:expr, $nof:expr) => {
    #[test]
    fn $name() {
      let params = conv($tp, $fs, $oh, $ow, $nif, $nof);
      for width in [1, 2, 4] {
        let report = Simulator::from_conv(&params, with_width(width)).unwrap().run().unwrap();
        assert!(report.passed(), "{} width {}: {:?}", params, width, report.first_mismatch);
        assert_eq!(report.ready_cycles, params.total_iterations());
      }
    }
  };
}

test_case!(grid_pointwise, 128, 1, 2, 3, 256, 384);
test_case!(grid_filter_wider_than_output, 128, 5, 1, 1, 128, 128);
test_case!(grid_square, 128, 3, 3, 3, 384, 384);
test_case!(grid_small_tiles, 32, 2, 2, 2, 96, 64);
test_case!(grid_single_iteration, 128, 1, 1, 1, 128, 128);
test_case!(grid_tall, 64, 3, 4, 1, 64, 128);
