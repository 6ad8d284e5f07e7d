use crate::arch::uloop::{ControlSignals, Phase, RegisterBank};
use std::fs::File;
use std::io::{BufWriter, Result, Write};
use std::path::Path;

/// Read-only view of the engine after a committed cycle
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
  pub cycle: u64,
  /// Odometer position the committed registers belong to
  pub idx: &'a [usize],
  /// Phase the engine moved to
  pub phase: Phase,
  pub signals: ControlSignals,
  pub registers: &'a RegisterBank,
}

/// Consumer of per-cycle snapshots, kept out of the state machine
pub trait Observer {
  fn on_commit(&mut self, snapshot: &Snapshot<'_>) -> Result<()>;

  fn finish(&mut self) -> Result<()> {
    Ok(())
  }
}

/// Writes one JSON object per committed cycle
pub struct JsonTrace<W: Write> {
  writer: W,
}

impl JsonTrace<BufWriter<File>> {
  pub fn create(path: impl AsRef<Path>) -> Result<Self> {
    Ok(Self::new(BufWriter::new(File::create(path)?)))
  }
}

impl<W: Write> JsonTrace<W> {
  pub fn new(writer: W) -> Self {
    Self { writer }
  }

  pub fn into_inner(self) -> W {
    self.writer
  }
}

impl<W: Write> Observer for JsonTrace<W> {
  fn on_commit(&mut self, snapshot: &Snapshot<'_>) -> Result<()> {
    let entry = serde_json::json!({
      "cycle": snapshot.cycle,
      "idx": snapshot.idx,
      "phase": snapshot.phase,
      "ready": snapshot.signals.ready,
      "done": snapshot.signals.done,
      "registers": snapshot.registers.values(),
    });
    writeln!(self.writer, "{}", entry)
  }

  fn finish(&mut self) -> Result<()> {
    self.writer.flush()
  }
}
