use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  /// Step N cycles
  Step(u32),
  /// Step N ready cycles (whole iterations)
  Iter(u32),
  /// Run to the end
  Continue,
  /// Print the register bank
  Regs,
  Quit,
}

/// Parse one shell line; `Err` carries the message shown to the user
pub fn parse_command(line: &str) -> Result<Command, String> {
  let trimmed = line.trim();

  // Empty input: step once
  if trimmed.is_empty() {
    return Ok(Command::Step(1));
  }

  let mut words = trimmed.split_whitespace();
  let head = words.next().unwrap_or_default();
  let mut count = |cmd: &str| -> Result<u32, String> {
    match words.next() {
      None => Ok(1),
      Some(num) => match num.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(format!("'{}' count must be greater than 0", cmd)),
        Err(e) => Err(format!("invalid number '{}': {}", num, e)),
      },
    }
  };

  match head {
    "si" | "s" => count(head).map(Command::Step),
    "ni" | "n" => count(head).map(Command::Iter),
    "c" => Ok(Command::Continue),
    "r" | "regs" => Ok(Command::Regs),
    "q" => Ok(Command::Quit),
    _ => Err(format!(
      "Unknown command: '{}'. Enter steps one cycle, 'si N' N cycles, 'ni N' N iterations, 'r' registers, 'c' continue, 'q' quit",
      trimmed
    )),
  }
}

/// Interactive line reader for step mode
pub struct Shell {
  editor: DefaultEditor,
}

impl Shell {
  pub fn new() -> io::Result<Self> {
    let editor = DefaultEditor::new().map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    Ok(Self { editor })
  }

  pub fn read_command(&mut self) -> io::Result<Command> {
    loop {
      match self.editor.readline("(uloop) ") {
        Ok(line) => {
          let trimmed = line.trim();
          // Add to history if not empty
          if !trimmed.is_empty() {
            let _ = self.editor.add_history_entry(trimmed);
          }
          match parse_command(trimmed) {
            Ok(cmd) => return Ok(cmd),
            Err(msg) => eprintln!("Error: {}", msg),
          }
        },
        // Ctrl-C / Ctrl-D: quit
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(Command::Quit),
        Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
      }
    }
  }
}
