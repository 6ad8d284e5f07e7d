/// Global logging configuration
use env_logger::{Builder, Env};
use log::LevelFilter;

/// Install the env_logger backend. `RUST_LOG` wins over the default `info` filter.
/// Calling it more than once is harmless.
pub fn init_log() {
  let _ = Builder::from_env(Env::default().default_filter_or("info"))
    .format_timestamp(None)
    .format_target(false)
    .try_init();
}

/// Quiet mode keeps warnings and errors only
pub fn set_quiet(quiet: bool) {
  if quiet {
    log::set_max_level(LevelFilter::Warn);
  }
}
