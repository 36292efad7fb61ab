//! Diagnostics go through `log`/`env_logger` on stderr; command results go to stdout
//! through [`status!`](crate::status), which honours `--quiet`.

use env_logger::{Builder, Env};
use log::LevelFilter;
use std::sync::atomic::{AtomicBool, Ordering};

static QUIET_MODE: AtomicBool = AtomicBool::new(false);
static VERBOSE_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_quiet_mode(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

pub fn set_verbose_mode(verbose: bool) {
    VERBOSE_MODE.store(verbose, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

pub fn is_verbose() -> bool {
    VERBOSE_MODE.load(Ordering::Relaxed)
}

/// Default log level for the given switches. `--quiet` wins over `--verbose`.
pub fn default_level(quiet: bool, verbose: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Warn
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Records the switches and installs the global logger. `RUST_LOG` overrides the level.
///
/// Safe to call more than once; later calls only update the switches.
pub fn init(quiet: bool, verbose: bool) {
    set_quiet_mode(quiet);
    set_verbose_mode(verbose);

    let level = default_level(quiet, verbose).to_string().to_lowercase();
    let _ = Builder::from_env(Env::default().default_filter_or(level))
        .format_target(false)
        .try_init();
}

/// Prints a line of command output unless quiet mode is on.
#[macro_export]
macro_rules! status {
    ($($arg:tt)*) => {
        if !$crate::logger::is_quiet() {
            println!($($arg)*);
        }
    };
}
