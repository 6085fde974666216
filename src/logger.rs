//! Console backend for the `log` facade.
//!
//! Prints `LEVEL message` to stderr with the level painted the same way the
//! trace output has always been: red errors, green info.

use ansi_term::Colour::{Blue, Green, Purple, Red, Yellow};
use log::{Level, LevelFilter, Log, Metadata, Record};

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let label = match record.level() {
            Level::Error => Red.bold().paint("ERROR"),
            Level::Warn => Yellow.bold().paint("WARN "),
            Level::Info => Green.bold().paint("INFO "),
            Level::Debug => Blue.bold().paint("DEBUG"),
            Level::Trace => Purple.paint("TRACE"),
        };
        eprintln!("{} {}", label, record.args());
    }

    fn flush(&self) {}
}

/// Map `-v` repetitions to a level: none = warn, 1 = info, 2 = debug, 3+ = trace.
pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the console logger. Calling it twice keeps the first logger and only
/// updates the level.
pub fn init(level: LevelFilter) {
    // Err only means a logger is already installed; the level still applies.
    log::set_logger(&LOGGER).ok();
    log::set_max_level(level);
}
