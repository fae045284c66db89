//! Station logging.
//!
//! Components log under their own target: `socket`, `call`, `pubsub` and
//! `inproc`. For test logging see [`mod@test`].

use std::io;
use std::io::Write;

use chrono::prelude::*;
use colored::*;
use log::{Level, Log, Metadata, Record, SetLoggerError};

/// A logger that logs to `stdout`, with timestamps and colors.
pub struct Logger {
    level: Level,
    station: Option<String>,
}

impl Logger {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            station: None,
        }
    }

    /// Prefix every line with the name of the station.
    pub fn station(mut self, name: impl ToString) -> Self {
        self.station = Some(name.to_string());
        self
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!(
            "{:<5} {:<8} {}",
            record.level(),
            record.target().cyan(),
            record.args()
        );
        let time = Local::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let message = match &self.station {
            Some(station) => format!("{time} {} {message}", station.bold()),
            None => format!("{time} {message}"),
        };
        let message = match record.level() {
            Level::Error => message.red(),
            Level::Warn => message.yellow(),
            Level::Info => message.normal(),
            Level::Debug => message.dimmed(),
            Level::Trace => message.white().dimmed(),
        };
        writeln!(&mut io::stdout(), "{message}").ok();
    }

    fn flush(&self) {
        io::stdout().flush().ok();
    }
}

/// Initialize the `stdout` logger. The level set in `RUST_LOG` takes
/// precedence over the given one.
pub fn init(level: Level) -> Result<(), SetLoggerError> {
    let level = env_level().unwrap_or(level);

    set(Logger::new(level), level)
}

/// Set a logger.
pub fn set(logger: impl Log + 'static, level: Level) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level.to_level_filter());

    Ok(())
}

/// Get the level set by the environment variable `RUST_LOG`, if
/// present.
pub fn env_level() -> Option<Level> {
    let level = std::env::var("RUST_LOG").ok()?;
    level.parse().ok()
}

/// Run the callback and log how long it took.
pub fn benchmark<F, T>(target: &str, msg: &str, callback: F) -> T
where
    F: FnOnce() -> T,
{
    use std::time::Instant;

    let now = Instant::now();
    let res = callback();
    let elapsed = now.elapsed().as_millis();
    log::debug!(target: target, "{msg} took {elapsed}ms");
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled() {
        let logger = Logger::new(Level::Info).station("alice");
        let debug = Metadata::builder().level(Level::Debug).target("call").build();
        let error = Metadata::builder().level(Level::Error).target("call").build();

        assert!(!logger.enabled(&debug));
        assert!(logger.enabled(&error));
    }

    #[test]
    fn test_benchmark() {
        assert_eq!(benchmark("test", "adding", || 1 + 1), 2);
    }
}
