use crate::{ConsoleSink, SinkWriter};
use core::fmt::Write;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct ConsoleLogger {
    max_level: LevelFilter,
    sink: &'static dyn ConsoleSink,
}

impl ConsoleLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter, sink: &'static dyn ConsoleSink) -> Self {
        Self { max_level, sink }
    }

    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }
}

/// Install `logger` as the global logger. Call once during early init.
///
/// # Errors
/// Fails if a logger was already installed.
pub fn init(logger: &'static ConsoleLogger) -> Result<(), SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(logger.max_level);
    Ok(())
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Format: "[LEVEL] target: message\n"
        let _ = writeln!(
            SinkWriter(self.sink),
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        // unbuffered
    }
}
