//! Compatibility bridge for the Rust `log` crate.
//!
//! [`LogBridge`] implements `log::Log` on top of a [`Logger`], so code using
//! `log::info!` and friends ends up in the configured backend.
//! [`install`] makes it the global logger.

use log::{LevelFilter, Metadata, Record};

use crate::{
    error::LogError, logger::Logger, priority::Severity, rate_limited_warner::RateLimitedWarner,
    writer,
};

/// Severity a `log` level is written at.
pub fn map_log_level(level: log::Level) -> Severity {
    match level {
        log::Level::Error => Severity::Err,
        log::Level::Warn => Severity::Warning,
        log::Level::Info => Severity::Info,
        log::Level::Debug | log::Level::Trace => Severity::Debug,
    }
}

/// `log::Log` implementation writing through a [`Logger`].
///
/// Write failures cannot be returned through `log`; they are counted and
/// reported on stderr at most once per warning interval.
#[derive(Debug)]
pub struct LogBridge {
    logger: Logger,
    level: LevelFilter,
    warner: RateLimitedWarner,
}

impl LogBridge {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            level: LevelFilter::Trace,
            warner: RateLimitedWarner::default(),
        }
    }

    /// Drop records above `level`.
    #[must_use]
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_warner(mut self, warner: RateLimitedWarner) -> Self {
        self.warner = warner;
        self
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // diagnostics raised while a writer holds its lock would deadlock
        if writer::is_emitting() {
            return;
        }
        let message = record.args().to_string();
        if let Err(err) = self.logger.log(map_log_level(record.level()), &message) {
            self.warner.record();
            self.warner.warn_if_due(|count| {
                eprintln!("rlog: failed to write {count} log record(s): {err}");
            });
        }
    }

    fn flush(&self) {
        self.warner.flush(|count| {
            eprintln!("rlog: failed to write {count} log record(s)");
        });
    }
}

/// Install `logger` as the global `log` logger.
///
/// # Errors
///
/// Returns [`LogError::Config`] when another global logger is already set.
pub fn install(logger: Logger) -> Result<(), LogError> {
    install_bridge(LogBridge::new(logger))
}

/// Install a configured bridge as the global `log` logger.
///
/// # Errors
///
/// Returns [`LogError::Config`] when another global logger is already set.
pub fn install_bridge(bridge: LogBridge) -> Result<(), LogError> {
    let level = bridge.level;
    log::set_boxed_logger(Box::new(bridge))
        .map_err(|err| LogError::Config(format!("can't install log bridge: {err}")))?;
    log::set_max_level(level);
    Ok(())
}
