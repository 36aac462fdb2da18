//! Severity-aware output interface shared by every backend.

use crate::{error::LogError, priority::Severity};

/// A sink that accepts messages at one of the eight syslog severities.
///
/// Each severity method ignores the severity configured on the backend and
/// uses its own instead. [`write_default`](Self::write_default) logs at the
/// configured priority.
pub trait SeverityWriter: Send + Sync {
    /// Log `message` at `severity`.
    fn log(&self, severity: Severity, message: &str) -> Result<(), LogError>;

    /// Log raw bytes at the configured priority and return their length.
    fn write_default(&self, bytes: &[u8]) -> Result<usize, LogError>;

    /// Release any held connection.
    fn close(&self) -> Result<(), LogError>;

    fn emerg(&self, message: &str) -> Result<(), LogError> {
        self.log(Severity::Emerg, message)
    }

    fn alert(&self, message: &str) -> Result<(), LogError> {
        self.log(Severity::Alert, message)
    }

    fn crit(&self, message: &str) -> Result<(), LogError> {
        self.log(Severity::Crit, message)
    }

    fn err(&self, message: &str) -> Result<(), LogError> {
        self.log(Severity::Err, message)
    }

    fn warning(&self, message: &str) -> Result<(), LogError> {
        self.log(Severity::Warning, message)
    }

    fn notice(&self, message: &str) -> Result<(), LogError> {
        self.log(Severity::Notice, message)
    }

    fn info(&self, message: &str) -> Result<(), LogError> {
        self.log(Severity::Info, message)
    }

    fn debug(&self, message: &str) -> Result<(), LogError> {
        self.log(Severity::Debug, message)
    }
}

impl<W: SeverityWriter + ?Sized> SeverityWriter for Box<W> {
    fn log(&self, severity: Severity, message: &str) -> Result<(), LogError> {
        (**self).log(severity, message)
    }

    fn write_default(&self, bytes: &[u8]) -> Result<usize, LogError> {
        (**self).write_default(bytes)
    }

    fn close(&self) -> Result<(), LogError> {
        (**self).close()
    }
}
