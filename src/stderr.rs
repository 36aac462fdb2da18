//! Standard error backend.
//!
//! Severity methods print `YYYY/MM/DD HH:MM:SS <label>-> <message>` when the
//! severity is enabled in the writer's [`SeverityMask`]. Generic writes are
//! passed to the sink unchanged.

use std::fmt;
use std::io::{self, Write};
use std::ops::BitOr;
use std::str::FromStr;

use chrono::Local;
use parking_lot::Mutex;

use crate::{
    backend::SeverityWriter,
    error::LogError,
    priority::{Priority, Severity},
    record::normalise_message,
};

/// Bit set selecting which severities the stderr backend prints.
///
/// Bit values match the flags accepted by older configurations:
/// [`ALL`](Self::ALL) is bit 31 and `emerg` through `debug` occupy bits 30
/// down to 23.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeverityMask(u32);

impl SeverityMask {
    pub const NONE: SeverityMask = SeverityMask(0);
    pub const ALL: SeverityMask = SeverityMask(1 << 31);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Mask with only `severity` enabled.
    pub const fn only(severity: Severity) -> Self {
        Self(1 << (30 - severity.code() as u32))
    }

    #[must_use]
    pub const fn with(self, severity: Severity) -> Self {
        Self(self.0 | Self::only(severity).0)
    }

    pub const fn allows(self, severity: Severity) -> bool {
        self.0 & Self::ALL.0 != 0 || self.0 & Self::only(severity).0 != 0
    }
}

impl Default for SeverityMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for SeverityMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<Severity> for SeverityMask {
    fn from(severity: Severity) -> Self {
        Self::only(severity)
    }
}

impl FromStr for SeverityMask {
    type Err = LogError;

    /// Parse `all`, `none` or a comma-separated list of severity names.
    fn from_str(s: &str) -> Result<Self, LogError> {
        s.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .try_fold(Self::NONE, |mask, name| {
                match name.to_ascii_lowercase().as_str() {
                    "all" => Ok(mask | Self::ALL),
                    "none" => Ok(mask),
                    _ => name.parse::<Severity>().map(|sev| mask.with(sev)),
                }
            })
    }
}

impl fmt::Display for SeverityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 & Self::ALL.0 != 0 {
            return f.write_str("all");
        }
        let names: Vec<&str> = Severity::ALL
            .iter()
            .filter(|sev| self.0 & Self::only(**sev).0 != 0)
            .map(|sev| sev.as_str())
            .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

/// Label printed before the message for each severity.
pub fn label(severity: Severity) -> &'static str {
    match severity {
        Severity::Crit => "critical",
        Severity::Err => "error",
        other => other.as_str(),
    }
}

/// Writes severity-labelled lines to standard error or an injected sink.
pub struct StderrWriter {
    sink: Mutex<Box<dyn Write + Send>>,
    mask: SeverityMask,
    priority: Priority,
}

impl StderrWriter {
    /// Writer on the process's standard error.
    pub fn new(mask: SeverityMask) -> Self {
        Self::with_sink(io::stderr(), mask)
    }

    /// Writer on an arbitrary sink.
    pub fn with_sink(sink: impl Write + Send + 'static, mask: SeverityMask) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
            mask,
            priority: Priority::default(),
        }
    }

    /// Severity used by the line logger when printing through this backend.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn mask(&self) -> SeverityMask {
        self.mask
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    fn emit(&self, bytes: &[u8]) -> Result<(), LogError> {
        let mut sink = self.sink.lock();
        sink.write_all(bytes)?;
        sink.flush()?;
        Ok(())
    }
}

impl SeverityWriter for StderrWriter {
    fn log(&self, severity: Severity, message: &str) -> Result<(), LogError> {
        if !self.mask.allows(severity) {
            return Ok(());
        }
        let stamp = Local::now().format("%Y/%m/%d %H:%M:%S");
        let line = normalise_message(&format!("{stamp} {}-> {message}", label(severity)));
        self.emit(line.as_bytes())
    }

    fn write_default(&self, bytes: &[u8]) -> Result<usize, LogError> {
        self.emit(bytes)?;
        Ok(bytes.len())
    }

    fn close(&self) -> Result<(), LogError> {
        self.sink.lock().flush()?;
        Ok(())
    }
}

impl fmt::Debug for StderrWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StderrWriter")
            .field("mask", &self.mask)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
