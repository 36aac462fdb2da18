//! Facade selecting one backend and exposing severity-named methods.
//!
//! A [`Logger`] holds exactly one [`Backend`] and forwards the eight
//! severity methods to it. [`Logger::print`] adds line-oriented output with
//! an optional prefix and date/time header, written at the backend's
//! configured priority.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use delegate::delegate;

use crate::{
    backend::SeverityWriter,
    config::LoggerConfig,
    error::LogError,
    priority::{Facility, Priority, Severity},
    record::normalise_message,
    stderr::{SeverityMask, StderrWriter},
    store::mongo::MongoWriter,
    syslog::SyslogWriter,
};

/// Priority used for generic writes when none is configured.
pub const DEFAULT_PRIORITY: Priority = Priority::combine(Facility::USER, Severity::Info);

/// Backend kinds the facade can dial.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoggerKind {
    #[default]
    Std,
    Syslog,
    MongoDb,
}

impl LoggerKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Std => "std",
            Self::Syslog => "syslog",
            Self::MongoDb => "mongodb",
        }
    }
}

impl fmt::Display for LoggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoggerKind {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, LogError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "std" | "stderr" => Ok(LoggerKind::Std),
            "syslog" => Ok(LoggerKind::Syslog),
            "mongodb" | "mongo" => Ok(LoggerKind::MongoDb),
            other => Err(LogError::Config(format!("unknown backend: {other:?}"))),
        }
    }
}

/// The active output of a [`Logger`].
pub enum Backend {
    Stderr(StderrWriter),
    Syslog(SyslogWriter),
    MongoDb(MongoWriter),
    /// Any other [`SeverityWriter`], e.g. a writer over a test store.
    Custom(Box<dyn SeverityWriter>),
}

impl Backend {
    fn writer(&self) -> &dyn SeverityWriter {
        match self {
            Self::Stderr(w) => w,
            Self::Syslog(w) => w,
            Self::MongoDb(w) => w,
            Self::Custom(w) => w.as_ref(),
        }
    }

    /// Kind of a built-in backend; `None` for custom writers.
    pub fn kind(&self) -> Option<LoggerKind> {
        match self {
            Self::Stderr(_) => Some(LoggerKind::Std),
            Self::Syslog(_) => Some(LoggerKind::Syslog),
            Self::MongoDb(_) => Some(LoggerKind::MongoDb),
            Self::Custom(_) => None,
        }
    }
}

impl SeverityWriter for Backend {
    fn log(&self, severity: Severity, message: &str) -> Result<(), LogError> {
        self.writer().log(severity, message)
    }

    fn write_default(&self, bytes: &[u8]) -> Result<usize, LogError> {
        self.writer().write_default(bytes)
    }

    fn close(&self) -> Result<(), LogError> {
        self.writer().close()
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stderr(w) => f.debug_tuple("Stderr").field(w).finish(),
            Self::Syslog(w) => f.debug_tuple("Syslog").field(w).finish(),
            Self::MongoDb(w) => f.debug_tuple("MongoDb").field(w).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Header fields rendered by [`Logger::print`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LineFlags {
    /// `YYYY/MM/DD`
    pub date: bool,
    /// `HH:MM:SS`
    pub time: bool,
    /// `.ffffff` after the time; implies `time`.
    pub microseconds: bool,
    /// Render in UTC instead of local time.
    pub utc: bool,
}

impl LineFlags {
    pub const NONE: LineFlags = LineFlags {
        date: false,
        time: false,
        microseconds: false,
        utc: false,
    };

    fn header(self, now: DateTime<Utc>) -> String {
        if self.utc {
            self.render(now)
        } else {
            self.render(now.with_timezone(&Local))
        }
    }

    fn render<Tz: chrono::TimeZone>(self, at: DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        let mut header = String::new();
        if self.date {
            header.push_str(&at.format("%Y/%m/%d ").to_string());
        }
        if self.time || self.microseconds {
            header.push_str(&at.format("%H:%M:%S").to_string());
            if self.microseconds {
                header.push_str(&at.format("%.6f").to_string());
            }
            header.push(' ');
        }
        header
    }
}

impl Default for LineFlags {
    fn default() -> Self {
        Self {
            date: true,
            time: true,
            microseconds: false,
            utc: false,
        }
    }
}

impl FromStr for LineFlags {
    type Err = LogError;

    /// Parse a comma-separated list of `date`, `time`, `microseconds`, `utc`.
    fn from_str(s: &str) -> Result<Self, LogError> {
        s.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .try_fold(Self::NONE, |mut flags, name| {
                match name.to_ascii_lowercase().as_str() {
                    "date" => flags.date = true,
                    "time" => flags.time = true,
                    "microseconds" | "micros" => flags.microseconds = true,
                    "utc" => flags.utc = true,
                    "none" => {}
                    other => {
                        return Err(LogError::Config(format!("unknown line flag: {other:?}")));
                    }
                }
                Ok(flags)
            })
    }
}

/// Logger bound to one backend.
#[derive(Debug)]
pub struct Logger {
    backend: Backend,
    flags: LineFlags,
    prefix: String,
}

impl Logger {
    /// Dial `kind` with an explicit target.
    ///
    /// `network` and `target` select the syslog transport; `target` alone is
    /// the MongoDB descriptor. `mask` only affects the stderr backend.
    ///
    /// # Errors
    ///
    /// Propagates the backend's dial error.
    pub fn dial(
        kind: LoggerKind,
        network: &str,
        target: &str,
        tag: &str,
        mask: SeverityMask,
    ) -> Result<Self, LogError> {
        LoggerConfig::new(kind)
            .with_network(network)
            .with_target(target)
            .with_tag(tag)
            .with_stderr_mask(mask)
            .build()
    }

    /// Dial `kind` at its default target.
    ///
    /// # Errors
    ///
    /// Propagates the backend's dial error.
    pub fn new(kind: LoggerKind, mask: SeverityMask) -> Result<Self, LogError> {
        Self::dial(kind, "", "", "", mask)
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            flags: LineFlags::default(),
            prefix: String::new(),
        }
    }

    /// Text written before the header of every [`print`](Self::print) line.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: LineFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn kind(&self) -> Option<LoggerKind> {
        self.backend.kind()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn flags(&self) -> LineFlags {
        self.flags
    }

    delegate! {
        to self.backend {
            pub fn log(&self, severity: Severity, message: &str) -> Result<(), LogError>;
            pub fn emerg(&self, message: &str) -> Result<(), LogError>;
            pub fn alert(&self, message: &str) -> Result<(), LogError>;
            pub fn crit(&self, message: &str) -> Result<(), LogError>;
            pub fn err(&self, message: &str) -> Result<(), LogError>;
            pub fn warning(&self, message: &str) -> Result<(), LogError>;
            pub fn notice(&self, message: &str) -> Result<(), LogError>;
            pub fn info(&self, message: &str) -> Result<(), LogError>;
            pub fn debug(&self, message: &str) -> Result<(), LogError>;
            /// Write raw bytes at the backend's configured priority.
            #[call(write_default)]
            pub fn write(&self, bytes: &[u8]) -> Result<usize, LogError>;
            /// Release the backend's connection; a later write reconnects.
            pub fn close(&self) -> Result<(), LogError>;
        }
    }

    /// Render `message` as one line: prefix, header, message, newline.
    pub fn format_line(&self, message: &str) -> String {
        let header = self.flags.header(Utc::now());
        normalise_message(&format!("{}{header}{message}", self.prefix))
    }

    /// Write one formatted line at the backend's configured priority.
    ///
    /// # Errors
    ///
    /// Propagates the backend's write error.
    pub fn print(&self, message: &str) -> Result<usize, LogError> {
        self.write(self.format_line(message).as_bytes())
    }

    /// [`print`](Self::print) for preformatted arguments.
    ///
    /// # Errors
    ///
    /// Propagates the backend's write error.
    pub fn print_fmt(&self, args: fmt::Arguments<'_>) -> Result<usize, LogError> {
        self.print(&args.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        logged: parking_lot::Mutex<Vec<(Severity, String)>>,
        written: parking_lot::Mutex<Vec<String>>,
        closes: std::sync::atomic::AtomicUsize,
    }

    impl SeverityWriter for Arc<Recorder> {
        fn log(&self, severity: Severity, message: &str) -> Result<(), LogError> {
            self.logged.lock().push((severity, message.to_owned()));
            Ok(())
        }

        fn write_default(&self, bytes: &[u8]) -> Result<usize, LogError> {
            self.written
                .lock()
                .push(String::from_utf8_lossy(bytes).into_owned());
            Ok(bytes.len())
        }

        fn close(&self) -> Result<(), LogError> {
            self.closes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    fn recording_logger() -> (Arc<Recorder>, Logger) {
        let recorder = Arc::new(Recorder::default());
        let logger = Logger::with_backend(Backend::Custom(Box::new(Arc::clone(&recorder))));
        (recorder, logger)
    }

    #[rstest]
    #[case("std", LoggerKind::Std)]
    #[case("STDERR", LoggerKind::Std)]
    #[case("syslog", LoggerKind::Syslog)]
    #[case("mongo", LoggerKind::MongoDb)]
    #[case(" mongodb ", LoggerKind::MongoDb)]
    fn parses_kind(#[case] input: &str, #[case] want: LoggerKind) {
        assert_eq!(input.parse::<LoggerKind>().expect("valid kind"), want);
    }

    #[rstest]
    fn rejects_file_kind() {
        assert!("file".parse::<LoggerKind>().is_err());
    }

    #[rstest]
    fn severity_methods_forward_to_backend() {
        let (recorder, logger) = recording_logger();
        logger.emerg("a").expect("forwarded");
        logger.crit("b").expect("forwarded");
        logger.debug("c").expect("forwarded");
        assert_eq!(
            *recorder.logged.lock(),
            vec![
                (Severity::Emerg, "a".to_string()),
                (Severity::Crit, "b".to_string()),
                (Severity::Debug, "c".to_string()),
            ]
        );
        logger.close().expect("forwarded");
        assert_eq!(recorder.closes.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(logger.kind(), None);
    }

    #[rstest]
    fn print_writes_prefixed_line() {
        let (recorder, logger) = recording_logger();
        let logger = logger.with_prefix("[svc] ").with_flags(LineFlags::NONE);
        let n = logger.print("started").expect("printed");
        assert_eq!(n, "[svc] started\n".len());
        assert_eq!(*recorder.written.lock(), vec!["[svc] started\n".to_string()]);
    }

    #[rstest]
    fn header_renders_requested_fields() {
        let at = Utc
            .with_ymd_and_hms(2024, 3, 5, 7, 8, 9)
            .single()
            .expect("valid timestamp");
        let utc = LineFlags {
            utc: true,
            ..LineFlags::default()
        };
        assert_eq!(utc.header(at), "2024/03/05 07:08:09 ");
        let micros = LineFlags {
            date: false,
            time: false,
            microseconds: true,
            utc: true,
        };
        assert_eq!(micros.header(at), "07:08:09.000000 ");
        assert_eq!(LineFlags::NONE.header(at), "");
    }

    #[rstest]
    #[case("date,time", LineFlags::default())]
    #[case("", LineFlags::NONE)]
    #[case("time, utc", LineFlags { time: true, utc: true, ..LineFlags::NONE })]
    fn parses_flags(#[case] input: &str, #[case] want: LineFlags) {
        assert_eq!(input.parse::<LineFlags>().expect("valid flags"), want);
    }

    #[rstest]
    fn rejects_unknown_flag() {
        assert!("date,shortfile".parse::<LineFlags>().is_err());
    }
}
