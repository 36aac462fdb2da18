//! Logger configuration.
//!
//! [`LoggerConfig`] is a builder for [`Logger`]. It can also be read from the
//! `[logger]` section of an INI file:
//!
//! ```ini
//! [logger]
//! backend = mongodb
//! target = db1:27017,db2/logs?replicaSet=rs0
//! tag = billing
//! facility = local0
//! severity = info
//! ```

use std::fs;
use std::io;
use std::path::Path;

use ini::Ini;

use crate::{
    error::LogError,
    logger::{Backend, DEFAULT_PRIORITY, LineFlags, Logger, LoggerKind},
    priority::{Facility, Priority, Severity},
    stderr::{SeverityMask, StderrWriter},
    store::mongo,
    syslog,
};

/// Section read by [`LoggerConfig::from_ini_str`].
pub const INI_SECTION: &str = "logger";

/// Builder describing which backend to dial and how lines are rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggerConfig {
    kind: LoggerKind,
    network: String,
    target: String,
    tag: String,
    priority: Priority,
    stderr_mask: SeverityMask,
    line_flags: LineFlags,
    prefix: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new(LoggerKind::default())
    }
}

impl LoggerConfig {
    pub fn new(kind: LoggerKind) -> Self {
        Self {
            kind,
            network: String::new(),
            target: String::new(),
            tag: String::new(),
            priority: DEFAULT_PRIORITY,
            stderr_mask: SeverityMask::ALL,
            line_flags: LineFlags::default(),
            prefix: String::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: LoggerKind) -> Self {
        self.kind = kind;
        self
    }

    /// Syslog transport keyword (`udp`, `tcp`, `unix`, ...); empty for local.
    #[must_use]
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Syslog address or MongoDB descriptor.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Facility of every record and severity of generic writes.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_stderr_mask(mut self, mask: SeverityMask) -> Self {
        self.stderr_mask = mask;
        self
    }

    #[must_use]
    pub fn with_line_flags(mut self, flags: LineFlags) -> Self {
        self.line_flags = flags;
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn kind(&self) -> LoggerKind {
        self.kind
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn stderr_mask(&self) -> SeverityMask {
        self.stderr_mask
    }

    pub fn line_flags(&self) -> LineFlags {
        self.line_flags
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Dial the configured backend.
    ///
    /// # Errors
    ///
    /// Propagates the backend's dial error.
    pub fn build(&self) -> Result<Logger, LogError> {
        let backend = match self.kind {
            LoggerKind::Std => Backend::Stderr(
                StderrWriter::new(self.stderr_mask).with_priority(self.priority),
            ),
            LoggerKind::Syslog => Backend::Syslog(syslog::dial(
                &self.network,
                &self.target,
                self.priority,
                &self.tag,
            )?),
            LoggerKind::MongoDb => {
                Backend::MongoDb(mongo::dial(&self.target, self.priority, &self.tag)?)
            }
        };
        Ok(Logger::with_backend(backend)
            .with_prefix(self.prefix.clone())
            .with_flags(self.line_flags))
    }

    /// Read the `[logger]` section of INI text.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Config`] for malformed INI, a missing section,
    /// unknown keys or invalid values.
    pub fn from_ini_str(text: &str) -> Result<Self, LogError> {
        let ini = Ini::load_from_str(text)
            .map_err(|err| LogError::Config(format!("invalid INI: {err}")))?;
        let section = ini
            .section(Some(INI_SECTION))
            .ok_or_else(|| LogError::Config(format!("missing [{INI_SECTION}] section")))?;

        let mut config = Self::default();
        let mut facility = config.priority.facility();
        let mut severity = config.priority.severity();
        for (key, value) in section.iter() {
            let value = value.trim();
            match key.to_ascii_lowercase().as_str() {
                "backend" => config.kind = value.parse()?,
                "network" => config.network = value.to_owned(),
                "target" => config.target = value.to_owned(),
                "tag" => config.tag = value.to_owned(),
                "facility" => facility = value.parse::<Facility>()?,
                "severity" => severity = value.parse::<Severity>()?,
                "mask" => config.stderr_mask = value.parse()?,
                "flags" => config.line_flags = value.parse()?,
                "prefix" => config.prefix = value.to_owned(),
                other => {
                    return Err(LogError::Config(format!(
                        "unknown key {other:?} in [{INI_SECTION}]"
                    )));
                }
            }
        }
        config.priority = Priority::combine(facility, severity);
        Ok(config)
    }

    /// Read the `[logger]` section of an INI file.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Io`] naming the path when the file cannot be read,
    /// otherwise as [`from_ini_str`](Self::from_ini_str).
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|err| io::Error::new(err.kind(), format!("{}: {err}", path.display())))?;
        Self::from_ini_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[rstest]
    fn defaults_to_stderr_with_user_info() {
        let config = LoggerConfig::default();
        assert_eq!(config.kind(), LoggerKind::Std);
        assert_eq!(config.priority(), DEFAULT_PRIORITY);
        assert_eq!(config.priority().raw(), 14);
        assert_eq!(config.stderr_mask(), SeverityMask::ALL);
    }

    #[rstest]
    fn reads_every_key() {
        let config = LoggerConfig::from_ini_str(
            "[logger]\n\
             backend = syslog\n\
             network = udp\n\
             target = 127.0.0.1:514\n\
             tag = billing\n\
             facility = local0\n\
             severity = warning\n\
             mask = err,crit\n\
             flags = time,utc\n\
             prefix = [billing]\n",
        )
        .expect("valid config");
        assert_eq!(config.kind(), LoggerKind::Syslog);
        assert_eq!(config.network(), "udp");
        assert_eq!(config.target(), "127.0.0.1:514");
        assert_eq!(config.tag(), "billing");
        assert_eq!(
            config.priority(),
            Priority::combine(Facility::LOCAL0, Severity::Warning)
        );
        assert_eq!(
            config.stderr_mask(),
            SeverityMask::only(Severity::Err).with(Severity::Crit)
        );
        assert!(config.line_flags().utc && !config.line_flags().date);
        assert_eq!(config.prefix(), "[billing]");
    }

    #[rstest]
    #[case("[other]\nbackend = std\n")]
    #[case("[logger]\ncolour = blue\n")]
    #[case("[logger]\nbackend = file\n")]
    #[case("[logger]\nfacility = local9\n")]
    #[case("[logger]\nseverity = loud\n")]
    fn rejects_bad_config(#[case] text: &str) {
        let err = LoggerConfig::from_ini_str(text).expect_err("config must be rejected");
        assert!(matches!(err, LogError::Config(_)), "unexpected {err:?}");
    }

    #[rstest]
    fn reads_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "[logger]\nbackend = std\nmask = all").expect("write config");
        let config = LoggerConfig::from_ini_file(file.path()).expect("valid file");
        assert_eq!(config.kind(), LoggerKind::Std);
    }

    #[rstest]
    fn missing_file_names_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.ini");
        let err = LoggerConfig::from_ini_file(&path).expect_err("file is missing");
        assert!(matches!(err, LogError::Io(_)));
        assert!(err.to_string().contains("absent.ini"), "got {err}");
    }

    #[rstest]
    fn stderr_backend_builds_without_network() {
        let logger = LoggerConfig::new(LoggerKind::Std)
            .with_prefix("p ")
            .build()
            .expect("stderr never fails");
        assert_eq!(logger.kind(), Some(LoggerKind::Std));
        assert_eq!(logger.prefix(), "p ");
    }
}
