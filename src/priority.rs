//! Facility, severity and the combined priority value.
//!
//! A priority packs a facility into the high bits and a severity into the low
//! three bits, as syslog does. The two halves are kept as separate small-range
//! types and only merged by [`Priority::combine`].

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::LogError;

const SEVERITY_BITS: u8 = 3;
const SEVERITY_MASK: i32 = 0x07;
/// Largest facility code accepted (`local7`).
pub const MAX_FACILITY: u8 = 23;
/// Largest raw priority value (`local7.debug`).
pub const MAX_PRIORITY: i32 = ((MAX_FACILITY as i32) << SEVERITY_BITS) | SEVERITY_MASK;

/// Log severity, most severe first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Emerg = 0,
    Alert = 1,
    Crit = 2,
    Err = 3,
    Warning = 4,
    Notice = 5,
    #[default]
    Info = 6,
    Debug = 7,
}

impl Severity {
    /// Every severity in ascending numeric order.
    pub const ALL: [Severity; 8] = [
        Severity::Emerg,
        Severity::Alert,
        Severity::Crit,
        Severity::Err,
        Severity::Warning,
        Severity::Notice,
        Severity::Info,
        Severity::Debug,
    ];

    /// Numeric code in `0..=7`.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Lowercase keyword used in configuration files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Emerg => "emerg",
            Severity::Alert => "alert",
            Severity::Crit => "crit",
            Severity::Err => "err",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, LogError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emerg" | "emergency" | "panic" => Ok(Severity::Emerg),
            "alert" => Ok(Severity::Alert),
            "crit" | "critical" => Ok(Severity::Crit),
            "err" | "error" => Ok(Severity::Err),
            "warning" | "warn" => Ok(Severity::Warning),
            "notice" => Ok(Severity::Notice),
            "info" | "information" => Ok(Severity::Info),
            "debug" => Ok(Severity::Debug),
            _ => Err(LogError::Config(format!("unknown severity: {s:?}"))),
        }
    }
}

impl TryFrom<u8> for Severity {
    type Error = LogError;

    fn try_from(code: u8) -> Result<Self, LogError> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or_else(|| LogError::Config(format!("severity out of range: {code}")))
    }
}

/// Syslog facility code in `0..=23`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Facility(u8);

impl Facility {
    pub const KERN: Facility = Facility(0);
    pub const USER: Facility = Facility(1);
    pub const MAIL: Facility = Facility(2);
    pub const DAEMON: Facility = Facility(3);
    pub const AUTH: Facility = Facility(4);
    pub const SYSLOG: Facility = Facility(5);
    pub const LPR: Facility = Facility(6);
    pub const NEWS: Facility = Facility(7);
    pub const UUCP: Facility = Facility(8);
    pub const CRON: Facility = Facility(9);
    pub const AUTHPRIV: Facility = Facility(10);
    pub const FTP: Facility = Facility(11);
    pub const LOCAL0: Facility = Facility(16);
    pub const LOCAL1: Facility = Facility(17);
    pub const LOCAL2: Facility = Facility(18);
    pub const LOCAL3: Facility = Facility(19);
    pub const LOCAL4: Facility = Facility(20);
    pub const LOCAL5: Facility = Facility(21);
    pub const LOCAL6: Facility = Facility(22);
    pub const LOCAL7: Facility = Facility(23);

    const NAMES: [(&'static str, Facility); 20] = [
        ("kern", Facility::KERN),
        ("user", Facility::USER),
        ("mail", Facility::MAIL),
        ("daemon", Facility::DAEMON),
        ("auth", Facility::AUTH),
        ("syslog", Facility::SYSLOG),
        ("lpr", Facility::LPR),
        ("news", Facility::NEWS),
        ("uucp", Facility::UUCP),
        ("cron", Facility::CRON),
        ("authpriv", Facility::AUTHPRIV),
        ("ftp", Facility::FTP),
        ("local0", Facility::LOCAL0),
        ("local1", Facility::LOCAL1),
        ("local2", Facility::LOCAL2),
        ("local3", Facility::LOCAL3),
        ("local4", Facility::LOCAL4),
        ("local5", Facility::LOCAL5),
        ("local6", Facility::LOCAL6),
        ("local7", Facility::LOCAL7),
    ];

    /// Validate a raw facility code.
    pub fn new(code: u8) -> Result<Self, LogError> {
        if code > MAX_FACILITY {
            return Err(LogError::Config(format!("facility out of range: {code}")));
        }
        Ok(Self(code))
    }

    /// Numeric code in `0..=23`.
    pub const fn code(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::NAMES.iter().find(|(_, fac)| *fac == *self) {
            Some((name, _)) => f.write_str(name),
            None => write!(f, "facility{}", self.0),
        }
    }
}

impl FromStr for Facility {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, LogError> {
        let wanted = s.trim().to_ascii_lowercase();
        if let Some((_, fac)) = Self::NAMES.iter().find(|(name, _)| *name == wanted) {
            return Ok(*fac);
        }
        wanted
            .parse::<u8>()
            .map_err(|_| LogError::Config(format!("unknown facility: {s:?}")))
            .and_then(Self::new)
    }
}

/// Facility and severity of one log entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Priority {
    facility: Facility,
    severity: Severity,
}

impl Priority {
    /// Combine a facility and a severity.
    pub const fn combine(facility: Facility, severity: Severity) -> Self {
        Self { facility, severity }
    }

    /// Split a raw `facility << 3 | severity` value.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Config`] when `raw` lies outside `0..=191`.
    pub fn from_raw(raw: i32) -> Result<Self, LogError> {
        if !(0..=MAX_PRIORITY).contains(&raw) {
            return Err(LogError::Config(format!("invalid priority: {raw}")));
        }
        let facility = Facility::new((raw >> SEVERITY_BITS) as u8)?;
        let severity = Severity::try_from((raw & SEVERITY_MASK) as u8)?;
        Ok(Self::combine(facility, severity))
    }

    /// Keep the facility and replace the severity.
    pub const fn with_severity(self, severity: Severity) -> Self {
        Self::combine(self.facility, severity)
    }

    pub const fn facility(self) -> Facility {
        self.facility
    }

    pub const fn severity(self) -> Severity {
        self.severity
    }

    /// Packed integer value.
    pub const fn raw(self) -> i32 {
        ((self.facility.code() as i32) << SEVERITY_BITS) | self.severity.code() as i32
    }
}

impl From<Severity> for Priority {
    fn from(severity: Severity) -> Self {
        Self::combine(Facility::KERN, severity)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.facility, self.severity)
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.raw())
    }
}
