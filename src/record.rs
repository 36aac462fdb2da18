//! Log record representation shared by every backend.
//!
//! This module defines the `LogRecord` struct persisted by the document
//! store and rendered by the stream backends, along with the process
//! metadata (hostname, pid, default tag) stamped on every record.

use std::fmt;
use std::fs;

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::priority::Priority;

/// One log entry.
///
/// Field names follow the schema of existing `Log` collections so records
/// written by this crate and by older producers sort and index together.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogRecord {
    /// Globally unique, time-ordered identifier.
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Combined facility and severity.
    #[serde(rename = "Priority")]
    pub priority: Priority,
    /// Creation time (UTC).
    #[serde(
        rename = "Time",
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    pub time: DateTime<Utc>,
    #[serde(rename = "Hostname")]
    pub hostname: String,
    #[serde(rename = "Tag")]
    pub tag: String,
    /// Message exactly as supplied by the caller.
    #[serde(rename = "Msg")]
    pub message: String,
    #[serde(rename = "Pid")]
    pub pid: u32,
}

impl LogRecord {
    /// Build a record stamped with a fresh identifier, the current time and
    /// this process's id.
    pub fn new(priority: Priority, hostname: &str, tag: &str, message: &str) -> Self {
        Self::at(Utc::now(), priority, hostname, tag, message)
    }

    /// Build a record with an explicit timestamp.
    pub fn at(
        time: DateTime<Utc>,
        priority: Priority,
        hostname: &str,
        tag: &str,
        message: &str,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            priority,
            time,
            hostname: hostname.to_owned(),
            tag: tag.to_owned(),
            message: message.to_owned(),
            pid: std::process::id(),
        }
    }

    /// Message with a guaranteed trailing newline, as stream backends emit it.
    pub fn line(&self) -> String {
        normalise_message(&self.message)
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}[{}]: {}",
            self.priority, self.hostname, self.tag, self.pid, self.message
        )
    }
}

/// Hands out timestamps that never run backwards for one writer.
///
/// A wall clock step backwards reuses the last instant handed out.
#[derive(Debug, Default)]
pub struct RecordClock {
    last: Option<DateTime<Utc>>,
}

impl RecordClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next timestamp.
    pub fn now(&mut self) -> DateTime<Utc> {
        self.observe(Utc::now())
    }

    fn observe(&mut self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let next = match self.last {
            Some(last) if wall < last => last,
            _ => wall,
        };
        self.last = Some(next);
        next
    }
}

/// Append `\n` unless `msg` already ends with one.
pub fn normalise_message(msg: &str) -> String {
    if msg.ends_with('\n') {
        msg.to_owned()
    } else {
        format!("{msg}\n")
    }
}

/// Process-level metadata stamped on records.
pub mod process {
    use once_cell::sync::Lazy;

    use super::fs;

    const FALLBACK_HOST: &str = "localhost";

    static HOSTNAME: Lazy<String> = Lazy::new(|| {
        kernel_hostname()
            .or_else(|| env_hostname("HOSTNAME"))
            .or_else(|| env_hostname("COMPUTERNAME"))
            .unwrap_or_else(|| FALLBACK_HOST.to_owned())
    });

    static DEFAULT_TAG: Lazy<String> = Lazy::new(|| {
        std::env::args()
            .next()
            .filter(|arg| !arg.is_empty())
            .unwrap_or_else(|| "rlog".to_owned())
    });

    /// Host name of this machine, or `localhost` when it cannot be found.
    ///
    /// Resolved once per process.
    pub fn hostname() -> String {
        HOSTNAME.clone()
    }

    fn kernel_hostname() -> Option<String> {
        fs::read_to_string("/proc/sys/kernel/hostname")
            .ok()
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
    }

    fn env_hostname(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
    }

    /// Program name used when no tag is configured.
    pub fn default_tag() -> String {
        DEFAULT_TAG.clone()
    }
}
