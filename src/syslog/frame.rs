//! Syslog message framing.

use chrono::{Local, SecondsFormat};

use crate::record::{LogRecord, normalise_message};

/// Frame for a daemon on this host: `<PRI>Mmm dd hh:mm:ss TAG[PID]: MSG`.
pub fn local_frame(record: &LogRecord) -> String {
    let stamp = record.time.with_timezone(&Local).format("%b %e %H:%M:%S");
    normalise_message(&format!(
        "<{}>{stamp} {}[{}]: {}",
        record.priority.raw(),
        record.tag,
        record.pid,
        record.message
    ))
}

/// Frame for a remote daemon: `<PRI>RFC3339 HOSTNAME TAG[PID]: MSG`.
pub fn network_frame(record: &LogRecord) -> String {
    let stamp = record
        .time
        .with_timezone(&Local)
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    normalise_message(&format!(
        "<{}>{stamp} {} {}[{}]: {}",
        record.priority.raw(),
        record.hostname,
        record.tag,
        record.pid,
        record.message
    ))
}
