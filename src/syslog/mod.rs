//! Syslog backend.
//!
//! Messages go to the local daemon over a Unix socket or to a remote daemon
//! over UDP or TCP. Delivery reuses [`Writer`], so a failed send reconnects
//! and retries exactly once.

mod frame;
mod transport;


use std::time::Duration;

use crate::{
    error::LogError,
    priority::Priority,
    record::LogRecord,
    writer::{Connector, Writer},
};

pub use frame::{local_frame, network_frame};
pub use transport::{LOCAL_SOCKETS, SyslogConnection, SyslogNetwork};

/// Timeout for establishing a TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout applied to each socket write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Writer sending records to a syslog daemon.
pub type SyslogWriter = Writer<SyslogConnector>;

/// Dial a syslog daemon.
///
/// `network` is empty for the local daemon, or one of `unix`, `unixgram`,
/// `unixstream`, `udp`, `tcp` together with `addr`.
///
/// # Errors
///
/// Returns [`LogError::Config`] for an unknown network and
/// [`LogError::Connection`] when the daemon cannot be reached.
pub fn dial(
    network: &str,
    addr: &str,
    priority: Priority,
    tag: &str,
) -> Result<SyslogWriter, LogError> {
    let network = SyslogNetwork::from_parts(network, addr)?;
    Writer::dial(SyslogConnector::new(network), priority, tag)
}

/// Dial the local syslog daemon.
///
/// # Errors
///
/// See [`dial`].
pub fn new(priority: Priority, tag: &str) -> Result<SyslogWriter, LogError> {
    dial("", "", priority, tag)
}

/// [`Connector`] for syslog sockets.
#[derive(Clone, Debug)]
pub struct SyslogConnector {
    network: SyslogNetwork,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl SyslogConnector {
    pub fn new(network: SyslogNetwork) -> Self {
        Self {
            network,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, write: Duration) -> Self {
        self.connect_timeout = connect;
        self.write_timeout = write;
        self
    }

    pub fn network(&self) -> &SyslogNetwork {
        &self.network
    }

    fn frame(&self, record: &LogRecord) -> String {
        if self.network.is_local() {
            local_frame(record)
        } else {
            network_frame(record)
        }
    }
}

impl Connector for SyslogConnector {
    type Connection = SyslogConnection;

    fn address(&self) -> String {
        self.network.to_string()
    }

    fn connect(&self) -> Result<SyslogConnection, LogError> {
        transport::connect(&self.network, self.connect_timeout, self.write_timeout)
            .map_err(|source| LogError::connection(self.address(), source))
    }

    fn send(&self, conn: &mut SyslogConnection, record: &LogRecord) -> Result<(), LogError> {
        conn.send(self.frame(record).as_bytes())
            .map_err(LogError::write)
    }

    fn disconnect(&self, conn: SyslogConnection) -> Result<(), LogError> {
        drop(conn);
        Ok(())
    }
}
