//! Write-and-retry writer shared by the connection-oriented backends.
//!
//! A [`Writer`] owns at most one live connection produced by its
//! [`Connector`]. Every write runs under a single lock: the attempt on the
//! current connection, the reconnect after a failure, and the one retry on
//! the fresh connection. No second retry and no backoff happen here.

use std::cell::Cell;
use std::io;

use log::debug;
// parking_lot avoids poisoning and matches crate-wide locking strategy
use parking_lot::Mutex;

use crate::{
    backend::SeverityWriter,
    error::LogError,
    priority::{Priority, Severity},
    record::{LogRecord, RecordClock, process},
};

/// Produces and drives connections for a [`Writer`].
pub trait Connector: Send + Sync {
    /// Live connection handle.
    type Connection: Send;

    /// Human readable target used in diagnostics.
    fn address(&self) -> String;

    /// Establish a new connection.
    fn connect(&self) -> Result<Self::Connection, LogError>;

    /// Persist or transmit one record.
    fn send(&self, conn: &mut Self::Connection, record: &LogRecord) -> Result<(), LogError>;

    /// Release a connection.
    fn disconnect(&self, conn: Self::Connection) -> Result<(), LogError>;
}

thread_local! {
    static EMITTING: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is inside a writer's write sequence.
///
/// Log bridges check this to drop diagnostics produced by the write path
/// itself instead of re-entering the (non-reentrant) writer lock.
pub fn is_emitting() -> bool {
    EMITTING.with(Cell::get)
}

struct EmitGuard {
    previous: bool,
}

impl EmitGuard {
    fn enter() -> Self {
        Self {
            previous: EMITTING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for EmitGuard {
    fn drop(&mut self) {
        EMITTING.with(|flag| flag.set(self.previous));
    }
}

struct WriterState<T> {
    conn: Option<T>,
    clock: RecordClock,
    dials: u64,
}

/// Long-lived logger handle bound to one backend target.
///
/// Safe to share between threads; writes are serialised.
pub struct Writer<C: Connector> {
    priority: Priority,
    tag: String,
    hostname: String,
    connector: C,
    state: Mutex<WriterState<C::Connection>>,
}

impl<C: Connector> Writer<C> {
    /// Create a writer and connect it immediately.
    ///
    /// `priority` supplies the facility for every write and the severity for
    /// generic [`write_bytes`](Self::write_bytes) calls. An empty `tag`
    /// defaults to the program name.
    ///
    /// # Errors
    ///
    /// Returns the connector's error when the initial connection fails.
    pub fn dial(connector: C, priority: Priority, tag: &str) -> Result<Self, LogError> {
        let tag = if tag.is_empty() {
            process::default_tag()
        } else {
            tag.to_owned()
        };
        let writer = Self {
            priority,
            tag,
            hostname: process::hostname(),
            connector,
            state: Mutex::new(WriterState {
                conn: None,
                clock: RecordClock::new(),
                dials: 0,
            }),
        };
        {
            let mut state = writer.state.lock();
            writer.connect(&mut state)?;
        }
        Ok(writer)
    }

    /// Replace the hostname stamped on records.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Number of connection attempts made so far, the initial dial included.
    pub fn dials(&self) -> u64 {
        self.state.lock().dials
    }

    /// Whether a connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.state.lock().conn.is_some()
    }

    /// Run `f` against the current connection while holding the lock.
    pub fn with_connection<R>(&self, f: impl FnOnce(Option<&C::Connection>) -> R) -> R {
        let state = self.state.lock();
        f(state.conn.as_ref())
    }

    /// Log `message` with the configured priority.
    ///
    /// Returns the length of `buf`, like [`io::Write::write`].
    pub fn write_bytes(&self, buf: &[u8]) -> Result<usize, LogError> {
        let message = String::from_utf8_lossy(buf);
        self.write_and_retry(self.priority.severity(), &message)?;
        Ok(buf.len())
    }

    /// Release the connection. Calling this on a closed writer is a no-op.
    ///
    /// A later write reconnects.
    pub fn close(&self) -> Result<(), LogError> {
        self.close_connection()
    }

    fn close_connection(&self) -> Result<(), LogError> {
        let mut state = self.state.lock();
        match state.conn.take() {
            Some(conn) => self.connector.disconnect(conn),
            None => Ok(()),
        }
    }

    /// Write `msg` at `severity`, reconnecting and retrying once on failure.
    pub fn write_and_retry(&self, severity: Severity, msg: &str) -> Result<usize, LogError> {
        let priority = self.priority.with_severity(severity);
        let _emitting = EmitGuard::enter();
        let mut state = self.state.lock();

        if state.conn.is_some() {
            match self.persist(&mut state, priority, msg) {
                Ok(written) => return Ok(written),
                Err(err) => debug!(
                    "rlog: write to {} failed, reconnecting: {err}",
                    self.connector.address()
                ),
            }
        }
        self.connect(&mut state)?;
        self.persist(&mut state, priority, msg)
    }

    fn connect(&self, state: &mut WriterState<C::Connection>) -> Result<(), LogError> {
        if let Some(old) = state.conn.take()
            && let Err(err) = self.connector.disconnect(old)
        {
            // the old session is discarded regardless
            debug!("rlog: closing stale connection failed: {err}");
        }
        state.dials += 1;
        state.conn = Some(self.connector.connect()?);
        Ok(())
    }

    fn persist(
        &self,
        state: &mut WriterState<C::Connection>,
        priority: Priority,
        msg: &str,
    ) -> Result<usize, LogError> {
        let time = state.clock.now();
        let record = LogRecord::at(time, priority, &self.hostname, &self.tag, msg);
        let conn = state.conn.as_mut().ok_or(LogError::Closed)?;
        self.connector.send(conn, &record)?;
        // length of the input, not of whatever the transport wrote
        Ok(msg.len())
    }
}

impl<C: Connector> SeverityWriter for Writer<C> {
    fn log(&self, severity: Severity, message: &str) -> Result<(), LogError> {
        self.write_and_retry(severity, message).map(|_| ())
    }

    fn write_default(&self, bytes: &[u8]) -> Result<usize, LogError> {
        self.write_bytes(bytes)
    }

    fn close(&self) -> Result<(), LogError> {
        self.close_connection()
    }
}

impl<C: Connector> io::Write for &Writer<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: Connector> io::Write for Writer<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: Connector> Drop for Writer<C> {
    fn drop(&mut self) {
        if let Err(err) = self.close_connection() {
            debug!("rlog: closing writer failed: {err}");
        }
    }
}

impl<C: Connector> std::fmt::Debug for Writer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("address", &self.connector.address())
            .field("priority", &self.priority)
            .field("tag", &self.tag)
            .field("hostname", &self.hostname)
            .finish()
    }
}
