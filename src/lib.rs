//! Severity-tagged logging to stderr, syslog, or a capped MongoDB collection.
//!
//! Exactly one backend is active per [`Logger`]. The MongoDB backend keeps a
//! single connection per writer, stores records in a capped `Log`
//! collection indexed by time, and on any write failure reconnects and
//! retries exactly once.
//!
//! ```no_run
//! use rlog::{Facility, Priority, Severity, SeverityWriter};
//!
//! let writer = rlog::mongo::dial("", Priority::combine(Facility::USER, Severity::Info), "svc")?;
//! writer.err("payment gateway timed out")?;
//! # Ok::<(), rlog::LogError>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
#[cfg(feature = "log-compat")]
pub mod log_compat;
pub mod logger;
pub mod priority;
pub mod rate_limited_warner;
pub mod record;
pub mod stderr;
pub mod store;
pub mod syslog;
#[cfg(feature = "tracing-compat")]
pub mod tracing_compat;
pub mod writer;

pub use backend::SeverityWriter;
pub use config::LoggerConfig;
pub use error::{BoxError, CreateCollectionError, LogError, OpenError};
pub use logger::{Backend, DEFAULT_PRIORITY, LineFlags, Logger, LoggerKind};
pub use priority::{Facility, Priority, Severity};
pub use record::LogRecord;
pub use stderr::{SeverityMask, StderrWriter};
pub use store::mongo;
pub use store::mongo::MongoWriter;
pub use syslog::SyslogWriter;
#[cfg(feature = "tracing-compat")]
pub use tracing_compat::RlogLayer;
pub use writer::{Connector, Writer};
