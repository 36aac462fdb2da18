//! Fixtures pairing an in-memory store with a writer dialled against it, so
//! writer and facade behaviour can be exercised without a database server.

#![allow(dead_code)]

use rlog::{
    Backend, Facility, LineFlags, LogError, Logger, Priority, Severity, SeverityMask,
    StderrWriter, Writer,
    store::{ConnectionManager, RetentionPolicy, memory::MemoryStore},
};
use rstest::fixture;

use super::shared_buffer::SharedBuf;

/// Writer persisting into a [`MemoryStore`].
pub type MemoryWriter = Writer<ConnectionManager<MemoryStore>>;

/// Tag used by writers built from fixtures.
pub const TAG: &str = "svc";

/// Priority used by writers built from fixtures.
pub fn user_info() -> Priority {
    Priority::combine(Facility::USER, Severity::Info)
}

/// Dial a writer against `store` with the default retention policy.
pub fn dial_memory(
    store: &MemoryStore,
    descriptor: &str,
    priority: Priority,
    tag: &str,
) -> Result<MemoryWriter, LogError> {
    Writer::dial(ConnectionManager::new(store.clone(), descriptor), priority, tag)
}

/// Dial a writer against `store` with custom retention bounds.
pub fn dial_capped(
    store: &MemoryStore,
    retention: RetentionPolicy,
) -> Result<MemoryWriter, LogError> {
    let manager = ConnectionManager::new(store.clone(), "").with_retention(retention);
    Writer::dial(manager, user_info(), TAG)
}

/// Return a fresh in-memory store.
#[fixture]
pub fn store() -> MemoryStore {
    MemoryStore::new()
}

/// Return a store together with a writer connected to it.
#[fixture]
pub fn memory_writer() -> (MemoryStore, MemoryWriter) {
    let store = MemoryStore::new();
    let writer = dial_memory(&store, "", user_info(), TAG).expect("dial in-memory store");
    (store, writer)
}

/// Return a captured stderr logger without line headers.
#[fixture]
pub fn stderr_logger(#[default(SeverityMask::ALL)] mask: SeverityMask) -> (SharedBuf, Logger) {
    let buffer = SharedBuf::default();
    let writer = StderrWriter::with_sink(buffer.clone(), mask);
    let logger = Logger::with_backend(Backend::Stderr(writer)).with_flags(LineFlags::NONE);
    (buffer, logger)
}
