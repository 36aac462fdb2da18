//! Document-store backend: connection management and capped retention.
//!
//! [`ConnectionManager`] turns a target descriptor into a live
//! [`Connection`]: it parses and sanitises the descriptor, opens a session
//! with fire-and-forget durability, makes sure the capped `Log` collection
//! exists, drops TTL indexes that would fight the cap, and ensures the
//! descending `Time` index. The concrete database is reached through the
//! [`DocumentStore`] and [`StoreSession`] traits; [`mongo`] binds them to
//! MongoDB and `memory` provides an in-process store for tests.

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod mongo;
mod retention;
mod target;

#[cfg(test)]
mod tests;

use log::{debug, warn};

use crate::{
    error::{BoxError, CreateCollectionError, LogError, OpenError},
    rate_limited_warner::RateLimitedWarner,
    record::LogRecord,
    writer::Connector,
};

pub use retention::{
    Consistency, Durability, IndexInfo, LOG_COLLECTION, MAX_BYTES, MAX_DOCUMENTS,
    RetentionPolicy, SessionPolicy, TIME_FIELD, TIME_INDEX_NAME, TimeIndex,
};
pub use target::{ConnectionTarget, DEFAULT_DATABASE, DEFAULT_HOST, HostAddr};

/// Factory for sessions against a concrete document database.
pub trait DocumentStore: Send + Sync {
    type Session: StoreSession;

    /// Open a session bound to `collection` in the target's database.
    ///
    /// Implementations must apply `policy` and must verify the server is
    /// reachable before returning. A target the store cannot use at all is
    /// reported as [`OpenError::InvalidTarget`].
    fn open(
        &self,
        target: &ConnectionTarget,
        policy: &SessionPolicy,
        collection: &str,
    ) -> Result<Self::Session, OpenError>;
}

/// Session bound to the log collection.
pub trait StoreSession: Send {
    /// Create the capped collection described by `retention`.
    fn create_capped_collection(
        &mut self,
        retention: &RetentionPolicy,
    ) -> Result<(), CreateCollectionError>;

    fn list_indexes(&mut self) -> Result<Vec<IndexInfo>, BoxError>;

    fn drop_index(&mut self, name: &str) -> Result<(), BoxError>;

    /// Create `index` unless an equivalent one exists.
    fn ensure_index(&mut self, index: &TimeIndex) -> Result<(), BoxError>;

    fn insert(&mut self, record: &LogRecord) -> Result<(), BoxError>;

    /// Close the session and release its sockets.
    fn close(self) -> Result<(), BoxError>;
}

/// Live session plus the target and policy it was opened with.
#[derive(Debug)]
pub struct Connection<S> {
    session: S,
    target: ConnectionTarget,
    policy: SessionPolicy,
    collection: String,
}

impl<S: StoreSession> Connection<S> {
    /// Effective target after defaults and option stripping.
    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    fn insert(&mut self, record: &LogRecord) -> Result<(), LogError> {
        self.session.insert(record).map_err(LogError::write)
    }

    fn close(self) -> Result<(), LogError> {
        let address = self.target.address();
        self.session
            .close()
            .map_err(|source| LogError::connection(address, source))
    }
}

/// Dials a [`DocumentStore`] and prepares the log collection.
pub struct ConnectionManager<D> {
    store: D,
    descriptor: String,
    retention: RetentionPolicy,
    time_index: TimeIndex,
    warner: RateLimitedWarner,
}

impl<D: DocumentStore> ConnectionManager<D> {
    /// Manager for `descriptor` with the default retention policy.
    pub fn new(store: D, descriptor: impl Into<String>) -> Self {
        Self {
            store,
            descriptor: descriptor.into(),
            retention: RetentionPolicy::default(),
            time_index: TimeIndex::default(),
            warner: RateLimitedWarner::default(),
        }
    }

    /// Override the capped collection bounds.
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Override the rate limiter used for index maintenance warnings.
    pub fn with_warner(mut self, warner: RateLimitedWarner) -> Self {
        self.warner = warner;
        self
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    /// Parse the descriptor and strip options the session policy overrides.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Config`] when the descriptor is malformed.
    pub fn resolve_target(&self) -> Result<ConnectionTarget, LogError> {
        let mut target = ConnectionTarget::parse(&self.descriptor)?;
        target.strip_conflicting_options();
        Ok(target)
    }

    /// Open a new connection and prepare the collection.
    ///
    /// # Errors
    ///
    /// Configuration, session and collection-creation failures abort the
    /// dial. A target rejected by the store is a [`LogError::Config`]. Index maintenance failures are logged and ignored.
    pub fn open(&self) -> Result<Connection<D::Session>, LogError> {
        let target = self.resolve_target()?;
        let policy = SessionPolicy::for_replica_set(target.replica_set().is_some());
        debug!("rlog: connecting to {}", target.address());

        let mut session = self
            .store
            .open(&target, &policy, &self.retention.collection)
            .map_err(|err| match err {
                OpenError::InvalidTarget(source) => LogError::Config(format!(
                    "connection string ({}) is not correct: {source}",
                    target.address()
                )),
                OpenError::Unreachable(source) => LogError::connection(target.address(), source),
            })?;

        if let Err(err) = self.ensure_collection(&mut session) {
            if let Err(close_err) = session.close() {
                debug!("rlog: closing session after failed setup: {close_err}");
            }
            return Err(err);
        }
        self.drop_ttl_indexes(&mut session);
        self.ensure_time_index(&mut session);

        Ok(Connection {
            session,
            target,
            policy,
            collection: self.retention.collection.clone(),
        })
    }

    fn ensure_collection(&self, session: &mut D::Session) -> Result<(), LogError> {
        match session.create_capped_collection(&self.retention) {
            Ok(()) | Err(CreateCollectionError::AlreadyExists) => Ok(()),
            Err(CreateCollectionError::Other(source)) => Err(LogError::CollectionSetup {
                collection: self.retention.collection.clone(),
                source,
            }),
        }
    }

    fn drop_ttl_indexes(&self, session: &mut D::Session) {
        let indexes = match session.list_indexes() {
            Ok(indexes) => indexes,
            Err(source) => {
                self.report(LogError::IndexMaintenance {
                    index: format!("{}.*", self.retention.collection),
                    source,
                });
                return;
            }
        };
        for index in indexes.iter().filter(|index| index.is_ttl()) {
            debug!("rlog: dropping TTL index {}", index.name);
            if let Err(source) = session.drop_index(&index.name) {
                self.report(LogError::IndexMaintenance {
                    index: index.name.clone(),
                    source,
                });
            }
        }
    }

    fn ensure_time_index(&self, session: &mut D::Session) {
        if let Err(source) = session.ensure_index(&self.time_index) {
            self.report(LogError::IndexMaintenance {
                index: self.time_index.name.clone(),
                source,
            });
        }
    }

    fn report(&self, err: LogError) {
        self.warner.record();
        self.warner.warn_if_due(|count| {
            warn!("rlog: {err} ({count} index maintenance failures since last report)");
        });
    }
}

impl<D: DocumentStore> Connector for ConnectionManager<D> {
    type Connection = Connection<D::Session>;

    fn address(&self) -> String {
        self.resolve_target()
            .map(|target| target.address())
            .unwrap_or_else(|_| self.descriptor.clone())
    }

    fn connect(&self) -> Result<Self::Connection, LogError> {
        self.open()
    }

    fn send(&self, conn: &mut Self::Connection, record: &LogRecord) -> Result<(), LogError> {
        conn.insert(record)
    }

    fn disconnect(&self, conn: Self::Connection) -> Result<(), LogError> {
        conn.close()
    }
}

impl<D> std::fmt::Debug for ConnectionManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("descriptor", &self.descriptor)
            .field("retention", &self.retention)
            .finish()
    }
}
