//! Error types shared by every backend.

use std::io;

use thiserror::Error;

/// Boxed error produced by a storage or transport binding.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by writers, the connection manager and the facade.
#[derive(Debug, Error)]
pub enum LogError {
    /// Malformed target descriptor, out-of-range priority or bad config file.
    /// Never retried.
    #[error("invalid logger configuration: {0}")]
    Config(String),
    /// The session to `address` could not be established.
    #[error("can't connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: BoxError,
    },
    /// The capped log collection could not be created or verified.
    #[error("can't create the collection {collection}: {source}")]
    CollectionSetup {
        collection: String,
        #[source]
        source: BoxError,
    },
    /// Dropping a TTL index or ensuring the time index failed.
    ///
    /// Only ever logged; the dial continues.
    #[error("index maintenance on {index} failed: {source}")]
    IndexMaintenance {
        index: String,
        #[source]
        source: BoxError,
    },
    /// Persisting a record on an established connection failed.
    #[error("write failed: {source}")]
    Write {
        #[source]
        source: BoxError,
    },
    /// The writer was closed and the backend cannot reopen it.
    #[error("logger is closed")]
    Closed,
    /// Underlying I/O error outside the write path (e.g. reading a config file).
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LogError {
    pub(crate) fn write(source: impl Into<BoxError>) -> Self {
        Self::Write {
            source: source.into(),
        }
    }

    pub(crate) fn connection(address: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            address: address.into(),
            source: source.into(),
        }
    }
}

/// Failure reported by [`DocumentStore::open`](crate::store::DocumentStore::open).
#[derive(Debug, Error)]
pub enum OpenError {
    /// The store rejected the target itself. Redialling cannot help.
    #[error(transparent)]
    InvalidTarget(BoxError),
    /// The target is well formed but no server answered.
    #[error(transparent)]
    Unreachable(BoxError),
}

/// Failure reported by [`StoreSession::create_capped_collection`](crate::store::StoreSession::create_capped_collection).
#[derive(Debug, Error)]
pub enum CreateCollectionError {
    /// The collection is already present; setup treats this as success.
    #[error("collection already exists")]
    AlreadyExists,
    /// Any other failure, e.g. missing privileges.
    #[error(transparent)]
    Other(BoxError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn connection_error_names_address() {
        let err = LogError::connection("db1:27017/rlogs", io::Error::other("refused"));
        assert_eq!(err.to_string(), "can't connect to db1:27017/rlogs: refused");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[rstest]
    fn already_exists_has_stable_message() {
        assert_eq!(
            CreateCollectionError::AlreadyExists.to_string(),
            "collection already exists"
        );
    }
}
