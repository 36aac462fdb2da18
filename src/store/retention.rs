//! Retention and consistency settings applied by the connection manager.

use std::time::Duration;

/// Collection holding log records.
pub const LOG_COLLECTION: &str = "Log";
/// Maximum number of documents kept by the capped collection.
pub const MAX_DOCUMENTS: u64 = 10_000;
/// Maximum total size of the capped collection in bytes (5 MiB).
pub const MAX_BYTES: u64 = 5_242_880;
/// Field indexed for reverse-chronological scans.
pub const TIME_FIELD: &str = "Time";
/// Name of the descending time index.
pub const TIME_INDEX_NAME: &str = "Time_-1";

/// Size bounds of the capped log collection.
///
/// Whichever bound is reached first evicts the oldest records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub collection: String,
    pub max_documents: u64,
    pub max_bytes: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            collection: LOG_COLLECTION.to_owned(),
            max_documents: MAX_DOCUMENTS,
            max_bytes: MAX_BYTES,
        }
    }
}

/// Secondary index maintained on the log collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeIndex {
    pub name: String,
    pub field: String,
    pub descending: bool,
    pub background: bool,
}

impl Default for TimeIndex {
    fn default() -> Self {
        Self {
            name: TIME_INDEX_NAME.to_owned(),
            field: TIME_FIELD.to_owned(),
            descending: true,
            background: true,
        }
    }
}

/// An index as reported by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    /// Key fields with their direction (`1` or `-1`).
    pub keys: Vec<(String, i32)>,
    /// Expiry of a TTL index.
    pub expire_after: Option<Duration>,
}

impl IndexInfo {
    /// TTL indexes conflict with capped eviction and are dropped on dial.
    pub fn is_ttl(&self) -> bool {
        self.expire_after.is_some()
    }
}

/// Write acknowledgement requested from the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Durability {
    /// Fire and forget: the caller never waits for replica acknowledgement.
    Unacknowledged,
}

/// Read consistency requested from the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Consistency {
    /// Reads may be served by secondaries but never go back in time.
    Monotonic,
    /// All reads and writes go to the primary.
    Strong,
}

/// Options the connection manager forces on every session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionPolicy {
    pub durability: Durability,
    pub consistency: Consistency,
}

impl SessionPolicy {
    /// Policy for a target that does or does not name a replica set.
    pub fn for_replica_set(replica_set: bool) -> Self {
        Self {
            durability: Durability::Unacknowledged,
            consistency: if replica_set {
                Consistency::Monotonic
            } else {
                Consistency::Strong
            },
        }
    }
}
