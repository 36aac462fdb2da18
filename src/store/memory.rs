//! In-process [`DocumentStore`] with capped eviction and fault injection.
//!
//! Clones share state, so a test keeps one handle for inspection while the
//! connection manager owns another.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{
    error::{BoxError, CreateCollectionError, OpenError},
    record::LogRecord,
};

use super::{
    ConnectionTarget, DocumentStore, IndexInfo, RetentionPolicy, SessionPolicy, StoreSession,
    TimeIndex,
};

/// Failure produced by an injected fault.
#[derive(Debug)]
pub struct InjectedFault(pub &'static str);

impl fmt::Display for InjectedFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for InjectedFault {}

#[derive(Debug)]
struct CappedCollection {
    name: String,
    max_documents: u64,
    max_bytes: u64,
    records: VecDeque<(LogRecord, u64)>,
    bytes: u64,
    indexes: Vec<IndexInfo>,
}

impl CappedCollection {
    fn new(retention: &RetentionPolicy) -> Self {
        Self {
            name: retention.collection.clone(),
            max_documents: retention.max_documents,
            max_bytes: retention.max_bytes,
            records: VecDeque::new(),
            bytes: 0,
            indexes: vec![IndexInfo {
                name: "_id_".to_owned(),
                keys: vec![("_id".to_owned(), 1)],
                expire_after: None,
            }],
        }
    }

    fn push(&mut self, record: LogRecord, size: u64) {
        self.records.push_back((record, size));
        self.bytes += size;
        while self.records.len() as u64 > self.max_documents || self.bytes > self.max_bytes {
            match self.records.pop_front() {
                Some((_, evicted)) => self.bytes -= evicted,
                None => break,
            }
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    collection: Option<CappedCollection>,
    generation: u64,
    fail_opens: u32,
    reject_target: bool,
    fail_inserts: u32,
    deny_create: bool,
    fail_list_indexes: bool,
    fail_ensure_index: bool,
    gate_closed: bool,
    waiting_inserts: usize,
    opens: u64,
    closes: u64,
    insert_attempts: u64,
    next_session: u64,
    last_target: Option<ConnectionTarget>,
    last_policy: Option<SessionPolicy>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MemoryState>,
    gate: Condvar,
}

/// Shared handle to an in-memory log database.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.shared.state.lock()
    }

    /// Make the next `n` opens fail as if the server were unreachable.
    pub fn fail_next_opens(&self, n: u32) {
        self.state().fail_opens = n;
    }

    /// Reject every target as unusable, like a driver refusing its options.
    pub fn reject_target(&self, reject: bool) {
        self.state().reject_target = reject;
    }

    /// Make the next `n` inserts fail on otherwise healthy sessions.
    pub fn fail_next_inserts(&self, n: u32) {
        self.state().fail_inserts = n;
    }

    /// Refuse collection creation with a privilege error.
    pub fn deny_create(&self, deny: bool) {
        self.state().deny_create = deny;
    }

    pub fn fail_list_indexes(&self, fail: bool) {
        self.state().fail_list_indexes = fail;
    }

    pub fn fail_ensure_index(&self, fail: bool) {
        self.state().fail_ensure_index = fail;
    }

    /// Break every open session, like a server restart.
    ///
    /// Sessions opened afterwards work normally.
    pub fn sever(&self) {
        self.state().generation += 1;
    }

    /// Create the collection ahead of any dial.
    pub fn seed_collection(&self, retention: &RetentionPolicy) {
        self.state().collection = Some(CappedCollection::new(retention));
    }

    /// Add an index to an existing collection.
    pub fn seed_index(&self, index: IndexInfo) {
        if let Some(collection) = self.state().collection.as_mut() {
            collection.indexes.push(index);
        }
    }

    /// Hold inserts until [`open_gate`](Self::open_gate) is called.
    pub fn close_gate(&self) {
        self.state().gate_closed = true;
    }

    pub fn open_gate(&self) {
        self.state().gate_closed = false;
        self.shared.gate.notify_all();
    }

    /// Inserts currently blocked on the gate.
    pub fn waiting_inserts(&self) -> usize {
        self.state().waiting_inserts
    }

    pub fn opens(&self) -> u64 {
        self.state().opens
    }

    pub fn closes(&self) -> u64 {
        self.state().closes
    }

    pub fn insert_attempts(&self) -> u64 {
        self.state().insert_attempts
    }

    pub fn last_target(&self) -> Option<ConnectionTarget> {
        self.state().last_target.clone()
    }

    pub fn last_policy(&self) -> Option<SessionPolicy> {
        self.state().last_policy
    }

    /// Whether the log collection exists.
    pub fn has_collection(&self) -> bool {
        self.state().collection.is_some()
    }

    /// Stored records, oldest first.
    pub fn records(&self) -> Vec<LogRecord> {
        self.state()
            .collection
            .as_ref()
            .map(|c| c.records.iter().map(|(record, _)| record.clone()).collect())
            .unwrap_or_default()
    }

    /// Stored messages, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.message).collect()
    }

    /// Total stored size in bytes.
    pub fn stored_bytes(&self) -> u64 {
        self.state().collection.as_ref().map_or(0, |c| c.bytes)
    }

    pub fn indexes(&self) -> Vec<IndexInfo> {
        self.state()
            .collection
            .as_ref()
            .map(|c| c.indexes.clone())
            .unwrap_or_default()
    }
}

impl DocumentStore for MemoryStore {
    type Session = MemorySession;

    fn open(
        &self,
        target: &ConnectionTarget,
        policy: &SessionPolicy,
        collection: &str,
    ) -> Result<MemorySession, OpenError> {
        let mut state = self.state();
        state.last_target = Some(target.clone());
        state.last_policy = Some(*policy);
        if state.reject_target {
            return Err(OpenError::InvalidTarget(
                InjectedFault("unsupported connection option").into(),
            ));
        }
        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            return Err(OpenError::Unreachable(
                InjectedFault("no reachable servers").into(),
            ));
        }
        state.opens += 1;
        state.next_session += 1;
        Ok(MemorySession {
            store: self.clone(),
            id: state.next_session,
            generation: state.generation,
            collection: collection.to_owned(),
        })
    }
}

/// Session handed out by [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySession {
    store: MemoryStore,
    id: u64,
    generation: u64,
    collection: String,
}

impl MemorySession {
    /// Sequence number of this session, starting at 1.
    pub fn id(&self) -> u64 {
        self.id
    }

    fn check_alive(&self, state: &MemoryState) -> Result<(), BoxError> {
        if state.generation == self.generation {
            Ok(())
        } else {
            Err(InjectedFault("connection reset by peer").into())
        }
    }
}

impl StoreSession for MemorySession {
    fn create_capped_collection(
        &mut self,
        retention: &RetentionPolicy,
    ) -> Result<(), CreateCollectionError> {
        let mut state = self.store.state();
        if state.collection.is_some() {
            return Err(CreateCollectionError::AlreadyExists);
        }
        if state.deny_create {
            return Err(CreateCollectionError::Other(
                InjectedFault("not authorized to create collection").into(),
            ));
        }
        state.collection = Some(CappedCollection::new(retention));
        Ok(())
    }

    fn list_indexes(&mut self) -> Result<Vec<IndexInfo>, BoxError> {
        let state = self.store.state();
        if state.fail_list_indexes {
            return Err(InjectedFault("listIndexes failed").into());
        }
        Ok(state
            .collection
            .as_ref()
            .map(|c| c.indexes.clone())
            .unwrap_or_default())
    }

    fn drop_index(&mut self, name: &str) -> Result<(), BoxError> {
        let mut state = self.store.state();
        let collection = state
            .collection
            .as_mut()
            .ok_or(InjectedFault("ns not found"))?;
        let before = collection.indexes.len();
        collection.indexes.retain(|index| index.name != name);
        if collection.indexes.len() == before {
            return Err(InjectedFault("index not found").into());
        }
        Ok(())
    }

    fn ensure_index(&mut self, index: &TimeIndex) -> Result<(), BoxError> {
        let mut state = self.store.state();
        if state.fail_ensure_index {
            return Err(InjectedFault("createIndexes failed").into());
        }
        let collection = state
            .collection
            .as_mut()
            .ok_or(InjectedFault("ns not found"))?;
        if !collection.indexes.iter().any(|i| i.name == index.name) {
            collection.indexes.push(IndexInfo {
                name: index.name.clone(),
                keys: vec![(index.field.clone(), if index.descending { -1 } else { 1 })],
                expire_after: None,
            });
        }
        Ok(())
    }

    fn insert(&mut self, record: &LogRecord) -> Result<(), BoxError> {
        let size = bson::to_vec(record)?.len() as u64;
        let mut state = self.store.state();
        state.insert_attempts += 1;
        if state.gate_closed {
            state.waiting_inserts += 1;
            while state.gate_closed {
                self.store.shared.gate.wait(&mut state);
            }
            state.waiting_inserts -= 1;
        }
        self.check_alive(&state)?;
        if state.fail_inserts > 0 {
            state.fail_inserts -= 1;
            return Err(InjectedFault("write failed").into());
        }
        let collection = state.collection.get_or_insert_with(|| {
            // implicit creation yields an uncapped collection
            CappedCollection::new(&RetentionPolicy {
                collection: self.collection.clone(),
                max_documents: u64::MAX,
                max_bytes: u64::MAX,
            })
        });
        debug_assert_eq!(collection.name, self.collection);
        collection.push(record.clone(), size);
        Ok(())
    }

    fn close(self) -> Result<(), BoxError> {
        self.store.state().closes += 1;
        Ok(())
    }
}
