use std::time::Duration;

use rstest::{fixture, rstest};

use super::memory::MemoryStore;
use super::*;

#[fixture]
fn store() -> MemoryStore {
    MemoryStore::new()
}

fn ttl_index(name: &str) -> IndexInfo {
    IndexInfo {
        name: name.to_owned(),
        keys: vec![(TIME_FIELD.to_owned(), 1)],
        expire_after: Some(Duration::from_secs(86_400)),
    }
}

#[rstest]
fn open_creates_capped_collection_and_time_index(store: MemoryStore) {
    let manager = ConnectionManager::new(store.clone(), "");
    let conn = manager.open().expect("open succeeds");

    assert_eq!(conn.target().address(), "localhost/rlogs");
    assert_eq!(conn.collection(), LOG_COLLECTION);
    assert!(store.has_collection());
    let names: Vec<String> = store.indexes().into_iter().map(|i| i.name).collect();
    assert_eq!(names, vec!["_id_".to_string(), TIME_INDEX_NAME.to_string()]);
    assert_eq!(store.indexes()[1].keys, vec![(TIME_FIELD.to_string(), -1)]);
}

#[rstest]
#[case("", Consistency::Strong)]
#[case("db1,db2/logs?replicaSet=rs0", Consistency::Monotonic)]
#[case("db1/logs?replicaSet=", Consistency::Strong)]
fn policy_follows_replica_set(
    store: MemoryStore,
    #[case] descriptor: &str,
    #[case] consistency: Consistency,
) {
    let manager = ConnectionManager::new(store.clone(), descriptor);
    manager.open().expect("open succeeds");
    let policy = store.last_policy().expect("policy recorded");
    assert_eq!(policy.durability, Durability::Unacknowledged);
    assert_eq!(policy.consistency, consistency);
}

#[rstest]
fn conflicting_options_never_reach_the_store(store: MemoryStore) {
    let manager = ConnectionManager::new(
        store.clone(),
        "db/logs?w=majority&readPreference=nearest&readPreferenceTags=dc:ny&appName=svc",
    );
    manager.open().expect("open succeeds");
    let target = store.last_target().expect("target recorded");
    assert_eq!(target.option("w"), None);
    assert_eq!(target.option("readPreference"), None);
    assert_eq!(target.option("readPreferenceTags"), None);
    assert_eq!(target.option("appName"), Some("svc"));
}

#[rstest]
fn target_rejected_by_store_is_config_error(store: MemoryStore) {
    store.reject_target(true);
    let manager = ConnectionManager::new(store.clone(), "db1/logs?connectTimeoutMS=abc");
    let err = manager.connect().expect_err("open must fail");
    match &err {
        LogError::Config(message) => assert!(
            message.starts_with("connection string (db1/logs) is not correct: "),
            "unexpected message {message}"
        ),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(store.opens(), 0);
}

#[rstest]
fn malformed_descriptor_is_config_error_without_opening(store: MemoryStore) {
    let manager = ConnectionManager::new(store.clone(), "db:notaport");
    let err = manager.open().expect_err("open must fail");
    assert!(matches!(err, LogError::Config(_)), "unexpected {err:?}");
    assert_eq!(store.opens(), 0);
}

#[rstest]
fn unreachable_store_names_the_address(store: MemoryStore) {
    store.fail_next_opens(1);
    let manager = ConnectionManager::new(store.clone(), "db1:27017/logs");
    let err = manager.open().expect_err("open must fail");
    assert!(
        err.to_string().starts_with("can't connect to db1:27017/logs: "),
        "unexpected message {err}"
    );
    assert!(matches!(err, LogError::Connection { .. }));
    assert_eq!(store.opens(), 0);
}

#[rstest]
fn existing_collection_is_not_an_error(store: MemoryStore) {
    store.seed_collection(&RetentionPolicy::default());
    store.deny_create(true);
    let manager = ConnectionManager::new(store.clone(), "");
    manager.open().expect("existing collection is fine");
}

#[rstest]
fn collection_creation_failure_aborts_and_closes_session(store: MemoryStore) {
    store.deny_create(true);
    let manager = ConnectionManager::new(store.clone(), "");
    let err = manager.open().expect_err("open must fail");
    match &err {
        LogError::CollectionSetup { collection, .. } => assert_eq!(collection, LOG_COLLECTION),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(store.opens(), 1);
    assert_eq!(store.closes(), 1);
}

#[rstest]
fn every_ttl_index_is_dropped(store: MemoryStore) {
    store.seed_collection(&RetentionPolicy::default());
    store.seed_index(ttl_index("Time_1"));
    store.seed_index(ttl_index("expires"));
    let manager = ConnectionManager::new(store.clone(), "");
    manager.open().expect("open succeeds");
    assert!(store.indexes().iter().all(|index| !index.is_ttl()));
}

#[rstest]
fn index_maintenance_failure_is_logged_not_fatal(store: MemoryStore) {
    store.fail_list_indexes(true);
    store.fail_ensure_index(true);
    let manager = ConnectionManager::new(store.clone(), "");
    manager.open().expect("index failures do not abort the dial");
}

#[rstest]
fn custom_retention_bounds_are_applied(store: MemoryStore) {
    let retention = RetentionPolicy {
        collection: "Audit".into(),
        max_documents: 2,
        max_bytes: MAX_BYTES,
    };
    let manager = ConnectionManager::new(store.clone(), "").with_retention(retention);
    let mut conn = manager.open().expect("open succeeds");
    for n in 0..3 {
        let record = LogRecord::new(
            crate::priority::Priority::default(),
            "host",
            "svc",
            &format!("m{n}"),
        );
        manager.send(&mut conn, &record).expect("insert succeeds");
    }
    assert_eq!(store.messages(), vec!["m1".to_string(), "m2".to_string()]);
}

#[rstest]
fn connector_address_falls_back_to_descriptor(store: MemoryStore) {
    let manager = ConnectionManager::new(store, "db:bad");
    assert_eq!(manager.address(), "db:bad");
}
