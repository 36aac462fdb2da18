//! MongoDB binding for the document store traits.
//!
//! Uses the synchronous driver API so writes happen on the caller's thread,
//! under the writer lock.

use std::time::Duration;

use bson::{Bson, Document, doc};
use mongodb::{
    IndexModel,
    error::{Error as MongoError, ErrorKind},
    options::{
        Acknowledgment, ClientOptions, CollectionOptions, IndexOptions, ReadPreference,
        SelectionCriteria, WriteConcern,
    },
    sync::{Client, Collection, Database},
};

use crate::{
    error::{BoxError, CreateCollectionError, LogError, OpenError},
    priority::Priority,
    record::LogRecord,
    writer::Writer,
};

use super::{
    Consistency, ConnectionManager, ConnectionTarget, DocumentStore, Durability, IndexInfo,
    RetentionPolicy, SessionPolicy, StoreSession, TimeIndex,
};

/// Server error code for `NamespaceExists`.
const NAMESPACE_EXISTS: i32 = 48;
/// Applied when the target sets no server selection or connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Writer persisting records into a MongoDB capped collection.
pub type MongoWriter = Writer<ConnectionManager<MongoStore>>;

/// Dial a MongoDB writer.
///
/// `target` is a descriptor such as `db1:27017,db2/logs?replicaSet=rs0`; an
/// empty string targets `localhost/rlogs`.
///
/// # Errors
///
/// Returns [`LogError::Config`] for a malformed descriptor,
/// [`LogError::Connection`] when no server answers and
/// [`LogError::CollectionSetup`] when the capped collection cannot be made.
pub fn dial(target: &str, priority: Priority, tag: &str) -> Result<MongoWriter, LogError> {
    Writer::dial(ConnectionManager::new(MongoStore, target), priority, tag)
}

/// Dial the default local target.
///
/// # Errors
///
/// See [`dial`].
pub fn new(priority: Priority, tag: &str) -> Result<MongoWriter, LogError> {
    dial("", priority, tag)
}

/// [`DocumentStore`] backed by the official MongoDB driver.
#[derive(Clone, Copy, Debug, Default)]
pub struct MongoStore;

impl DocumentStore for MongoStore {
    type Session = MongoSession;

    fn open(
        &self,
        target: &ConnectionTarget,
        policy: &SessionPolicy,
        collection: &str,
    ) -> Result<MongoSession, OpenError> {
        let mut options = ClientOptions::parse(target.uri())
            .run()
            .map_err(open_error)?;
        options
            .server_selection_timeout
            .get_or_insert(DEFAULT_CONNECT_TIMEOUT);
        options.connect_timeout.get_or_insert(DEFAULT_CONNECT_TIMEOUT);
        options.selection_criteria = Some(SelectionCriteria::ReadPreference(
            read_preference(policy.consistency),
        ));

        let client = Client::with_options(options).map_err(open_error)?;
        let database = client.database(target.database());
        if let Err(err) = database.run_command(doc! { "ping": 1 }).run() {
            drop(database);
            shutdown(client);
            return Err(open_error(err));
        }

        // setup commands stay acknowledged so their errors are observable
        let mut insert_options = CollectionOptions::default();
        insert_options.write_concern = Some(write_concern(policy.durability));
        let records = database.collection_with_options::<LogRecord>(collection, insert_options);
        let setup = database.collection::<Document>(collection);
        Ok(MongoSession {
            client,
            database,
            records,
            setup,
        })
    }
}

/// Driver argument errors mean the URI itself is unusable.
fn open_error(err: MongoError) -> OpenError {
    if matches!(err.kind.as_ref(), ErrorKind::InvalidArgument { .. }) {
        OpenError::InvalidTarget(err.into())
    } else {
        OpenError::Unreachable(err.into())
    }
}

/// Close the client's pooled connections and stop its monitors.
///
/// Dropping a client only schedules cleanup in the background.
fn shutdown(client: Client) {
    client.shutdown().immediate(true).run();
}

fn write_concern(durability: Durability) -> WriteConcern {
    let mut concern = WriteConcern::default();
    concern.w = Some(match durability {
        Durability::Unacknowledged => Acknowledgment::Nodes(0),
    });
    concern
}

fn read_preference(consistency: Consistency) -> ReadPreference {
    match consistency {
        Consistency::Strong => ReadPreference::Primary,
        Consistency::Monotonic => ReadPreference::PrimaryPreferred { options: None },
    }
}

/// Open MongoDB client bound to the log collection.
#[derive(Debug)]
pub struct MongoSession {
    client: Client,
    database: Database,
    records: Collection<LogRecord>,
    setup: Collection<Document>,
}

impl MongoSession {
    /// Handle used for inserts, carrying the session's write concern.
    pub fn collection(&self) -> &Collection<LogRecord> {
        &self.records
    }
}

impl StoreSession for MongoSession {
    fn create_capped_collection(
        &mut self,
        retention: &RetentionPolicy,
    ) -> Result<(), CreateCollectionError> {
        self.database
            .create_collection(&retention.collection)
            .capped(true)
            .max(retention.max_documents)
            .size(retention.max_bytes)
            .run()
            .map_err(|err| {
                if is_namespace_exists(&err) {
                    CreateCollectionError::AlreadyExists
                } else {
                    CreateCollectionError::Other(err.into())
                }
            })
    }

    fn list_indexes(&mut self) -> Result<Vec<IndexInfo>, BoxError> {
        let mut indexes = Vec::new();
        for model in self.setup.list_indexes().run()? {
            indexes.push(index_info(model?));
        }
        Ok(indexes)
    }

    fn drop_index(&mut self, name: &str) -> Result<(), BoxError> {
        self.setup.drop_index(name).run()?;
        Ok(())
    }

    fn ensure_index(&mut self, index: &TimeIndex) -> Result<(), BoxError> {
        let direction = if index.descending { -1 } else { 1 };
        let mut keys = Document::new();
        keys.insert(index.field.clone(), direction);
        let options = IndexOptions::builder()
            .name(index.name.clone())
            .background(index.background)
            .build();
        let model = IndexModel::builder().keys(keys).options(options).build();
        // createIndexes is a no-op when an identical index exists
        self.setup.create_index(model).run()?;
        Ok(())
    }

    fn insert(&mut self, record: &LogRecord) -> Result<(), BoxError> {
        self.records.insert_one(record).run()?;
        Ok(())
    }

    fn close(self) -> Result<(), BoxError> {
        drop(self.records);
        drop(self.setup);
        drop(self.database);
        shutdown(self.client);
        Ok(())
    }
}

fn is_namespace_exists(err: &MongoError) -> bool {
    matches!(err.kind.as_ref(), ErrorKind::Command(command) if command.code == NAMESPACE_EXISTS)
}

fn index_info(model: IndexModel) -> IndexInfo {
    let keys = model
        .keys
        .iter()
        .map(|(field, value)| (field.clone(), key_direction(value)))
        .collect();
    let (name, expire_after) = match model.options {
        Some(options) => (options.name.unwrap_or_default(), options.expire_after),
        None => (String::new(), None),
    };
    IndexInfo {
        name,
        keys,
        expire_after,
    }
}

fn key_direction(value: &Bson) -> i32 {
    match value {
        Bson::Int32(v) => *v,
        Bson::Int64(v) => i32::try_from(*v).unwrap_or(1),
        Bson::Double(v) if *v < 0.0 => -1,
        Bson::Double(_) => 1,
        // text and hashed indexes use string keys
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("mongodb://db1/logs?connectTimeoutMS=abc")]
    #[case("mongodb://db1/logs?readPreferenceTags=dc:ny")]
    fn unusable_uri_is_an_invalid_target(#[case] uri: &str) {
        let err = ClientOptions::parse(uri)
            .run()
            .expect_err("driver rejects the uri");
        assert!(
            matches!(open_error(err), OpenError::InvalidTarget(_)),
            "{uri} should be rejected as a target"
        );
    }

    #[rstest]
    fn stripped_read_preference_options_parse() {
        let mut target = ConnectionTarget::parse(
            "db1/logs?readPreference=secondary&readPreferenceTags=dc:ny&maxStalenessSeconds=120",
        )
        .expect("valid target");
        target.strip_conflicting_options();
        ClientOptions::parse(target.uri())
            .run()
            .expect("driver accepts the stripped uri");
    }

    #[rstest]
    fn unacknowledged_writes_use_w0() {
        let concern = write_concern(Durability::Unacknowledged);
        assert_eq!(concern.w, Some(Acknowledgment::Nodes(0)));
    }

    #[rstest]
    #[case(Consistency::Strong, "Primary")]
    #[case(Consistency::Monotonic, "PrimaryPreferred")]
    fn consistency_maps_to_read_preference(#[case] consistency: Consistency, #[case] want: &str) {
        let pref = format!("{:?}", read_preference(consistency));
        assert!(pref.starts_with(want), "got {pref}");
    }

    #[rstest]
    #[case(Bson::Int32(-1), -1)]
    #[case(Bson::Int64(1), 1)]
    #[case(Bson::Double(-1.0), -1)]
    #[case(Bson::String("hashed".into()), 0)]
    fn reads_index_key_direction(#[case] value: Bson, #[case] want: i32) {
        assert_eq!(key_direction(&value), want);
    }

    #[rstest]
    fn index_model_with_expiry_is_ttl() {
        let options = IndexOptions::builder()
            .name("Time_1".to_string())
            .expire_after(Duration::from_secs(3600))
            .build();
        let model = IndexModel::builder()
            .keys(doc! { "Time": 1 })
            .options(options)
            .build();
        let info = index_info(model);
        assert_eq!(info.name, "Time_1");
        assert_eq!(info.keys, vec![("Time".to_string(), 1)]);
        assert!(info.is_ttl());
    }
}
