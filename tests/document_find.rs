mod common;

use common::User;
use docstore::{
    AttributeMap, BatchMode, Document, FixedClock, JsonSerializer, MemoryStorage, RepoError,
    Repository, SerializeResult, Serializer, Value,
};
use std::cell::Cell;
use uuid::Uuid;

const T1: i64 = 1_700_000_000_000;

/// Serializer wrapper counting parse invocations.
struct CountingSerializer {
    inner: JsonSerializer,
    parses: Cell<usize>,
}

impl CountingSerializer {
    fn new() -> Self {
        Self {
            inner: JsonSerializer::new(),
            parses: Cell::new(0),
        }
    }
}

impl Serializer for &CountingSerializer {
    fn generate(&self, attributes: &AttributeMap) -> SerializeResult<String> {
        self.inner.generate(attributes)
    }

    fn parse(&self, blob: &str) -> SerializeResult<AttributeMap> {
        self.parses.set(self.parses.get() + 1);
        self.inner.parse(blob)
    }
}

#[test]
fn find_restores_attributes_and_reserved_fields() {
    let storage = MemoryStorage::new();
    let repository = Repository::new(&storage, JsonSerializer::new()).with_clock(FixedClock(T1));

    let owner = Uuid::new_v4();
    let mut saved = User::with_name("Stewie");
    saved.fields_mut().set("age", 1_i64).unwrap();
    saved.fields_mut().set("owner_id", owner).unwrap();
    repository.save(&mut saved).unwrap();

    let mut found: User = repository.find(1).unwrap();
    assert_eq!(found.id(), Some(1));
    assert_eq!(found.fields().created_at(), Some(T1));
    assert_eq!(found.fields().updated_at(), Some(T1));
    assert!(!found.new_record());
    assert_eq!(found.name(), "Stewie");
    assert_eq!(
        found.fields_mut().get("age").unwrap(),
        &Value::Integer(1)
    );
    // The identifier came back from JSON as text; typecasting restored it.
    assert_eq!(
        found.fields_mut().get("owner_id").unwrap(),
        &Value::Uuid(owner)
    );
}

#[test]
fn find_missing_id_reports_class_table_and_id() {
    let storage = MemoryStorage::new();
    let repository = Repository::new(&storage, JsonSerializer::new());

    let err = repository.find::<User>(1).unwrap_err();
    match err {
        RepoError::RecordNotFound { table, ids } => {
            assert_eq!(table, "users");
            assert_eq!(ids, vec![1]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn find_many_returns_documents_in_storage_order() {
    let storage = MemoryStorage::new();
    let serializer = CountingSerializer::new();
    let repository = Repository::new(&storage, &serializer).with_clock(FixedClock(T1));

    let mut first = User::with_name("Stewie");
    let mut second = User::with_name("Brian");
    repository.save(&mut first).unwrap();
    repository.save(&mut second).unwrap();

    serializer.parses.set(0);
    let found: Vec<User> = repository.find_many(&[2, 1]).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].name(), "Stewie");
    assert_eq!(found[1].name(), "Brian");
    assert_eq!(found[0].id(), Some(1));
    assert_eq!(found[1].id(), Some(2));
    // One parse per returned row.
    assert_eq!(serializer.parses.get(), 2);
}

#[test]
fn find_many_with_no_matches_reports_the_whole_id_set() {
    let storage = MemoryStorage::new();
    let repository = Repository::new(&storage, JsonSerializer::new());

    let err = repository.find_many::<User>(&[1, 2, 3]).unwrap_err();
    match err {
        RepoError::RecordNotFound { table, ids } => {
            assert_eq!(table, "users");
            assert_eq!(ids, vec![1, 2, 3]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn lenient_batch_returns_partial_results() {
    let storage = MemoryStorage::new();
    let repository = Repository::new(&storage, JsonSerializer::new()).with_clock(FixedClock(T1));

    let mut user = User::with_name("Stewie");
    repository.save(&mut user).unwrap();

    let found: Vec<User> = repository.find_many(&[1, 999]).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), Some(1));
}

#[test]
fn strict_batch_names_exactly_the_missing_ids() {
    let storage = MemoryStorage::new();
    let repository = Repository::new(&storage, JsonSerializer::new())
        .with_clock(FixedClock(T1))
        .with_batch_mode(BatchMode::Strict);

    let mut user = User::with_name("Stewie");
    repository.save(&mut user).unwrap();

    let err = repository.find_many::<User>(&[1, 999]).unwrap_err();
    match err {
        RepoError::RecordNotFound { table, ids } => {
            assert_eq!(table, "users");
            assert_eq!(ids, vec![999]);
        }
        other => panic!("unexpected error: {other}"),
    }
}
