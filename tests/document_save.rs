mod common;

use common::User;
use docstore::{
    Document, FixedClock, JsonSerializer, MemoryStorage, RepoError, Repository, Serializer,
    Value,
};
use uuid::Uuid;

const T1: i64 = 1_700_000_000_000;
const T2: i64 = 1_700_000_100_000;

#[test]
fn insert_writes_payload_and_both_timestamps_from_one_instant() {
    let storage = MemoryStorage::new();
    let repository = Repository::new(&storage, JsonSerializer::new()).with_clock(FixedClock(T1));

    let mut user = User::with_name("Stewie");
    repository.save(&mut user).unwrap();

    let rows = storage.rows("users");
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.len(), 4);
    assert_eq!(row.get("id"), Some(&Value::Integer(1)));
    assert_eq!(row.get("created_at"), Some(&Value::Integer(T1)));
    assert_eq!(row.get("updated_at"), Some(&Value::Integer(T1)));

    let blob = row.get("attributes").and_then(Value::as_text).unwrap();
    let payload = JsonSerializer::new().parse(blob).unwrap();
    assert_eq!(payload.get("name"), Some(&Value::Text("Stewie".to_string())));
    assert_eq!(payload.get("age"), Some(&Value::Integer(0)));
    // Reserved fields stay out of the payload.
    assert!(!payload.contains_key("id"));
    assert!(!payload.contains_key("created_at"));
    assert!(!payload.contains_key("updated_at"));
}

#[test]
fn insert_mutates_the_document_in_place() {
    let storage = MemoryStorage::new();
    let repository = Repository::new(&storage, JsonSerializer::new()).with_clock(FixedClock(T1));

    let mut user = User::with_name("Stewie");
    assert!(user.new_record());
    repository.save(&mut user).unwrap();

    assert_eq!(user.id(), Some(1));
    assert_eq!(user.fields().created_at(), Some(T1));
    assert_eq!(user.fields().updated_at(), Some(T1));
    assert!(!user.new_record());
}

#[test]
fn insert_mirrors_indexed_fields_with_the_assigned_id() {
    let storage = MemoryStorage::new();
    let repository = Repository::new(&storage, JsonSerializer::new()).with_clock(FixedClock(T1));

    let mut user = User::with_name("Stewie");
    repository.save(&mut user).unwrap();

    let name_rows = storage.rows("index_users_on_name");
    assert_eq!(name_rows.len(), 1);
    assert_eq!(name_rows[0].len(), 2);
    assert_eq!(name_rows[0].get("id"), Some(&Value::Integer(1)));
    assert_eq!(
        name_rows[0].get("name"),
        Some(&Value::Text("Stewie".to_string()))
    );

    // The age index mirrors the lazily defaulted value.
    let age_rows = storage.rows("index_users_on_age");
    assert_eq!(age_rows.len(), 1);
    assert_eq!(age_rows[0].get("id"), Some(&Value::Integer(1)));
    assert_eq!(age_rows[0].get("age"), Some(&Value::Integer(0)));
}

#[test]
fn update_rewrites_payload_and_updated_at_only() {
    let storage = MemoryStorage::new();
    let first_save =
        Repository::new(&storage, JsonSerializer::new()).with_clock(FixedClock(T1));
    let second_save =
        Repository::new(&storage, JsonSerializer::new()).with_clock(FixedClock(T2));

    let mut user = User::with_name("Stewie");
    first_save.save(&mut user).unwrap();
    user.fields_mut().set("name", "Brian").unwrap();
    second_save.save(&mut user).unwrap();

    let rows = storage.rows("users");
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.get("created_at"), Some(&Value::Integer(T1)));
    assert_eq!(row.get("updated_at"), Some(&Value::Integer(T2)));
    let payload = JsonSerializer::new()
        .parse(row.get("attributes").and_then(Value::as_text).unwrap())
        .unwrap();
    assert_eq!(payload.get("name"), Some(&Value::Text("Brian".to_string())));

    assert_eq!(user.id(), Some(1));
    assert_eq!(user.fields().created_at(), Some(T1));
    assert_eq!(user.fields().updated_at(), Some(T2));
}

#[test]
fn update_rewrites_index_rows_without_inserting_new_ones() {
    let storage = MemoryStorage::new();
    let first_save =
        Repository::new(&storage, JsonSerializer::new()).with_clock(FixedClock(T1));
    let second_save =
        Repository::new(&storage, JsonSerializer::new()).with_clock(FixedClock(T2));

    let mut user = User::with_name("Stewie");
    first_save.save(&mut user).unwrap();
    user.fields_mut().set("name", "Brian").unwrap();
    second_save.save(&mut user).unwrap();

    let name_rows = storage.rows("index_users_on_name");
    assert_eq!(name_rows.len(), 1);
    assert_eq!(name_rows[0].get("id"), Some(&Value::Integer(1)));
    assert_eq!(
        name_rows[0].get("name"),
        Some(&Value::Text("Brian".to_string()))
    );
}

#[test]
fn update_without_an_id_is_rejected() {
    let storage = MemoryStorage::new();
    let repository = Repository::new(&storage, JsonSerializer::new()).with_clock(FixedClock(T1));

    let mut user = User::with_name("Stewie");
    user.fields_mut().set_new_record(false);

    let err = repository.save(&mut user).unwrap_err();
    assert!(matches!(err, RepoError::MissingId { table: "users" }));
    assert!(storage.rows("users").is_empty());
}

#[test]
fn typed_identifier_fields_survive_a_save() {
    let storage = MemoryStorage::new();
    let repository = Repository::new(&storage, JsonSerializer::new()).with_clock(FixedClock(T1));

    let owner = Uuid::new_v4();
    let mut user = User::with_name("Stewie");
    // The setter accepts the string form and typecasts it.
    user.fields_mut()
        .set("owner_id", owner.to_string())
        .unwrap();
    repository.save(&mut user).unwrap();

    assert_eq!(
        user.fields_mut().get("owner_id").unwrap(),
        &Value::Uuid(owner)
    );
}
