//! External tabular adapters.

mod common;

use canto::collection::ArrayStore;
use canto::{CollectionError, Redirection, RowSequence, Value, VecCursor};
use common::context;
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn users() -> VecCursor {
    VecCursor::new(
        ["id", "name"],
        vec![
            vec![Value::Int(1), Value::text("ada")],
            vec![Value::Int(2), Value::text("bob")],
            vec![Value::Int(3), Value::text("cy")],
        ],
    )
}

#[test]
fn size_materializes_once() {
    let cursor = users();
    let advanced = cursor.advance_counter();
    let sequence = RowSequence::new(cursor);

    assert_eq!(sequence.len().unwrap(), 3);
    // Three rows plus the call that found the end.
    assert_eq!(advanced.load(Ordering::Relaxed), 4);
    assert!(sequence.is_materialized());

    let first = sequence.get(0).unwrap();
    assert_eq!(
        first.as_table().unwrap().get("name").unwrap(),
        Some(Value::text("ada"))
    );
    assert_eq!(sequence.len().unwrap(), 3);
    assert_eq!(advanced.load(Ordering::Relaxed), 4);
}

#[test]
fn adapters_reject_every_mutation() {
    let array = RowSequence::new(users()).into_array();
    let immutable = CollectionError::Immutable { what: "row sequence" };
    assert_eq!(array.set(0, Value::Null), Err(immutable.clone()));
    assert_eq!(array.add(Value::Null), Err(immutable.clone()));
    assert_eq!(array.remove(0), Err(immutable));
    assert!(!array.is_growable());
    assert_eq!(array.size().unwrap(), 3);

    let row = array.get(1).unwrap();
    let row = row.as_table().unwrap();
    let immutable = CollectionError::Immutable { what: "row" };
    assert_eq!(row.put("name", Value::text("eve")), Err(immutable.clone()));
    assert_eq!(row.set("extra", Value::Int(1)), Err(immutable));
    assert_eq!(row.get("name").unwrap(), Some(Value::text("bob")));
}

#[test]
fn streamed_rows_go_stale() {
    let sequence = RowSequence::new(users());
    let mut rows = sequence.rows();
    let first = rows.next().unwrap().unwrap();
    let first = first.as_table().unwrap().clone();
    assert_eq!(first.get("id").unwrap(), Some(Value::Int(1)));

    rows.next().unwrap().unwrap();
    assert_eq!(first.size().unwrap(), 2);
    assert_eq!(first.get("id"), Err(CollectionError::StaleRow { row: 1 }));

    // Random access needs the rows the stream already passed.
    assert_eq!(sequence.get(0), Err(CollectionError::Consumed));
}

#[test]
fn copy_of_rows_is_mutable() {
    let array = RowSequence::new(users()).into_array();
    let copy = array.copy().unwrap();
    assert!(copy.is_growable());
    copy.add(Value::Null).unwrap();
    assert_eq!(copy.size().unwrap(), 4);
    assert_eq!(array.size().unwrap(), 3);
}

#[test]
fn external_definition_backed_by_rows() {
    let source = |full_name: &str, _arguments: &[Value]| -> Option<Result<Value, Redirection>> {
        (full_name == "main.users").then(|| Ok(RowSequence::new(users()).into()))
    };
    let mut context = context(
        "external users[]
        first_name = users[0].name
        last_id = users[2][\"id\"]",
    )
    .with_external_source(Arc::new(source));

    assert_eq!(context.construct("first_name", &[]).unwrap(), Value::text("ada"));
    assert_eq!(context.construct("last_id", &[]).unwrap(), Value::Int(3));

    let users = context.construct("users", &[]).unwrap();
    assert_eq!(users.as_array().unwrap().size().unwrap(), 3);
    assert_eq!(users, context.construct("users", &[]).unwrap());
}
