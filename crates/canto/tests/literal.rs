//! Run-time collection literals.

mod common;

use canto::context::Frame;
use canto::{CollectionError, Value, parse_array, parse_table};
use common::context;

#[test]
fn array_literal() {
    let context = context("unused = 0");
    let array = parse_array(&context, "[1, 2, 3]").unwrap();
    assert_eq!(array.size().unwrap(), 3);
    assert_eq!(
        array.to_vec().unwrap(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
    assert!(array.is_growable());
    array.add(Value::Int(4)).unwrap();
    assert_eq!(array.size().unwrap(), 4);
}

#[test]
fn table_literal() {
    let context = context("unused = 0");
    let table = parse_table(&context, "{a=1, b=2}").unwrap();
    assert_eq!(table.size().unwrap(), 2);
    assert_eq!(table.get("a").unwrap(), Some(Value::Int(1)));
    assert_eq!(table.get("b").unwrap(), Some(Value::Int(2)));
}

#[test]
fn literal_resolves_from_current_frame() {
    let mut context = context(
        "limit = 10
        page {
            limit = 20
            title = \"home\"
        }",
    );
    assert_eq!(
        parse_array(&context, "[limit]").unwrap().to_vec().unwrap(),
        vec![Value::Int(10)]
    );

    let page = context.graph().find(context.peek(), "page").unwrap();
    context.push(Frame::new(page, &[]));
    let table = parse_table(&context, "{limit = limit, title = title}").unwrap();
    assert_eq!(table.get("limit").unwrap(), Some(Value::Int(20)));
    assert_eq!(table.get("title").unwrap(), Some(Value::text("home")));
    context.pop();
}

#[test]
fn nested_literals() {
    let context = context("unused = 0");
    let array = parse_array(&context, "[[1, 2], {x = \"y\"}]").unwrap();
    let first = array.get(0).unwrap();
    assert_eq!(first.as_array().unwrap().size().unwrap(), 2);
    let second = array.get(1).unwrap();
    assert_eq!(second.as_table().unwrap().get("x").unwrap(), Some(Value::text("y")));
    assert_eq!(
        array.get(2),
        Err(CollectionError::OutOfBounds { index: 2, size: 2 })
    );
}

#[test]
fn problems_are_joined_into_one_redirection() {
    let context = context("unused = 0");
    let redirection = parse_array(&context, "[a, b]").unwrap_err();
    assert!(redirection.is_standard_error());
    let message = redirection.message();
    assert!(message.starts_with("Problems parsing array: "));
    assert!(message.contains("undefined name 'a'"));
    assert!(message.contains("undefined name 'b'"));
    assert_eq!(message.lines().count(), 2);
}
