//! Object wrappers over constructed definitions and raw constructions.

mod common;

use canto::definition::Construction;
use canto::parser::{ParsedBody, ParsedItem, parse_source};
use canto::{ObjectError, ObjectWrapper, Value};
use common::{build, context};

const SITE: &str = "
    page {
        title = \"home\"
        visible = true
        count = \"42\"
        ratio = 1.5
        empty = null
        meta = { lang = \"en\" }
        header {
            text = \"welcome\"
        }
        greet(name) = name
    }
";

fn page() -> ObjectWrapper {
    let mut context = context(SITE);
    match context.construct("page", &[]).unwrap() {
        Value::Object(object) => object,
        other => panic!("expected an object, got {other:?}"),
    }
}

#[test]
fn compound_names_recurse() {
    let page = page();
    assert_eq!(page.child_data("header.text", &[]).unwrap(), Value::text("welcome"));
    assert_eq!(page.child_data("meta.lang", &[]).unwrap(), Value::text("en"));
    assert_eq!(
        page.child_data("greet", &[Value::text("ada")]).unwrap(),
        Value::text("ada")
    );
}

#[test]
fn typed_accessors_default_on_redirections() {
    let page = page();
    assert!(page.child_boolean("visible"));
    assert!(!page.child_boolean("missing"));
    assert!(!page.child_boolean("empty"));
    assert_eq!(page.child_text("title").as_deref(), Some("home"));
    assert_eq!(page.child_text("missing"), None);
    assert_eq!(page.child_text("empty"), None);
}

#[test]
fn integer_accessor_never_defaults() {
    let page = page();
    assert_eq!(page.child_int("count"), Ok(42));
    assert_eq!(
        page.child_int("title"),
        Err(ObjectError::NumberFormat {
            name: "title".to_string(),
            text: Some("home".to_string()),
        })
    );
    assert_eq!(
        page.child_int("ratio"),
        Err(ObjectError::NumberFormat {
            name: "ratio".to_string(),
            text: Some("1.5".to_string()),
        })
    );
    assert_eq!(
        page.child_int("missing"),
        Err(ObjectError::NumberFormat {
            name: "missing".to_string(),
            text: None,
        })
    );
}

#[test]
fn child_definitions_are_checked_without_construction() {
    let page = page();
    assert!(page.is_child_defined("title"));
    assert!(page.is_child_defined("header.text"));
    assert!(!page.is_child_defined("header.missing"));
    assert!(!page.is_child_defined("meta.lang"));
}

#[test]
fn wrapper_data_is_the_instance() {
    let page = page();
    assert_eq!(page.data().unwrap(), Value::Object(page.clone()));
    assert_eq!(format!("{page:?}"), "object main.page");
}

#[test]
fn wrapping_a_raw_construction() {
    let (graph, site) = build(SITE);
    let items = parse_source("probe = page.header").unwrap();
    let [ParsedItem::Definition(probe)] = items.as_slice() else {
        panic!("expected one definition");
    };
    let ParsedBody::Expression(body) = &probe.body else {
        panic!("expected an expression body");
    };

    let wrapper = ObjectWrapper::from_construction(Construction::from(body), graph, site);
    assert_eq!(wrapper.child_text("text").as_deref(), Some("welcome"));
    assert!(matches!(wrapper.data().unwrap(), Value::Object(_)));
    assert!(wrapper.definition().is_none());
}
