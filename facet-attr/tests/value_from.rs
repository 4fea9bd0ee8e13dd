//! Tests for converting domain values to attribute trees (`value_from`).

use facet::Facet;
use facet_attr::{
    AttrErrorKind, AttrType, EmptyPolicy, ErrorClass, Number, Options, Unknowable, type_of,
    value_from,
};
use facet_attr_testhelpers::setup;
use insta::assert_snapshot;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Facet, Debug, PartialEq)]
struct Pair {
    #[facet(rename = "a")]
    a: Option<String>,
    #[facet(rename = "b")]
    b: Vec<i64>,
}

#[derive(Facet, Debug)]
struct Inner {
    #[facet(rename = "value")]
    value: Vec<u16>,
}

#[derive(Facet, Debug)]
struct Middle {
    #[facet(rename = "inner")]
    inner: Option<Inner>,
}

#[derive(Facet, Debug)]
struct Outer {
    #[facet(rename = "middle")]
    middle: Option<Middle>,
}

// ---------------------------------------------------------------------------
// Typing of absent values
// ---------------------------------------------------------------------------

#[test]
fn none_and_empty_keep_their_types() {
    setup();

    let tree = value_from(&Pair { a: None, b: vec![] }, &Options::default()).unwrap();
    assert_snapshot!(tree, @r#"{"a": null, "b": []}"#);
    assert_snapshot!(tree.ty(), @"object{a: string, b: list<number>}");

    let a = tree.attribute("a").unwrap();
    assert!(a.is_null());
    assert_eq!(a.ty(), &AttrType::String);
    assert!(tree.attribute("b").unwrap().is_known());
}

#[test]
fn known_values() {
    setup();

    let pair = Pair {
        a: Some("x".to_owned()),
        b: vec![3, -1],
    };
    let tree = value_from(&pair, &Options::default()).unwrap();
    assert_snapshot!(tree, @r#"{"a": "x", "b": [3, -1]}"#);
    assert_eq!(
        tree.attribute("b").unwrap().elements().unwrap()[1].as_number(),
        Some(Number::Int(-1))
    );
    tree.validate().unwrap();
}

#[test]
fn nested_none_is_typed_all_the_way_down() {
    setup();

    let tree = value_from(&Outer { middle: None }, &Options::default()).unwrap();
    assert_snapshot!(tree, @r#"{"middle": null}"#);
    assert_snapshot!(tree.ty(), @"object{middle: object{inner: object{value: list<number>}}}");

    let half = Outer {
        middle: Some(Middle { inner: None }),
    };
    let tree = value_from(&half, &Options::default()).unwrap();
    assert_snapshot!(tree, @r#"{"middle": {"inner": null}}"#);
    assert_eq!(
        tree.ty(),
        &type_of::<Outer>(&Options::default()).unwrap()
    );
}

#[test]
fn type_of_matches_every_value() {
    setup();

    let options = Options::default();
    let expected = type_of::<Pair>(&options).unwrap();
    for pair in [
        Pair { a: None, b: vec![] },
        Pair {
            a: Some("y".to_owned()),
            b: vec![1, 2, 3],
        },
    ] {
        assert_eq!(value_from(&pair, &options).unwrap().ty(), &expected);
    }
}

// ---------------------------------------------------------------------------
// Unknowable
// ---------------------------------------------------------------------------

#[derive(Facet, Debug, PartialEq)]
struct Endpoint {
    #[facet(rename = "address")]
    address: Unknowable<String>,
    #[facet(rename = "tags")]
    tags: Unknowable<Vec<String>>,
}

#[test]
fn unknowable_states() {
    setup();

    let endpoint = Endpoint {
        address: Unknowable::unknown(),
        tags: Unknowable::known(vec!["edge".to_owned()]),
    };
    let tree = value_from(&endpoint, &Options::default()).unwrap();
    assert_snapshot!(tree, @r#"{"address": unknown, "tags": ["edge"]}"#);
    assert_snapshot!(tree.ty(), @"object{address: string, tags: list<string>}");

    let endpoint = Endpoint {
        address: Unknowable::null(),
        tags: Unknowable::unknown(),
    };
    let tree = value_from(&endpoint, &Options::default()).unwrap();
    assert_snapshot!(tree, @r#"{"address": null, "tags": unknown}"#);
    let tags = tree.attribute("tags").unwrap();
    assert!(tags.is_unknown());
    assert_eq!(tags.ty(), &AttrType::list(AttrType::String));
}

#[test]
fn unknown_wins_over_null() {
    setup();

    let value: Unknowable<Option<u8>> = Unknowable::unknown();
    let tree = value_from(&value, &Options::default()).unwrap();
    assert!(tree.is_unknown());
    assert_eq!(tree.ty(), &AttrType::Number);
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

#[test]
fn map_entries_ascend() {
    setup();

    let mut map = HashMap::new();
    map.insert("b".to_owned(), 2i64);
    map.insert("a".to_owned(), 1i64);

    let tree = value_from(&map, &Options::default()).unwrap();
    assert_snapshot!(tree, @r#"{"a": 1, "b": 2}"#);
    assert_snapshot!(tree.ty(), @"map<number>");
    let keys: Vec<&str> = tree.entries().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, ["a", "b"]);
}

#[test]
fn set_elements_ascend() {
    setup();

    let set: HashSet<String> = ["zeta", "alpha", "mu"].into_iter().map(String::from).collect();
    let tree = value_from(&set, &Options::default()).unwrap();
    assert_snapshot!(tree, @r#"["alpha", "mu", "zeta"]"#);
    assert_snapshot!(tree.ty(), @"set<string>");

    let empty: BTreeSet<u8> = BTreeSet::new();
    let tree = value_from(&empty, &Options::default()).unwrap();
    assert_snapshot!(tree.ty(), @"set<number>");
}

#[test]
fn lists_of_chosen_elements_become_sets() {
    setup();

    let names = vec!["b".to_owned(), "a".to_owned()];
    let options = Options::default().set_elements::<String>();
    let tree = value_from(&names, &options).unwrap();
    assert_snapshot!(tree.ty(), @"set<string>");

    let ports = vec![1u16];
    let tree = value_from(&ports, &options).unwrap();
    assert_snapshot!(tree.ty(), @"list<number>");
}

#[test]
fn empty_policy_decides_per_path() {
    setup();

    let options = Options::default().empty_as_null_when(|path, _| {
        if path.to_string() == ".b" {
            EmptyPolicy::Null
        } else {
            EmptyPolicy::Empty
        }
    });
    let tree = value_from(&Pair { a: None, b: vec![] }, &options).unwrap();
    assert_snapshot!(tree, @r#"{"a": null, "b": null}"#);
    assert_eq!(
        tree.attribute("b").unwrap().ty(),
        &AttrType::list(AttrType::Number)
    );

    let tree = value_from(&Pair { a: None, b: vec![7] }, &options).unwrap();
    assert_snapshot!(tree, @r#"{"a": null, "b": [7]}"#);
}

#[test]
fn arrays_are_lists() {
    setup();

    let tree = value_from(&[1.5f64, 2.0], &Options::default()).unwrap();
    assert_snapshot!(tree, @"[1.5, 2]");
    assert_snapshot!(tree.ty(), @"list<number>");
}

// ---------------------------------------------------------------------------
// Skipped fields
// ---------------------------------------------------------------------------

#[derive(Facet, Debug, PartialEq)]
struct Account {
    #[facet(rename = "id")]
    id: u32,
    #[facet(skip)]
    cache: String,
}

#[test]
fn skipped_fields_are_not_attributes() {
    setup();

    let account = Account {
        id: 9,
        cache: "warm".to_owned(),
    };
    let tree = value_from(&account, &Options::default()).unwrap();
    assert_snapshot!(tree, @r#"{"id": 9}"#);
}

// ---------------------------------------------------------------------------
// Invariant violations
// ---------------------------------------------------------------------------

#[derive(Facet, Debug)]
struct Unnamed {
    value: u8,
}

#[derive(Facet, Debug)]
struct Wrapper {
    #[facet(rename = "middle")]
    middle: Option<Holder>,
}

#[derive(Facet, Debug)]
struct Holder {
    #[facet(rename = "inner")]
    inner: Option<Unnamed>,
}

#[test]
fn missing_attribute_name_is_an_invariant_violation() {
    setup();

    let value = Wrapper {
        middle: Some(Holder {
            inner: Some(Unnamed { value: 1 }),
        }),
    };
    let err = value_from(&value, &Options::default()).unwrap_err();
    assert!(err.is_invariant_violation());
    assert!(matches!(
        err.kind(),
        AttrErrorKind::MissingAttributeName { field: "value", .. }
    ));
    assert_snapshot!(err.path(), @".*middle.*inner.value");

    // The type is broken even where no value is present.
    let err = value_from(&Wrapper { middle: None }, &Options::default()).unwrap_err();
    assert!(err.is_invariant_violation());
    assert_snapshot!(err.path(), @".*middle.*inner.value");
}

#[derive(Facet, Debug)]
struct Chain {
    #[facet(rename = "next")]
    next: Option<Box<Chain>>,
}

#[test]
fn recursive_types_are_rejected() {
    setup();

    let err = type_of::<Chain>(&Options::default()).unwrap_err();
    assert!(matches!(err.kind(), AttrErrorKind::RecursiveType { .. }));
    assert_eq!(err.class(), ErrorClass::InvariantViolation);

    let chain = Chain {
        next: Some(Box::new(Chain { next: None })),
    };
    let err = value_from(&chain, &Options::default()).unwrap_err();
    assert!(matches!(err.kind(), AttrErrorKind::RecursiveType { .. }));
}

#[test]
fn numbers_too_wide_are_refused() {
    setup();

    let tree = value_from(&u128::from(u64::MAX), &Options::default()).unwrap();
    assert_eq!(tree.as_number(), Some(Number::UInt(u64::MAX)));

    let err = value_from(&u128::MAX, &Options::default()).unwrap_err();
    assert!(matches!(err.kind(), AttrErrorKind::Inexact { .. }));
    assert_eq!(err.class(), ErrorClass::Conversion);
}
