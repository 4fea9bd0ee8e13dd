//! Tests for reading attribute trees back into domain values (`value_to`).

use facet::Facet;
use facet_attr::{
    AttrErrorKind, AttrType, AttrValue, ErrorClass, Options, PathStep, Unknowable, WalkPath,
    type_of, value_from, value_to,
};
use facet_attr_testhelpers::setup;
use insta::assert_snapshot;
use miette::Diagnostic;
use std::collections::{BTreeMap, HashMap};

#[derive(Facet, Debug, PartialEq)]
struct Pair {
    #[facet(rename = "a")]
    a: Option<String>,
    #[facet(rename = "b")]
    b: Vec<i64>,
}

#[derive(Facet, Debug, PartialEq)]
struct Inner {
    #[facet(rename = "value")]
    value: Vec<u16>,
}

#[derive(Facet, Debug, PartialEq)]
struct Middle {
    #[facet(rename = "inner")]
    inner: Option<Inner>,
}

#[derive(Facet, Debug, PartialEq)]
struct Outer {
    #[facet(rename = "middle")]
    middle: Option<Middle>,
}

#[derive(Facet, Debug, PartialEq)]
struct Endpoint {
    #[facet(rename = "address")]
    address: Unknowable<String>,
    #[facet(rename = "port")]
    port: Option<u16>,
}

#[derive(Facet, Debug, PartialEq)]
struct Name {
    #[facet(rename = "name")]
    name: String,
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn pair_round_trips() {
    setup();

    let options = Options::default();
    for pair in [
        Pair { a: None, b: vec![] },
        Pair {
            a: Some("x".to_owned()),
            b: vec![i64::MIN, 0, i64::MAX],
        },
    ] {
        let tree = value_from(&pair, &options).unwrap();
        let back: Pair = value_to(&tree, &options).unwrap();
        assert_eq!(back, pair);
    }
}

#[test]
fn nested_options_round_trip() {
    setup();

    let options = Options::default();
    let outer = Outer {
        middle: Some(Middle {
            inner: Some(Inner { value: vec![80, 443] }),
        }),
    };
    let tree = value_from(&outer, &options).unwrap();
    assert_eq!(value_to::<Outer>(&tree, &options).unwrap(), outer);
}

#[test]
fn maps_round_trip() {
    setup();

    let options = Options::default();

    let mut by_name = HashMap::new();
    by_name.insert("one".to_owned(), vec![1u8]);
    by_name.insert("none".to_owned(), vec![]);
    let tree = value_from(&by_name, &options).unwrap();
    assert_eq!(
        value_to::<HashMap<String, Vec<u8>>>(&tree, &options).unwrap(),
        by_name
    );

    let by_port: BTreeMap<u16, String> = [(8080, "alt".to_owned()), (80, "http".to_owned())]
        .into_iter()
        .collect();
    let tree = value_from(&by_port, &options).unwrap();
    assert_snapshot!(tree, @r#"{"80": "http", "8080": "alt"}"#);
    assert_eq!(
        value_to::<BTreeMap<u16, String>>(&tree, &options).unwrap(),
        by_port
    );
}

#[test]
fn unknowable_round_trips() {
    setup();

    let options = Options::default();
    for endpoint in [
        Endpoint {
            address: Unknowable::unknown(),
            port: None,
        },
        Endpoint {
            address: Unknowable::null(),
            port: Some(22),
        },
        Endpoint {
            address: Unknowable::known("10.0.0.1".to_owned()),
            port: Some(0),
        },
    ] {
        let tree = value_from(&endpoint, &options).unwrap();
        assert_eq!(value_to::<Endpoint>(&tree, &options).unwrap(), endpoint);
    }
}

// ---------------------------------------------------------------------------
// Null and unknown trees
// ---------------------------------------------------------------------------

#[test]
fn null_tree_zeroes_the_target() {
    setup();

    let options = Options::default();
    let null = AttrValue::null(type_of::<Pair>(&options).unwrap());
    assert_eq!(
        value_to::<Pair>(&null, &options).unwrap(),
        Pair { a: None, b: vec![] }
    );

    let null = AttrValue::null(type_of::<Name>(&options).unwrap());
    assert_eq!(
        value_to::<Name>(&null, &options).unwrap(),
        Name {
            name: String::new()
        }
    );

    let null = AttrValue::null(AttrType::list(AttrType::Number));
    assert_eq!(value_to::<[u8; 3]>(&null, &options).unwrap(), [0, 0, 0]);
}

#[test]
fn unknown_needs_a_place_to_go() {
    setup();

    let tree = AttrValue::object([("name", AttrValue::unknown(AttrType::String))]);

    let err = value_to::<Name>(&tree, &Options::default()).unwrap_err();
    assert!(matches!(err.kind(), AttrErrorKind::UnknownValue { .. }));
    assert_eq!(err.class(), ErrorClass::Protocol);
    assert_snapshot!(err, @".name: unknown value cannot be stored in string");

    let zeroed = value_to::<Name>(&tree, &Options::default().zero_unknowns()).unwrap();
    assert_eq!(zeroed.name, "");
}

#[test]
fn zero_unknowns_clears_unknowables() {
    setup();

    let tree = AttrValue::object([
        ("address", AttrValue::unknown(AttrType::String)),
        ("port", AttrValue::unknown(AttrType::Number)),
    ]);

    let err = value_to::<Endpoint>(&tree, &Options::default()).unwrap_err();
    assert_snapshot!(err.path(), @".*port");

    let options = Options::default().zero_unknowns();
    let endpoint: Endpoint = value_to(&tree, &options).unwrap();
    assert_eq!(
        endpoint,
        Endpoint {
            address: Unknowable::null(),
            port: None,
        }
    );
}

#[test]
fn absent_trees_still_match_the_target() {
    setup();

    let options = Options::default();

    let tree = AttrValue::object([
        ("a", AttrValue::null(AttrType::list(AttrType::Bool))),
        ("b", AttrValue::list(AttrType::Number, vec![]).unwrap()),
    ]);
    let err = value_to::<Pair>(&tree, &options).unwrap_err();
    assert!(matches!(err.kind(), AttrErrorKind::TypeMismatch { .. }));
    assert_eq!(err.class(), ErrorClass::Protocol);
    assert_snapshot!(err, @".a: expected string, found list<bool>");

    let tree = AttrValue::object([
        ("address", AttrValue::unknown(AttrType::map(AttrType::Number))),
        ("port", AttrValue::null(AttrType::Number)),
    ]);
    let err = value_to::<Endpoint>(&tree, &options).unwrap_err();
    assert_snapshot!(err, @".address: expected string, found map<number>");

    // Zeroing unknowns does not skip the check.
    let err = value_to::<Endpoint>(&tree, &options.clone().zero_unknowns()).unwrap_err();
    assert_snapshot!(err.path(), @".address");

    // A null set reads into a list, as a known one does.
    let tree = AttrValue::object([
        ("a", AttrValue::null(AttrType::String)),
        ("b", AttrValue::null(AttrType::set(AttrType::Number))),
    ]);
    assert_eq!(
        value_to::<Pair>(&tree, &options).unwrap(),
        Pair { a: None, b: vec![] }
    );

    let null = AttrValue::null(AttrType::object([("name", AttrType::Number)]));
    let err = value_to::<Name>(&null, &options).unwrap_err();
    assert_snapshot!(err, @"<root>: expected object{name: string}, found object{name: number}");
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

#[test]
fn numbers_must_fit_exactly() {
    setup();

    let options = Options::default();

    let err = value_to::<i64>(&AttrValue::number(2.5), &options).unwrap_err();
    assert!(matches!(err.kind(), AttrErrorKind::Inexact { .. }));
    assert_snapshot!(err, @"<root>: 2.5 cannot be represented exactly as i64");

    let err = value_to::<u8>(&AttrValue::number(300), &options).unwrap_err();
    assert_snapshot!(err, @"<root>: 300 cannot be represented exactly as u8");

    let err = value_to::<u32>(&AttrValue::number(-1), &options).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Conversion);

    assert_eq!(value_to::<i64>(&AttrValue::number(3.0), &options).unwrap(), 3);
    assert_eq!(value_to::<f64>(&AttrValue::number(7u8), &options).unwrap(), 7.0);
    assert_eq!(
        value_to::<u64>(&AttrValue::number(u64::MAX), &options).unwrap(),
        u64::MAX
    );
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[test]
fn errors_name_the_node() {
    setup();

    let tree = AttrValue::object([(
        "middle",
        AttrValue::object([(
            "inner",
            AttrValue::object([("value", AttrValue::string("80"))]),
        )]),
    )]);
    let err = value_to::<Outer>(&tree, &Options::default()).unwrap_err();
    assert!(matches!(err.kind(), AttrErrorKind::TypeMismatch { .. }));
    assert_snapshot!(err, @".*middle.*inner.value: expected list or set, found string");
}

#[test]
fn root_prefixes_reported_paths() {
    setup();

    let root = WalkPath::from_steps([PathStep::Field {
        index: 0,
        name: "config",
    }]);
    let options = Options::default().with_root(root);
    let tree = AttrValue::object([
        ("a", AttrValue::null(AttrType::String)),
        ("b", AttrValue::bool(true)),
    ]);
    let err = value_to::<Pair>(&tree, &options).unwrap_err();
    assert_snapshot!(err, @".config.b: expected list or set, found bool");
}

#[test]
fn missing_and_unexpected_attributes() {
    setup();

    let options = Options::default();

    let tree = AttrValue::object([("a", AttrValue::string("x"))]);
    let err = value_to::<Pair>(&tree, &options).unwrap_err();
    assert!(matches!(err.kind(), AttrErrorKind::MissingAttribute { .. }));
    assert_snapshot!(err, @"<root>: missing attribute `b` (available: a)");

    let tree = AttrValue::object([
        ("address", AttrValue::null(AttrType::String)),
        ("prot", AttrValue::number(22)),
    ]);
    let err = value_to::<Endpoint>(&tree, &options).unwrap_err();
    assert_snapshot!(err, @"<root>: unexpected attribute `prot`");
    let AttrErrorKind::UnexpectedAttribute { suggestion, .. } = err.kind() else {
        panic!("unexpected error kind: {err}");
    };
    assert_eq!(suggestion.as_deref(), Some("port"));
    let help = err.help().map(|h| h.to_string());
    assert_eq!(help.as_deref(), Some("did you mean `port`?"));
}

#[test]
fn arrays_need_exact_lengths() {
    setup();

    let tree = AttrValue::list(AttrType::Number, vec![AttrValue::number(1u8)]).unwrap();
    let err = value_to::<[u8; 2]>(&tree, &Options::default()).unwrap_err();
    assert!(matches!(
        err.kind(),
        AttrErrorKind::LengthMismatch {
            expected: 2,
            found: 1
        }
    ));
    assert_snapshot!(err, @"<root>: expected 2 elements, found 1");
}

#[test]
fn sets_read_into_lists() {
    setup();

    let tree = AttrValue::set(
        AttrType::String,
        vec![AttrValue::string("a"), AttrValue::string("b")],
    )
    .unwrap();
    let names: Vec<String> = value_to(&tree, &Options::default()).unwrap();
    assert_eq!(names, ["a", "b"]);
}
