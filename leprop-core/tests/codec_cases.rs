//! Table-driven request decoding and database behaviour.

use leprop_core::{
    protocol::{Command, Reply, Request},
    PropError, PropertyDb, PROP_NAME_MAX, PROP_VALUE_MAX,
};
use rstest::rstest;

// ---------------------------------------------------------------------------
// 1. Request decoding
// ---------------------------------------------------------------------------

#[rstest]
#[case::set(b"Sro.foo=bar".as_slice(), Request::set("ro.foo", "bar"))]
#[case::set_empty_value(b"Spersist.x=".as_slice(), Request::set("persist.x", ""))]
#[case::set_value_with_separator(b"Sk=a=b".as_slice(), Request::set("k", "a=b"))]
#[case::get(b"Gro.foo=".as_slice(), Request::get("ro.foo"))]
#[case::trailing_newline(b"Sro.foo=bar\n".as_slice(), Request::set("ro.foo", "bar"))]
fn decodes_well_formed_requests(#[case] wire: &[u8], #[case] expected: Request) {
    assert_eq!(Request::decode(wire).expect("decode"), expected);
}

#[rstest]
#[case::no_separator(b"Sro.foo".as_slice())]
#[case::get_without_separator(b"Gro.foo".as_slice())]
#[case::empty_name(b"S=value".as_slice())]
#[case::unknown_tag(b"Qro.foo=1".as_slice())]
#[case::empty(b"".as_slice())]
#[case::bad_utf8(b"S\xff\xfe=1".as_slice())]
fn rejects_malformed_requests(#[case] wire: &[u8]) {
    let err = Request::decode(wire).expect_err("must not decode");
    assert!(err.is_protocol(), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Truncation boundary
// ---------------------------------------------------------------------------

#[rstest]
#[case(PROP_NAME_MAX - 1, PROP_NAME_MAX - 1)]
#[case(PROP_NAME_MAX, PROP_NAME_MAX)]
#[case(PROP_NAME_MAX + 1, PROP_NAME_MAX)]
#[case(PROP_NAME_MAX * 4, PROP_NAME_MAX)]
fn names_are_clamped_on_set(#[case] len: usize, #[case] stored: usize) {
    let mut db = PropertyDb::new();
    let name = "x".repeat(len);
    db.set(&name, "v");
    let entry = db.iter().next().expect("one entry");
    assert_eq!(entry.name.as_str().len(), stored);
}

#[test]
fn values_are_clamped_on_set() {
    let mut db = PropertyDb::new();
    db.set("ro.big", &"v".repeat(PROP_VALUE_MAX + 1));
    assert_eq!(db.get("ro.big").expect("present").as_str().len(), PROP_VALUE_MAX);
}

// ---------------------------------------------------------------------------
// 3. Replies
// ---------------------------------------------------------------------------

#[test]
fn ok_reply_carries_value() {
    let reply = Reply::decode(b"Gro.foo=bar").expect("decode");
    assert_eq!(reply.value().map(|v| v.as_str()), Some("bar"));
    assert!(matches!(reply, Reply::Ok { command: Command::Get, .. }));
}

#[test]
fn not_found_is_distinct_from_protocol_errors() {
    let db = PropertyDb::new();
    let err = db.get("never.set").expect_err("miss");
    assert!(matches!(err, PropError::NotFound(_)));
    assert!(!err.is_protocol());
}
