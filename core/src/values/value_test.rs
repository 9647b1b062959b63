//! Unit tests for the value model.

use std::rc::Rc;

use ecow::EcoVec;
use hashbrown::HashMap;
use pretty_assertions::assert_eq;

use super::{HashKey, HashPair, Value};

#[test]
fn test_truthiness() {
    assert!(Value::Integer(1).is_truthy());
    // Integer zero is truthy.
    assert!(Value::Integer(0).is_truthy());
    assert!(Value::Boolean(true).is_truthy());
    assert!(Value::Str("".into()).is_truthy());
    assert!(Value::Array(EcoVec::new()).is_truthy());

    assert!(!Value::Boolean(false).is_truthy());
    assert!(!Value::Null.is_truthy());
}

#[test]
fn test_type_names() {
    assert_eq!(Value::Integer(1).type_name(), "INTEGER");
    assert_eq!(Value::Boolean(true).type_name(), "BOOLEAN");
    assert_eq!(Value::Null.type_name(), "NULL");
    assert_eq!(Value::Str("x".into()).type_name(), "STRING");
    assert_eq!(Value::Array(EcoVec::new()).type_name(), "ARRAY");
}

#[test]
fn test_hash_keys() {
    assert_eq!(
        Value::Integer(1).hash_key(),
        Some(HashKey::Integer(1))
    );
    assert_eq!(
        Value::Boolean(true).hash_key(),
        Some(HashKey::Boolean(true))
    );
    assert_eq!(
        Value::Str("name".into()).hash_key(),
        Some(HashKey::Str("name".into()))
    );
    assert_eq!(Value::Null.hash_key(), None);
    assert_eq!(Value::Array(EcoVec::new()).hash_key(), None);

    // Equal content yields equal keys, across separately-built values.
    let hello1 = Value::Str("Hello World".into()).hash_key();
    let hello2 = Value::Str("Hello World".into()).hash_key();
    assert_eq!(hello1, hello2);
    let diff = Value::Str("My name is johnny".into()).hash_key();
    assert_ne!(hello1, diff);
}

#[test]
fn test_language_equality() {
    assert!(Value::Integer(1).equals(&Value::Integer(1)));
    assert!(!Value::Integer(1).equals(&Value::Integer(2)));
    assert!(Value::Boolean(true).equals(&Value::Boolean(true)));
    assert!(Value::Str("a".into()).equals(&Value::Str("a".into())));
    assert!(!Value::Str("a".into()).equals(&Value::Str("b".into())));
    assert!(Value::Null.equals(&Value::Null));

    // Cross-variant comparisons are unequal, never an error.
    assert!(!Value::Integer(1).equals(&Value::Boolean(true)));
    assert!(!Value::Integer(0).equals(&Value::Null));
    assert!(!Value::Str("1".into()).equals(&Value::Integer(1)));
}

#[test]
fn test_inspection() {
    assert_eq!(Value::Integer(42).to_string(), "42");
    assert_eq!(Value::Boolean(true).to_string(), "true");
    assert_eq!(Value::Null.to_string(), "null");
    // Strings inspect raw, without quotes.
    assert_eq!(Value::Str("hello".into()).to_string(), "hello");

    let array = Value::Array(
        [
            Value::Integer(1),
            Value::Str("two".into()),
            Value::Boolean(false),
        ]
        .into_iter()
        .collect::<EcoVec<_>>(),
    );
    assert_eq!(array.to_string(), "[1, two, false]");
}

#[test]
fn test_hash_inspection_is_sorted() {
    let mut map = HashMap::new();
    for (key, value) in [("b", 2), ("a", 1), ("c", 3)] {
        map.insert(
            HashKey::Str(key.into()),
            HashPair {
                key: Value::Str(key.into()),
                value: Value::Integer(value),
            },
        );
    }
    let hash = Value::Hash(Rc::new(map));
    assert_eq!(hash.to_string(), "{a: 1, b: 2, c: 3}");
}
