//! JSON conversion tests

use pretty_assertions::assert_eq;
use serde_json::json;
use valtree::*;

#[test]
fn test_dictionary_from_json() {
    let dict = DictionaryValue::from_json(&json!({
        "name": "valtree",
        "count": 3,
        "ratio": 0.5,
        "big": 10_000_000_000i64,
        "on": true,
        "none": null,
        "tags": ["a", "b"],
        "nested": {"depth": 2}
    }))
    .unwrap();

    assert_eq!(dict.get_string("name").unwrap(), "valtree");
    assert_eq!(dict.get_int("count").unwrap(), 3);
    assert_eq!(dict.get_double("ratio").unwrap(), 0.5);
    assert_eq!(dict.get_type("big").unwrap(), ValueType::Double);
    assert!(dict.get_bool("on").unwrap());
    assert_eq!(dict.get_type("none").unwrap(), ValueType::Null);
    assert_eq!(dict.get_list("tags").unwrap().get_string(1).unwrap(), "b");
    assert_eq!(
        dict.get_dictionary("nested").unwrap().get_int("depth").unwrap(),
        2
    );
}

#[test]
fn test_dictionary_to_json() {
    let dict = DictionaryValue::create();
    dict.set_int("n", 1).unwrap();
    dict.set_string("s", "x").unwrap();
    dict.set_list("l", &ListValue::create()).unwrap();
    dict.get_list("l").unwrap().set_bool(1, false).unwrap();

    assert_eq!(
        dict.to_json().unwrap(),
        json!({"n": 1, "s": "x", "l": [null, false]})
    );
}

#[test]
fn test_list_from_json_rejects_objects() {
    assert_eq!(
        ListValue::from_json(&json!({"a": 1})).err(),
        Some(ValueError::type_mismatch(ValueType::List, ValueType::Dictionary))
    );
    let list = ListValue::from_json(&json!([1, "two", [3]])).unwrap();
    assert_eq!(list.size().unwrap(), 3);
    assert_eq!(list.get_list(2).unwrap().get_int(0).unwrap(), 3);
}

#[test]
fn test_context_limits_depth() {
    let ctx = ValueContext::with_max_depth(2);
    assert_eq!(
        DictionaryValue::<ThreadSafe>::from_json_with(&json!({"a": {"b": {}}}), ctx.clone()).err(),
        Some(ValueError::DepthExceeded { max: 2 })
    );

    // The limit stays with the domain and applies on export as well.
    let dict: DictionaryValue = DictionaryValue::from_json_with(&json!({"a": {}}), ctx).unwrap();
    dict.get_dictionary("a")
        .unwrap()
        .set_dictionary("b", &DictionaryValue::create())
        .unwrap();
    assert_eq!(
        dict.to_json().err(),
        Some(ValueError::DepthExceeded { max: 2 })
    );
    assert_eq!(dict.controller().unwrap().context().max_depth, 2);
}

#[test]
fn test_empty_json_key_is_rejected() {
    assert!(matches!(
        DictionaryValue::from_json(&json!({"": 1})),
        Err(ValueError::InvalidOperand(_))
    ));
}
