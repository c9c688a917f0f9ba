//! Dictionary tests

use pretty_assertions::assert_eq;
use valtree::*;

/// root -> "d" -> "c" -> "s" (binary), with a live handle at every level.
fn nested() -> (
    DictionaryValue,
    DictionaryValue,
    DictionaryValue,
    BinaryValue,
) {
    let root = DictionaryValue::create();
    root.set_dictionary("d", &DictionaryValue::create()).unwrap();
    let d = root.get_dictionary("d").unwrap();
    d.set_dictionary("c", &DictionaryValue::create()).unwrap();
    let c = d.get_dictionary("c").unwrap();
    c.set_binary("s", &BinaryValue::create(b"leaf").unwrap())
        .unwrap();
    let s = c.get_binary("s").unwrap();
    (root, d, c, s)
}

// ═══════════════════════════════════════════════════════════════════════
// Basic Operations
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_dictionary_set_and_get_int() {
    let dict = DictionaryValue::create();
    dict.set_int("a", 5).unwrap();

    assert_eq!(dict.get_type("a").unwrap(), ValueType::Int);
    assert_eq!(dict.get_int("a").unwrap(), 5);
    assert!(dict.has_key("a").unwrap());
    assert!(!dict.has_key("b").unwrap());
}

#[test]
fn test_dictionary_new_root_is_owned_and_writable() {
    let dict = DictionaryValue::create();
    assert!(dict.is_valid());
    assert!(dict.is_owned());
    assert!(!dict.is_read_only());
    assert_eq!(dict.size().unwrap(), 0);

    let controller = dict.controller().unwrap();
    assert!(controller.has_owner().unwrap());
    assert_eq!(controller.reference_count().unwrap(), 0);
}

#[test]
fn test_dictionary_overwrite_changes_type() {
    let dict = DictionaryValue::create();
    dict.set_int("k", 1).unwrap();
    dict.set_string("k", "x").unwrap();

    assert_eq!(dict.get_type("k").unwrap(), ValueType::String);
    assert_eq!(dict.get_string("k").unwrap(), "x");
    assert_eq!(dict.size().unwrap(), 1);
}

#[test]
fn test_dictionary_overwrite_invalidates_replaced_handle() {
    let dict = DictionaryValue::create();
    dict.set_list("k", &ListValue::create()).unwrap();
    let old = dict.get_list("k").unwrap();
    let controller = dict.controller().unwrap();
    assert_eq!(controller.reference_count().unwrap(), 1);

    dict.set_string("k", "x").unwrap();

    assert!(!old.is_valid());
    assert_eq!(old.size(), Err(ValueError::Detached));
    assert_eq!(controller.reference_count().unwrap(), 0);
    assert_eq!(controller.dependency_count().unwrap(), 0);
    assert_eq!(controller.node_count().unwrap(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Nested Values
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_owner_source_is_moved_not_copied() {
    let dict = DictionaryValue::create();
    let fresh = DictionaryValue::create();
    fresh.set_bool("flag", true).unwrap();
    let fresh_controller = fresh.controller().unwrap();

    dict.set_dictionary("child", &fresh).unwrap();

    assert!(!fresh.is_valid());
    assert!(fresh_controller.is_empty().unwrap());

    let first = dict.get_dictionary("child").unwrap();
    let second = dict.get_dictionary("child").unwrap();
    assert!(first.is_same(&second));
    assert!(first.get_bool("flag").unwrap());
}

#[test]
fn test_nested_handles_share_the_root_controller() {
    let (root, d, c, s) = nested();
    let id = root.controller().unwrap().id();

    for controller in [d.controller(), c.controller(), s.controller()] {
        assert_eq!(controller.map(|ctrl| ctrl.id()), Some(id));
    }
    assert!(!d.is_owned());
    assert!(s.is_read_only());
    assert_eq!(s.to_vec().unwrap(), b"leaf".to_vec());
}

#[test]
fn test_remove_cascades_to_descendants() {
    let (root, d, c, s) = nested();
    let controller = root.controller().unwrap();
    assert_eq!(controller.reference_count().unwrap(), 3);

    assert!(root.remove("d").unwrap());

    assert!(!d.is_valid());
    assert!(!c.is_valid());
    assert!(!s.is_valid());
    assert_eq!(controller.reference_count().unwrap(), 0);
    assert_eq!(controller.dependency_count().unwrap(), 0);
    assert_eq!(controller.node_count().unwrap(), 1);
    assert!(!root.remove("d").unwrap());
}

#[test]
fn test_clear_cascades_to_descendants() {
    let (root, d, c, s) = nested();
    root.set_int("n", 1).unwrap();

    root.clear().unwrap();

    assert_eq!(root.size().unwrap(), 0);
    assert!(!d.is_valid());
    assert!(!c.is_valid());
    assert!(!s.is_valid());
    assert!(root.is_valid());
}

#[test]
fn test_owner_drop_invalidates_every_reference() {
    let (root, d, c, s) = nested();
    let controller = root.controller().unwrap();

    drop(root);

    assert!(!d.is_valid());
    assert!(!c.is_valid());
    assert!(!s.is_valid());
    assert!(controller.is_empty().unwrap());
}

#[test]
fn test_handle_clone_keeps_value_alive() {
    let root = DictionaryValue::create();
    root.set_int("n", 3).unwrap();
    let alias = root.clone();
    drop(root);
    assert_eq!(alias.get_int("n").unwrap(), 3);
}

#[test]
fn test_reinserting_reference_at_its_own_key() {
    let root = DictionaryValue::create();
    root.set_dictionary("child", &DictionaryValue::create())
        .unwrap();
    let child = root.get_dictionary("child").unwrap();
    child.set_int("n", 7).unwrap();

    root.set_dictionary("child", &child).unwrap();

    // The old node was copied before it was released.
    assert!(!child.is_valid());
    assert_eq!(root.get_dictionary("child").unwrap().get_int("n").unwrap(), 7);
}

#[test]
fn test_owner_cannot_be_inserted_into_its_own_tree() {
    let root = DictionaryValue::create();
    assert!(matches!(
        root.set_dictionary("me", &root),
        Err(ValueError::InvalidOperand(_))
    ));
    assert!(root.is_valid());
    assert_eq!(root.size().unwrap(), 0);
}

// ═══════════════════════════════════════════════════════════════════════
// Copies
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_copy_is_independent() {
    let root = DictionaryValue::create();
    root.set_dictionary("child", &DictionaryValue::create())
        .unwrap();
    let child = root.get_dictionary("child").unwrap();
    child.set_int("n", 1).unwrap();

    let copy = child.copy(false).unwrap();
    copy.set_int("n", 2).unwrap();

    assert!(copy.is_owned());
    assert!(!copy.is_read_only());
    assert_ne!(
        copy.controller().map(|c| c.id()),
        child.controller().map(|c| c.id())
    );
    assert_eq!(child.get_int("n").unwrap(), 1);
    assert_eq!(copy.get_int("n").unwrap(), 2);
}

#[test]
fn test_copy_can_exclude_empty_children() {
    let root = DictionaryValue::create();
    root.set_int("n", 1).unwrap();
    root.set_dictionary("empty", &DictionaryValue::create())
        .unwrap();
    root.set_list("list", &ListValue::create()).unwrap();

    let full = root.copy(false).unwrap();
    let pruned = root.copy(true).unwrap();

    assert_eq!(full.size().unwrap(), 3);
    assert_eq!(pruned.keys().unwrap(), vec!["n".to_string()]);
    assert!(full.is_equal(&root).unwrap());
    assert!(!pruned.is_equal(&root).unwrap());
}

#[test]
fn test_is_same_versus_is_equal() {
    let a = DictionaryValue::create();
    a.set_int("n", 1).unwrap();
    let b = a.copy(false).unwrap();

    assert!(a.is_equal(&b).unwrap());
    assert!(!a.is_same(&b));
    assert!(a.is_same(&a.clone()));
}

// ═══════════════════════════════════════════════════════════════════════
// Read-only Values
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_read_only_dictionary_rejects_mutation() {
    let detached = DetachedDictionary::new().with(
        "inner",
        DetachedDictionary::new().with("n", 1),
    );
    let dict: DictionaryValue =
        DictionaryValue::adopt(detached, None, OwnerMode::WillDelete, true).unwrap();

    assert!(dict.is_read_only());
    assert_eq!(dict.set_int("n", 2), Err(ValueError::ReadOnly));
    assert_eq!(dict.remove("inner"), Err(ValueError::ReadOnly));
    assert_eq!(dict.clear(), Err(ValueError::ReadOnly));

    let inner = dict.get_dictionary("inner").unwrap();
    assert!(inner.is_read_only());
    assert_eq!(inner.get_int("n").unwrap(), 1);
    assert_eq!(inner.set_int("n", 2), Err(ValueError::ReadOnly));
}

// ═══════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_getters_report_missing_and_mismatched_entries() {
    let dict = DictionaryValue::create();
    dict.set_int("n", 4).unwrap();

    assert!(matches!(
        dict.get_dictionary("nope"),
        Err(ValueError::NotFound(_))
    ));
    assert!(matches!(
        dict.get_list("n"),
        Err(ValueError::TypeMismatch {
            expected: ValueType::List,
            got: ValueType::Int
        })
    ));
    assert_eq!(dict.get_double("n").unwrap(), 4.0);
}

#[test]
fn test_empty_key_is_invalid_operand() {
    let dict = DictionaryValue::create();
    assert!(matches!(
        dict.set_dictionary("", &DictionaryValue::create()),
        Err(ValueError::InvalidOperand(_))
    ));
    assert!(matches!(dict.has_key(""), Err(ValueError::InvalidOperand(_))));
}
