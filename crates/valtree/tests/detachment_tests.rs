//! Ownership transfer tests: detach, adopt and cross-domain insertion

use pretty_assertions::assert_eq;
use valtree::*;

// ═══════════════════════════════════════════════════════════════════════
// Cross-domain insertion
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_reference_from_other_domain_is_deep_copied() {
    let a = DictionaryValue::create();
    let b = DictionaryValue::create();
    a.set_dictionary("x", &DictionaryValue::create()).unwrap();
    let from_a = a.get_dictionary("x").unwrap();
    from_a.set_int("n", 1).unwrap();

    b.set_dictionary("y", &from_a).unwrap();
    let in_b = b.get_dictionary("y").unwrap();
    in_b.set_int("n", 2).unwrap();
    in_b.set_int("extra", 3).unwrap();

    assert!(from_a.is_valid());
    assert_eq!(from_a.get_int("n").unwrap(), 1);
    assert!(!from_a.has_key("extra").unwrap());
    assert_eq!(a.get_dictionary("x").unwrap().size().unwrap(), 1);
    assert_eq!(in_b.size().unwrap(), 2);
}

#[test]
fn test_owner_with_live_references_moves_them_along() {
    let target = DictionaryValue::create();
    let source = DictionaryValue::create();
    source.set_list("items", &ListValue::create()).unwrap();
    let items = source.get_list("items").unwrap();
    items.set_string(0, "kept").unwrap();
    let source_controller = source.controller().unwrap();

    target.set_dictionary("moved", &source).unwrap();

    // The old domain is empty and the reference now lives in the target.
    assert!(!source.is_valid());
    assert!(source_controller.is_empty().unwrap());
    assert!(items.is_valid());
    assert_eq!(
        items.controller().map(|c| c.id()),
        target.controller().map(|c| c.id())
    );
    assert_eq!(items.get_string(0).unwrap(), "kept");

    // And it is torn down with its new parent.
    target.remove("moved").unwrap();
    assert!(!items.is_valid());
}

#[test]
fn test_nested_dictionary_detachment() {
    let root = DictionaryValue::create();
    let level1 = DictionaryValue::create();
    let level2 = DictionaryValue::create();
    level2.set_string("leaf", "v").unwrap();
    level1.set_dictionary("level2", &level2).unwrap();
    root.set_dictionary("level1", &level1).unwrap();

    let l1 = root.get_dictionary("level1").unwrap();
    let l2 = l1.get_dictionary("level2").unwrap();
    assert_eq!(l2.get_string("leaf").unwrap(), "v");

    // Removing the middle level takes the deeper handle with it.
    root.remove("level1").unwrap();
    assert!(!l1.is_valid());
    assert!(!l2.is_valid());
    assert_eq!(root.controller().unwrap().dependency_count().unwrap(), 0);
}

#[test]
fn test_nested_list_detachment() {
    let root = ListValue::create();
    let inner = ListValue::create();
    inner.set_list(0, &ListValue::create()).unwrap();
    root.set_list(0, &inner).unwrap();

    let a = root.get_list(0).unwrap();
    let b = a.get_list(0).unwrap();
    b.set_int(0, 1).unwrap();

    root.set_null(0).unwrap();
    assert!(!a.is_valid());
    assert!(!b.is_valid());
    assert_eq!(root.get_type(0).unwrap(), ValueType::Null);
}

#[test]
fn test_no_delete_owner_is_copied_not_moved() {
    let controller = ValueController::new();
    let scoped = DictionaryValue::adopt(
        DetachedDictionary::new().with("n", 1),
        Some(controller),
        OwnerMode::NoDelete,
        false,
    )
    .unwrap();
    let target = DictionaryValue::create();

    target.set_dictionary("copy", &scoped).unwrap();

    assert!(scoped.is_valid());
    scoped.set_int("n", 2).unwrap();
    assert_eq!(target.get_dictionary("copy").unwrap().get_int("n").unwrap(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Explicit detach
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_detach_owner_transfers_references() {
    let owner = DictionaryValue::create();
    owner.set_dictionary("child", &DictionaryValue::create())
        .unwrap();
    let child = owner.get_dictionary("child").unwrap();
    child.set_int("n", 9).unwrap();
    let old = owner.controller().unwrap();
    let successor = ValueController::new();

    let moved = owner.detach(Some(&successor)).unwrap().unwrap();

    assert!(!owner.is_valid());
    assert!(old.is_empty().unwrap());

    // The reference works straight away, under the successor's lock.
    assert!(child.is_valid());
    assert_eq!(child.get_int("n").unwrap(), 9);
    assert_eq!(child.controller().map(|c| c.id()), Some(successor.id()));
    assert_eq!(successor.reference_count().unwrap(), 1);
    assert_eq!(successor.node_count().unwrap(), 2);

    assert!(moved.is_valid());
    assert!(moved.is_owned());
    child.set_int("n", 10).unwrap();
    assert_eq!(moved.get_dictionary("child").unwrap().get_int("n").unwrap(), 10);
    assert!(moved.get_dictionary("child").unwrap().is_same(&child));

    // Dropping the new owner tears the reference down with it.
    drop(moved);
    assert!(!child.is_valid());
    assert!(successor.is_empty().unwrap());
}

#[test]
fn test_detach_into_owned_successor_is_rejected() {
    let owner = DictionaryValue::create();
    owner.set_list("l", &ListValue::create()).unwrap();
    let list = owner.get_list("l").unwrap();
    let taken = DictionaryValue::create();
    let successor = taken.controller().unwrap();

    assert_eq!(
        owner.detach(Some(&successor)).err(),
        Some(ValueError::Controller(ControllerError::DuplicateOwner))
    );

    // Nothing moved.
    assert!(owner.is_valid());
    assert_eq!(list.controller().map(|c| c.id()), owner.controller().map(|c| c.id()));
    list.set_int(0, 1).unwrap();
    assert_eq!(successor.reference_count().unwrap(), 0);
}

#[test]
fn test_detach_owner_requires_successor() {
    let owner = DictionaryValue::create();
    assert!(matches!(
        owner.detach(None),
        Err(ValueError::InvalidOperand(_))
    ));
    assert!(owner.is_valid());
}

#[test]
fn test_detach_into_own_controller_is_rejected() {
    let owner = DictionaryValue::create();
    let own = owner.controller().unwrap();
    assert!(matches!(
        owner.detach(Some(&own)),
        Err(ValueError::InvalidOperand(_))
    ));
}

#[test]
fn test_detach_reference_leaves_entry_in_place() {
    let root = DictionaryValue::create();
    root.set_dictionary("child", &DictionaryValue::create())
        .unwrap();
    let child = root.get_dictionary("child").unwrap();

    assert!(child.detach(None).unwrap().is_none());

    assert!(!child.is_valid());
    assert!(root.has_key("child").unwrap());
    let again = root.get_dictionary("child").unwrap();
    assert!(again.is_valid());
    assert!(!again.is_same(&child));
}

#[test]
fn test_detach_no_delete_owner_without_successor() {
    let controller = ValueController::new();
    let scoped = DictionaryValue::adopt(
        DetachedDictionary::new().with("n", 1),
        Some(controller.clone()),
        OwnerMode::NoDelete,
        false,
    )
    .unwrap();

    scoped.set_dictionary("inner", &DictionaryValue::create()).unwrap();
    let inner = scoped.get_dictionary("inner").unwrap();

    assert!(scoped.detach(None).unwrap().is_none());

    assert!(!scoped.is_valid());
    assert!(!inner.is_valid());
    assert!(!controller.has_owner().unwrap());
    assert_eq!(controller.reference_count().unwrap(), 0);
    assert_eq!(controller.node_count().unwrap(), 2);
}

#[test]
fn test_extract_hands_out_storage() {
    let owner = DictionaryValue::create();
    owner.set_int("n", 1).unwrap();
    owner.set_dictionary("inner", &DictionaryValue::create()).unwrap();
    let inner = owner.get_dictionary("inner").unwrap();
    let controller = owner.controller().unwrap();

    let tree = owner.extract().unwrap();

    assert_eq!(
        tree,
        DetachedDictionary::new()
            .with("n", 1)
            .with("inner", DetachedDictionary::new())
    );
    assert!(!owner.is_valid());
    assert!(!inner.is_valid());
    assert!(controller.is_empty().unwrap());
}

#[test]
fn test_extract_from_reference_is_rejected() {
    let root = DictionaryValue::create();
    root.set_dictionary("child", &DictionaryValue::create()).unwrap();
    let child = root.get_dictionary("child").unwrap();

    assert!(matches!(child.extract(), Err(ValueError::InvalidOperand(_))));
    assert!(child.is_valid());
}

#[test]
fn test_dropped_no_delete_owner_leaves_storage() {
    let controller = ValueController::new();
    let scoped = DictionaryValue::adopt(
        DetachedDictionary::new().with("n", 1),
        Some(controller.clone()),
        OwnerMode::NoDelete,
        false,
    )
    .unwrap();

    drop(scoped);

    assert!(!controller.has_owner().unwrap());
    assert_eq!(controller.node_count().unwrap(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Adoption
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_adopt_into_owned_controller_is_rejected() {
    let controller = ValueController::new();
    let _first = DictionaryValue::adopt(
        DetachedDictionary::new(),
        Some(controller.clone()),
        OwnerMode::WillDelete,
        false,
    )
    .unwrap();

    let second = DictionaryValue::adopt(
        DetachedDictionary::new().with("n", 1),
        Some(controller.clone()),
        OwnerMode::WillDelete,
        false,
    );

    assert_eq!(
        second.err(),
        Some(ValueError::Controller(ControllerError::DuplicateOwner))
    );
    assert_eq!(controller.node_count().unwrap(), 1);
}

#[test]
fn test_detached_value_round_trips_through_serde() {
    let root = DictionaryValue::create();
    root.set_string("s", "text").unwrap();
    root.set_list("l", &ListValue::create()).unwrap();
    root.get_list("l").unwrap().set_double(0, 0.25).unwrap();

    let detached = root.extract().unwrap();
    let wire = serde_json::to_string(&detached).unwrap();
    let back: DetachedDictionary = serde_json::from_str(&wire).unwrap();
    assert_eq!(back, detached);

    let revived: DictionaryValue =
        DictionaryValue::adopt(back, None, OwnerMode::WillDelete, false).unwrap();
    assert_eq!(revived.get_list("l").unwrap().get_double(0).unwrap(), 0.25);
}
