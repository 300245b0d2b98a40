mod support;

use skyproto::{Error, MapProxy, MessageProxy, RepeatedProxy, ScriptValue};

fn book() -> MessageProxy {
    support::new_message(&support::library(), "library.Book")
}

fn tags(message: &MessageProxy) -> RepeatedProxy {
    message
        .attr("tags")
        .unwrap()
        .downcast_object::<RepeatedProxy>()
        .unwrap()
        .clone()
}

fn ratings(message: &MessageProxy) -> MapProxy {
    message
        .attr("ratings")
        .unwrap()
        .downcast_object::<MapProxy>()
        .unwrap()
        .clone()
}

fn string_list(values: &[&str]) -> ScriptValue {
    ScriptValue::List(values.iter().map(|s| ScriptValue::from(*s)).collect())
}

// ============================================================================
// Repeated Field Tests
// ============================================================================

#[test]
fn test_list_append_and_index() {
    let message = book();
    let list = tags(&message);
    assert!(list.is_empty());

    list.append(&ScriptValue::from("a")).unwrap();
    list.append(&ScriptValue::from("b")).unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list.get(0).unwrap().as_str(), Some("a"));
    assert_eq!(list.get(-1).unwrap().as_str(), Some("b"));
    assert!(matches!(
        list.get(2).unwrap_err(),
        Error::OutOfRange { index: 2, len: 2 }
    ));
    assert!(list.get(-3).is_err());
}

#[test]
fn test_list_is_a_live_alias_of_the_field() {
    let message = book();
    message.set_field("tags", &string_list(&["a", "b"])).unwrap();

    let first = tags(&message);
    first.append(&ScriptValue::from("c")).unwrap();

    let second = tags(&message);
    assert!(first.handle().ptr_eq(second.handle()));
    assert_eq!(second.len(), 3);
    let collected: Vec<String> = second
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(collected, vec!["a", "b", "c"]);
}

#[test]
fn test_list_assign_by_index() {
    let message = book();
    message.set_field("tags", &string_list(&["a", "b"])).unwrap();
    let list = tags(&message);
    list.set(-1, &ScriptValue::from("z")).unwrap();
    assert_eq!(list.get(1).unwrap().as_str(), Some("z"));
    assert!(list.set(5, &ScriptValue::from("x")).is_err());
}

#[test]
fn test_list_insert_clamps_and_appends_past_end() {
    let message = book();
    let list = tags(&message);
    list.append(&ScriptValue::from("b")).unwrap();
    list.insert(0, &ScriptValue::from("a")).unwrap();
    list.insert(100, &ScriptValue::from("d")).unwrap();
    list.insert(-1, &ScriptValue::from("c")).unwrap();
    let collected: Vec<String> = list
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(collected, vec!["a", "b", "c", "d"]);
}

#[test]
fn test_list_pop_and_remove() {
    let message = book();
    message
        .set_field("tags", &string_list(&["a", "b", "c"]))
        .unwrap();
    let list = tags(&message);

    assert_eq!(list.pop(None).unwrap().as_str(), Some("c"));
    assert_eq!(list.pop(Some(0)).unwrap().as_str(), Some("a"));
    assert_eq!(list.len(), 1);
    assert!(list.pop(Some(5)).is_err());

    list.remove(&ScriptValue::from("b")).unwrap();
    assert!(list.is_empty());
    assert!(matches!(
        list.remove(&ScriptValue::from("b")).unwrap_err(),
        Error::MissingValue { .. }
    ));
}

#[test]
fn test_list_extend_and_clear() {
    let message = book();
    let list = tags(&message);
    list.extend(&string_list(&["a", "b"])).unwrap();
    assert_eq!(list.len(), 2);

    // Extending from another repeated field converts element by element
    let other = book();
    other.set_field("tags", &string_list(&["c"])).unwrap();
    list.extend(&other.attr("tags").unwrap()).unwrap();
    assert_eq!(list.len(), 3);

    assert!(list.extend(&ScriptValue::Int(1)).is_err());

    list.clear().unwrap();
    assert!(list.is_empty());
}

#[test]
fn test_list_index_with_bounds() {
    let message = book();
    message
        .set_field("tags", &string_list(&["a", "b", "a"]))
        .unwrap();
    let list = tags(&message);
    assert_eq!(list.index(&ScriptValue::from("a"), None, None).unwrap(), 0);
    assert_eq!(
        list.index(&ScriptValue::from("a"), Some(1), None).unwrap(),
        2
    );
    assert!(list
        .index(&ScriptValue::from("a"), Some(1), Some(2))
        .is_err());
    // Bounds clamp rather than error
    assert_eq!(
        list.index(&ScriptValue::from("a"), Some(-100), Some(100))
            .unwrap(),
        0
    );
}

#[test]
fn test_list_slice_is_a_snapshot() {
    let message = book();
    message
        .set_field("tags", &string_list(&["a", "b", "c"]))
        .unwrap();
    let list = tags(&message);

    let slice = list.slice(Some(1), None);
    assert_eq!(slice.len(), 2);
    assert_eq!(slice.get(0).unwrap().as_str(), Some("b"));

    // Mutating the snapshot leaves the field untouched
    slice.push(ScriptValue::from("z")).unwrap();
    assert_eq!(list.len(), 3);

    let empty = list.slice(Some(2), Some(1));
    assert!(empty.is_empty());
}

#[test]
fn test_list_element_conversion_is_checked() {
    let message = book();
    let list = tags(&message);
    let err = list.append(&ScriptValue::Int(1)).unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }));
}

#[test]
fn test_list_mutation_rejected_during_iteration() {
    let message = book();
    message.set_field("tags", &string_list(&["a", "b"])).unwrap();
    let list = tags(&message);

    let mut iter = list.iter();
    assert_eq!(iter.next().unwrap().as_str(), Some("a"));

    for (verb, result) in [
        ("append", list.append(&ScriptValue::from("c"))),
        ("insert", list.insert(0, &ScriptValue::from("c"))),
        ("clear", list.clear()),
        ("assign to index", list.set(0, &ScriptValue::from("c"))),
    ] {
        match result.unwrap_err() {
            Error::ConcurrentMutation { op } => assert_eq!(op, verb),
            other => panic!("expected ConcurrentMutation for {}, got {:?}", verb, other),
        }
    }
    assert!(matches!(
        list.pop(None).unwrap_err(),
        Error::ConcurrentMutation { .. }
    ));

    drop(iter);
    assert!(list.append(&ScriptValue::from("c")).is_ok());
}

#[test]
fn test_list_of_messages_aliases_elements() {
    let library = support::library();
    let message = book();
    let authors = message
        .attr("authors")
        .unwrap()
        .downcast_object::<RepeatedProxy>()
        .unwrap()
        .clone();

    let author = support::new_message(&library, "library.Author");
    authors.append(&ScriptValue::object(author)).unwrap();

    let element = authors.get(0).unwrap();
    let element = element.downcast_object::<MessageProxy>().unwrap();
    element
        .set_field("name", &ScriptValue::from("Frank"))
        .unwrap();

    let again = authors.get(0).unwrap();
    let again = again.downcast_object::<MessageProxy>().unwrap();
    assert_eq!(again.attr("name").unwrap().as_str(), Some("Frank"));
}

// ============================================================================
// Map Field Tests
// ============================================================================

#[test]
fn test_map_set_get_contains() {
    let message = book();
    let map = ratings(&message);
    assert!(map.is_empty());

    map.set(&ScriptValue::from("nyt"), &ScriptValue::Int(5))
        .unwrap();
    assert_eq!(map.len(), 1);
    assert!(map.contains(&ScriptValue::from("nyt")).unwrap());
    assert_eq!(
        map.get(&ScriptValue::from("nyt"), None).unwrap().as_int(),
        Some(5)
    );
    assert!(map.get(&ScriptValue::from("wp"), None).unwrap().is_none());
    assert_eq!(
        map.get(&ScriptValue::from("wp"), Some(&ScriptValue::Int(0)))
            .unwrap()
            .as_int(),
        Some(0)
    );
}

#[test]
fn test_map_is_a_live_alias_of_the_field() {
    let message = book();
    let first = ratings(&message);
    first
        .set(&ScriptValue::from("nyt"), &ScriptValue::Int(5))
        .unwrap();
    let second = ratings(&message);
    assert!(first.handle().ptr_eq(second.handle()));
    assert_eq!(second.len(), 1);
}

#[test]
fn test_map_key_conversion_is_checked() {
    let message = book();
    let map = ratings(&message);
    assert!(map.set(&ScriptValue::Int(1), &ScriptValue::Int(5)).is_err());
    assert!(map.get(&ScriptValue::Bool(true), None).is_err());
}

#[test]
fn test_map_keys_and_items_are_sorted_fresh_copies() {
    let message = book();
    let map = ratings(&message);
    for (key, value) in [("zeta", 1), ("alpha", 2), ("mid", 3)] {
        map.set(&ScriptValue::from(key), &ScriptValue::Int(value))
            .unwrap();
    }

    let keys: Vec<String> = map
        .keys()
        .unwrap()
        .into_iter()
        .map(|k| k.as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["alpha", "mid", "zeta"]);

    // Unmodified map: two calls agree
    let first = map.items().unwrap();
    let second = map.items().unwrap();
    assert_eq!(first.len(), second.len());
    for ((k1, v1), (k2, v2)) in first.iter().zip(second.iter()) {
        assert_eq!(k1.equals(k2), Ok(true));
        assert_eq!(v1.equals(v2), Ok(true));
    }

    // A new key appears at its sorted position
    map.setdefault(&ScriptValue::from("beta"), &ScriptValue::Int(9))
        .unwrap();
    let keys: Vec<String> = map
        .keys()
        .unwrap()
        .into_iter()
        .map(|k| k.as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["alpha", "beta", "mid", "zeta"]);
}

#[test]
fn test_map_setdefault_returns_existing() {
    let message = book();
    let map = ratings(&message);
    map.set(&ScriptValue::from("nyt"), &ScriptValue::Int(5))
        .unwrap();
    let existing = map
        .setdefault(&ScriptValue::from("nyt"), &ScriptValue::Int(1))
        .unwrap();
    assert_eq!(existing.as_int(), Some(5));
    let inserted = map
        .setdefault(&ScriptValue::from("wp"), &ScriptValue::Int(1))
        .unwrap();
    assert_eq!(inserted.as_int(), Some(1));
}

#[test]
fn test_map_pop_and_remove() {
    let message = book();
    let map = ratings(&message);
    map.set(&ScriptValue::from("nyt"), &ScriptValue::Int(5))
        .unwrap();

    assert_eq!(
        map.pop(&ScriptValue::from("nyt"), None).unwrap().as_int(),
        Some(5)
    );
    assert!(matches!(
        map.pop(&ScriptValue::from("nyt"), None).unwrap_err(),
        Error::MissingKey { .. }
    ));
    assert_eq!(
        map.pop(&ScriptValue::from("nyt"), Some(&ScriptValue::Int(0)))
            .unwrap()
            .as_int(),
        Some(0)
    );

    map.set(&ScriptValue::from("wp"), &ScriptValue::Int(4))
        .unwrap();
    map.remove(&ScriptValue::from("wp")).unwrap();
    assert!(map.is_empty());
    assert!(map.remove(&ScriptValue::from("wp")).is_err());
}

#[test]
fn test_map_mutation_rejected_during_iteration() {
    let message = book();
    let map = ratings(&message);
    map.set(&ScriptValue::from("nyt"), &ScriptValue::Int(5))
        .unwrap();

    let mut iter = map.iter().unwrap();
    assert!(iter.next().is_some());
    assert!(matches!(
        map.set(&ScriptValue::from("wp"), &ScriptValue::Int(4))
            .unwrap_err(),
        Error::ConcurrentMutation { .. }
    ));
    assert!(matches!(
        map.clear().unwrap_err(),
        Error::ConcurrentMutation { .. }
    ));

    drop(iter);
    assert!(map
        .set(&ScriptValue::from("wp"), &ScriptValue::Int(4))
        .is_ok());
}

#[test]
fn test_map_with_integer_keys_sorts_numerically() {
    let library = support::library();
    let message = support::new_message(&library, "library.Book");
    let chapters = message
        .attr("chapters")
        .unwrap()
        .downcast_object::<MapProxy>()
        .unwrap()
        .clone();

    let author = support::new_message(&library, "library.Author");
    for key in [10, 2, 33] {
        chapters
            .set(&ScriptValue::Int(key), &ScriptValue::object(author.clone()))
            .unwrap();
    }
    let keys: Vec<i64> = chapters
        .keys()
        .unwrap()
        .into_iter()
        .map(|k| k.as_int().unwrap())
        .collect();
    assert_eq!(keys, vec![2, 10, 33]);
}

#[test]
fn test_map_message_values_alias() {
    let library = support::library();
    let message = support::new_message(&library, "library.Book");
    let chapters = message
        .attr("chapters")
        .unwrap()
        .downcast_object::<MapProxy>()
        .unwrap()
        .clone();

    let author = support::new_message(&library, "library.Author");
    chapters
        .set(&ScriptValue::Int(1), &ScriptValue::object(author.clone()))
        .unwrap();

    author.set_field("name", &ScriptValue::from("Frank")).unwrap();
    let through_map = chapters.get(&ScriptValue::Int(1), None).unwrap();
    let through_map = through_map.downcast_object::<MessageProxy>().unwrap();
    assert_eq!(through_map.attr("name").unwrap().as_str(), Some("Frank"));
}
