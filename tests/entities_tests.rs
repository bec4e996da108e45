mod common;

use serde_json::{json, Value};
use sigfold::{
    add_entity, entity_list, remove_entity, signal_store, with_entities, with_state,
    EntityConfig, MemberKind, StoreError,
};

#[test]
fn test_default_collection_keys() {
    let config = EntityConfig::new();
    assert_eq!(config.entity_map_key(), "entityMap");
    assert_eq!(config.ids_key(), "ids");
    assert_eq!(config.entities_key(), "entities");

    let named = EntityConfig::new().collection("todo");
    assert_eq!(named.entity_map_key(), "todoEntityMap");
    assert_eq!(named.ids_key(), "todoIds");
    assert_eq!(named.entities_key(), "todoEntities");
}

#[test]
fn test_entities_start_empty() {
    let store = signal_store([with_entities(EntityConfig::new())]).unwrap();
    assert_eq!(store.get("entityMap").unwrap(), json!({}));
    assert_eq!(store.get("ids").unwrap(), json!([]));
    assert_eq!(store.get("entities").unwrap(), json!([]));
    assert_eq!(store.member_kind("entities"), Some(MemberKind::Computed));
}

#[test]
fn test_add_keeps_insertion_order_and_replaces_by_id() {
    let config = EntityConfig::new();
    let store = signal_store([with_entities(config.clone())]).unwrap();

    store
        .patch(vec![
            add_entity(&config, json!({"id": "b", "done": false})),
            add_entity(&config, json!({"id": "a", "done": false})),
        ])
        .unwrap();
    store
        .patch(vec![add_entity(&config, json!({"id": "b", "done": true}))])
        .unwrap();

    assert_eq!(store.get("ids").unwrap(), json!(["b", "a"]));
    assert_eq!(
        store.get("entities").unwrap(),
        json!([{"id": "b", "done": true}, {"id": "a", "done": false}])
    );
}

#[test]
fn test_remove_entity() {
    let config = EntityConfig::new().collection("todo");
    let store = signal_store([with_entities(config.clone())]).unwrap();
    store
        .patch(vec![
            add_entity(&config, json!({"id": 1, "text": "milk"})),
            add_entity(&config, json!({"id": 2, "text": "eggs"})),
            remove_entity(&config, json!(1)),
        ])
        .unwrap();

    assert_eq!(store.get("todoIds").unwrap(), json!([2]));
    assert_eq!(
        entity_list(&store.state(), &config).unwrap(),
        vec![json!({"id": 2, "text": "eggs"})]
    );

    store.patch(vec![remove_entity(&config, json!(99))]).unwrap();
    assert_eq!(store.get("todoIds").unwrap(), json!([2]));
}

#[test]
fn test_custom_id_field() {
    let config = EntityConfig::new().id_field("key");
    let store = signal_store([with_entities(config.clone())]).unwrap();
    store
        .patch(vec![add_entity(&config, json!({"key": "k1", "v": 1}))])
        .unwrap();
    assert_eq!(store.get("ids").unwrap(), json!(["k1"]));
}

#[test]
fn test_entity_without_id_is_rejected() {
    let config = EntityConfig::new();
    let store = signal_store([with_entities(config.clone())]).unwrap();
    let err = store
        .patch(vec![add_entity(&config, json!({"name": "no id"}))])
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidState { .. }));
    assert_eq!(store.get("entities").unwrap(), json!([]));
}

#[test]
fn test_collections_are_independent() {
    let todos = EntityConfig::new().collection("todo");
    let users = EntityConfig::new().collection("user");
    let store = signal_store([
        with_entities(todos.clone()),
        with_entities(users.clone()),
        with_state(json!({"filter": "all"})),
    ])
    .unwrap();

    store
        .patch(vec![
            add_entity(&todos, json!({"id": 1})),
            add_entity(&users, json!({"id": "u"})),
        ])
        .unwrap();

    assert_eq!(store.get("todoEntities").unwrap(), json!([{"id": 1}]));
    assert_eq!(store.get("userEntities").unwrap(), json!([{"id": "u"}]));
    assert_eq!(store.get("filter").unwrap(), Value::from("all"));
}

#[test]
fn test_entity_list_reports_dangling_ids() {
    let config = EntityConfig::new();
    let state = common::state_of(json!({"entityMap": {}, "ids": ["ghost"]}));
    assert!(matches!(
        entity_list(&state, &config).unwrap_err(),
        StoreError::InvalidState { .. }
    ));
}
