//! Entity collections: a map of entities by id plus an ordered id list.

use crate::error::StoreError;
use crate::event::{into_state_map, StateMap, StateUpdate};
use crate::feature::{with_computed, with_state};
use crate::store::{signal_store_feature, Feature};
use serde_json::{json, Map, Value};

/// Names the state keys of an entity collection.
///
/// An unnamed collection uses `entityMap`, `ids`, and `entities`; a collection
/// named `todo` uses `todoEntityMap`, `todoIds`, and `todoEntities`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityConfig {
    collection: Option<String>,
    id_field: String,
}

impl Default for EntityConfig {
    fn default() -> Self {
        EntityConfig {
            collection: None,
            id_field: "id".to_string(),
        }
    }
}

impl EntityConfig {
    /// A config for an unnamed collection keyed by `id`.
    pub fn new() -> Self {
        EntityConfig::default()
    }

    /// Name the collection, prefixing its state keys (`todoEntityMap`, `todoIds`).
    pub fn collection(mut self, name: &str) -> Self {
        self.collection = Some(name.to_string());
        self
    }

    /// Field of each entity holding its id. Defaults to `"id"`.
    pub fn id_field(mut self, field: &str) -> Self {
        self.id_field = field.to_string();
        self
    }

    /// State key of the id-to-entity map.
    pub fn entity_map_key(&self) -> String {
        self.key("entityMap", "EntityMap")
    }

    /// State key of the ordered id list.
    pub fn ids_key(&self) -> String {
        self.key("ids", "Ids")
    }

    /// Key of the computed entity list.
    pub fn entities_key(&self) -> String {
        self.key("entities", "Entities")
    }

    fn key(&self, plain: &str, suffix: &str) -> String {
        match &self.collection {
            Some(collection) => format!("{collection}{suffix}"),
            None => plain.to_string(),
        }
    }
}

/// Add an entity collection: `entityMap` and `ids` state slices and an
/// `entities` computed list in id order.
///
/// # Examples
///
/// ```
/// use sigfold::{add_entity, signal_store, with_entities, EntityConfig};
/// use serde_json::json;
///
/// let config = EntityConfig::new().collection("todo");
/// let store = signal_store([with_entities(config.clone())]).unwrap();
///
/// store.patch(vec![add_entity(&config, json!({"id": 1, "text": "milk"}))]).unwrap();
/// assert_eq!(store.get("todoEntities").unwrap(), json!([{"id": 1, "text": "milk"}]));
/// ```
pub fn with_entities(config: EntityConfig) -> Feature {
    let map_key = config.entity_map_key();
    let ids_key = config.ids_key();
    let entities_key = config.entities_key();

    let mut initial = Map::new();
    initial.insert(map_key.clone(), json!({}));
    initial.insert(ids_key.clone(), json!([]));

    signal_store_feature([
        with_state(Value::Object(initial)),
        with_computed(move |store| {
            let entities = store.engine().state_signal().map(move |state: StateMap| {
                let (Some(entity_map), Some(ids)) = (state.get(&map_key), state.get(&ids_key))
                else {
                    return Value::Array(Vec::new());
                };
                let list: Vec<Value> = ids
                    .as_array()
                    .map(|ids| {
                        ids.iter()
                            .filter_map(|id| entity_map.get(id_to_key(id)).cloned())
                            .collect()
                    })
                    .unwrap_or_default();
                Value::Array(list)
            });
            Ok([(entities_key, entities)])
        }),
    ])
}

/// Patch step inserting `entity`, or replacing the entity with the same id.
///
/// A new id is appended to the id list; an entity without an id field is
/// rejected when the patch is applied.
pub fn add_entity(config: &EntityConfig, entity: Value) -> StateUpdate {
    let config = config.clone();
    StateUpdate::updater(move |state| {
        let Some(id) = entity.get(&config.id_field).cloned() else {
            return Value::Null;
        };
        let (mut entity_map, mut ids) = collection(state, &config);
        if !entity_map.contains_key(&id_to_key(&id)) {
            ids.push(id.clone());
        }
        entity_map.insert(id_to_key(&id), entity.clone());
        collection_patch(&config, entity_map, ids)
    })
}

/// Patch step removing the entity with `id`, if present.
pub fn remove_entity(config: &EntityConfig, id: Value) -> StateUpdate {
    let config = config.clone();
    StateUpdate::updater(move |state| {
        let (mut entity_map, mut ids) = collection(state, &config);
        entity_map.remove(&id_to_key(&id));
        ids.retain(|existing| existing != &id);
        collection_patch(&config, entity_map, ids)
    })
}

/// Read the entities of a collection in id order.
pub fn entity_list(state: &StateMap, config: &EntityConfig) -> Result<Vec<Value>, StoreError> {
    let (entity_map, ids) = collection(state, config);
    ids.iter()
        .map(|id| {
            entity_map
                .get(&id_to_key(id))
                .cloned()
                .ok_or_else(|| StoreError::InvalidState {
                    reason: format!("id `{id}` has no entity in `{}`", config.entity_map_key()),
                })
        })
        .collect()
}

fn collection(state: &StateMap, config: &EntityConfig) -> (Map<String, Value>, Vec<Value>) {
    let entity_map = state
        .get(&config.entity_map_key())
        .cloned()
        .and_then(|value| into_state_map(value).ok())
        .unwrap_or_default();
    let ids = match state.get(&config.ids_key()) {
        Some(Value::Array(ids)) => ids.clone(),
        _ => Vec::new(),
    };
    (entity_map, ids)
}

fn collection_patch(
    config: &EntityConfig,
    entity_map: Map<String, Value>,
    ids: Vec<Value>,
) -> Value {
    let mut patch = Map::new();
    patch.insert(config.entity_map_key(), Value::Object(entity_map));
    patch.insert(config.ids_key(), Value::Array(ids));
    Value::Object(patch)
}

fn id_to_key(id: &Value) -> String {
    match id {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    }
}
