mod common;

use common::{canvas_store, circles, click, Circle};
use serde_json::{json, Value};
use sigfold::history::{HISTORY_KEY, REDO, UNDO};
use sigfold::{
    first_arg, no_payload, signal_store, with_events, with_history, with_reducer, with_state,
    Action, History, SignalStore, StateChange, StateMap, StoreError,
};

fn history(store: &SignalStore) -> History {
    History::from_store(store).unwrap()
}

fn undo(store: &SignalStore) {
    store.emit(UNDO, &[]).unwrap();
}

fn redo(store: &SignalStore) {
    store.emit(REDO, &[]).unwrap();
}

/// `add` and `double` do not commute, so replay order is observable.
fn arithmetic_store() -> SignalStore {
    signal_store([
        with_events([("add", first_arg()), ("double", no_payload())]),
        with_state(json!({"value": 0})),
        with_reducer(|state: &StateMap, action: &Action| {
            let Some(event) = action.as_event() else {
                return Ok(StateChange::Unchanged);
            };
            let value = state["value"].as_i64().unwrap_or(0);
            let next = match event.event_type.as_str() {
                "add" => value + event.payload.as_i64().unwrap_or(0),
                "double" => value * 2,
                _ => return Ok(StateChange::Unchanged),
            };
            let mut state = state.clone();
            state.insert("value".into(), json!(next));
            Ok(StateChange::Replace(state))
        }),
        with_history(["value"]),
    ])
    .unwrap()
}

fn value(store: &SignalStore) -> i64 {
    store.get("value").unwrap().as_i64().unwrap()
}

#[test]
fn test_history_starts_empty() {
    let store = canvas_store();
    let history = history(&store);
    assert!(history.is_empty());
    assert!(!history.can_undo());
    assert!(!history.can_redo());
    assert!(store.has_event(UNDO));
    assert!(store.has_event(REDO));
}

#[test]
fn test_click_undo_redo_round_trip() {
    let store = canvas_store();

    click(&store, 1, 1);
    assert_eq!(circles(&store), vec![Circle { x: 1, y: 1, radius: 10 }]);
    let after_click = history(&store);
    assert_eq!(after_click.committed.len(), 1);
    assert_eq!(after_click.committed[0].event_type, "canvasLeftClick");
    assert_eq!(after_click.committed[0].payload, Some(json!({"x": 1, "y": 1})));

    undo(&store);
    assert!(circles(&store).is_empty());
    let after_undo = history(&store);
    assert!(after_undo.committed.is_empty());
    assert_eq!(after_undo.staged, after_click.committed);

    redo(&store);
    assert_eq!(circles(&store), vec![Circle { x: 1, y: 1, radius: 10 }]);
    assert_eq!(history(&store), after_click);
}

#[test]
fn test_undo_and_redo_on_empty_lists_are_noops() {
    let store = canvas_store();
    let before = store.state();

    undo(&store);
    redo(&store);
    assert_eq!(store.state(), before);

    click(&store, 3, 4);
    redo(&store);
    assert_eq!(circles(&store).len(), 1);
    assert_eq!(history(&store).committed.len(), 1);
}

#[test]
fn test_untracked_changes_are_not_recorded() {
    let store = canvas_store();
    click(&store, 1, 1);
    store
        .emit("canvasRightClick", &[json!({"x": 1, "y": 1})])
        .unwrap();

    assert_eq!(history(&store).committed.len(), 1);
    assert_eq!(store.get("activePoint").unwrap(), json!({"x": 1, "y": 1}));

    undo(&store);
    assert!(circles(&store).is_empty());
    assert_eq!(store.get("activePoint").unwrap(), json!({"x": 1, "y": 1}));
}

#[test]
fn test_untracked_changes_keep_redo_list() {
    let store = canvas_store();
    click(&store, 1, 1);
    undo(&store);

    store.emit("closeRadiusOverlay", &[]).unwrap();
    assert_eq!(history(&store).staged.len(), 1);

    redo(&store);
    assert_eq!(circles(&store).len(), 1);
}

#[test]
fn test_unchanged_reduction_is_not_recorded() {
    let store = canvas_store();
    click(&store, 2, 2);
    click(&store, 2, 2);
    assert_eq!(circles(&store).len(), 1);
    assert_eq!(history(&store).committed.len(), 1);
}

#[test]
fn test_new_commit_clears_redo_list() {
    let store = canvas_store();
    click(&store, 1, 1);
    click(&store, 2, 2);
    undo(&store);
    assert_eq!(history(&store).staged.len(), 1);

    click(&store, 5, 5);
    let history = history(&store);
    assert!(history.staged.is_empty());
    assert_eq!(history.committed.len(), 2);
    assert_eq!(
        circles(&store),
        vec![
            Circle { x: 1, y: 1, radius: 10 },
            Circle { x: 5, y: 5, radius: 10 }
        ]
    );

    redo(&store);
    assert_eq!(circles(&store).len(), 2);
}

#[test]
fn test_undo_restores_radius() {
    let store = canvas_store();
    click(&store, 1, 1);
    let circle = json!({"x": 1, "y": 1, "radius": 10});
    store.emit("updateRadius", &[circle, json!(25)]).unwrap();
    assert_eq!(circles(&store)[0].radius, 25);

    undo(&store);
    assert_eq!(circles(&store)[0].radius, 10);
    redo(&store);
    assert_eq!(circles(&store)[0].radius, 25);
}

#[test]
fn test_multiple_undos_pop_most_recent_first() {
    let store = canvas_store();
    for i in 0..3 {
        click(&store, i, i);
    }

    undo(&store);
    undo(&store);
    let history = history(&store);
    assert_eq!(history.committed.len(), 1);
    assert_eq!(history.staged.len(), 2);
    assert!(history.staged[0].seq > history.staged[1].seq);
    assert_eq!(circles(&store), vec![Circle { x: 0, y: 0, radius: 10 }]);

    redo(&store);
    assert_eq!(circles(&store).len(), 2);
    assert_eq!(circles(&store)[1], Circle { x: 1, y: 1, radius: 10 });
}

#[test]
fn test_replay_preserves_action_order() {
    let store = arithmetic_store();
    store.emit("add", &[json!(1)]).unwrap();
    store.emit("double", &[]).unwrap();
    store.emit("add", &[json!(3)]).unwrap();
    assert_eq!(value(&store), 5);

    undo(&store);
    assert_eq!(value(&store), 2);
    undo(&store);
    assert_eq!(value(&store), 1);
    undo(&store);
    assert_eq!(value(&store), 0);

    redo(&store);
    redo(&store);
    assert_eq!(value(&store), 2);
    redo(&store);
    assert_eq!(value(&store), 5);
}

#[test]
fn test_patches_to_tracked_keys_are_undoable() {
    let store = arithmetic_store();
    store
        .patch(vec![sigfold::StateUpdate::partial(json!({"value": 10}))])
        .unwrap();
    store.emit("double", &[]).unwrap();
    assert_eq!(value(&store), 20);

    let history = history(&store);
    assert_eq!(history.committed[0].event_type, "@@patch-state");

    undo(&store);
    assert_eq!(value(&store), 10);
    undo(&store);
    assert_eq!(value(&store), 0);
}

#[test]
fn test_history_slice_is_published_state() {
    let store = canvas_store();
    click(&store, 1, 1);
    let raw: Value = store.get(HISTORY_KEY).unwrap();
    assert_eq!(raw["committed"][0]["type"], "canvasLeftClick");
    assert_eq!(raw["staged"], json!([]));
    assert_eq!(History::from_state(&store.state()).unwrap(), history(&store));
}

#[test]
fn test_entries_carry_event_payloads() {
    let store = arithmetic_store();
    store.emit("add", &[json!(5)]).unwrap();
    store
        .patch(vec![sigfold::StateUpdate::partial(json!({"value": 1}))])
        .unwrap();

    let snapshot = history(&store);
    assert_eq!(snapshot.committed[0].payload, Some(json!(5)));
    assert_eq!(snapshot.committed[1].payload, None);

    let raw: Value = store.get(HISTORY_KEY).unwrap();
    assert_eq!(raw["committed"][0]["payload"], 5);
    assert!(raw["committed"][1].get("payload").is_none());

    undo(&store);
    assert_eq!(history(&store).staged[0].payload, None);
    undo(&store);
    assert_eq!(history(&store).staged[0].payload, Some(json!(5)));
}

#[test]
fn test_failed_action_leaves_history_untouched() {
    let store = canvas_store();
    click(&store, 1, 1);
    let before = history(&store);

    let err = store
        .emit("canvasLeftClick", &[json!("not a point")])
        .unwrap_err();
    assert!(matches!(err, StoreError::Json(_)));
    assert_eq!(history(&store), before);
}

#[test]
fn test_history_listeners_see_undo_events() {
    let store = canvas_store();
    let undos = store.on(UNDO).unwrap().receiver();
    click(&store, 1, 1);
    undo(&store);
    undo(&store);
    assert_eq!(undos.len(), 2);
}
