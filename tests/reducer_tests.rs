mod common;

use common::{state_of, CallLog};
use serde_json::json;
use sigfold::{
    apply_meta_reducers, merge_reducers, resolve_changes, to_scoped_reducer, transform, Action,
    MetaReduceFn, ReduceFn, StateChange, StateMap, StoreError,
};
use std::rc::Rc;

fn set(key: &'static str, value: i64) -> ReduceFn {
    Rc::new(move |state: Option<StateMap>, _action: &Action| -> Result<StateMap, StoreError> {
        let mut state = state.unwrap_or_default();
        state.insert(key.to_string(), json!(value));
        Ok(state)
    })
}

fn append(tag: &'static str) -> ReduceFn {
    Rc::new(move |state: Option<StateMap>, _action: &Action| -> Result<StateMap, StoreError> {
        let mut state = state.unwrap_or_default();
        let trail = state
            .get("trail")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        state.insert("trail".into(), json!(format!("{trail}{tag}")));
        Ok(state)
    })
}

fn logging_meta(log: &CallLog, name: &'static str) -> MetaReduceFn {
    let log = log.clone();
    Rc::new(move |reducer: ReduceFn| {
        let log = log.clone();
        Rc::new(move |state: Option<StateMap>, action: &Action| -> Result<StateMap, StoreError> {
            log.push(format!("before-{name}"));
            let next = reducer(state, action);
            log.push(format!("after-{name}"));
            next
        }) as ReduceFn
    })
}

#[test]
fn test_resolve_changes_variants() {
    let state = state_of(json!({"n": 1}));

    assert_eq!(resolve_changes(StateChange::Unchanged, state.clone()), state);
    assert_eq!(
        resolve_changes(StateChange::Replace(state_of(json!({"n": 9}))), state.clone())["n"],
        9
    );
    assert_eq!(
        resolve_changes(
            StateChange::update(|mut s| {
                s.insert("n".into(), json!(2));
                s
            }),
            state.clone()
        )["n"],
        2
    );
}

#[test]
fn test_sequence_applies_transforms_in_order() {
    let change = StateChange::sequence([
        transform(|mut s| {
            s.insert("order".into(), json!("a"));
            s
        }),
        transform(|mut s| {
            let order = s["order"].as_str().unwrap_or("").to_string();
            s.insert("order".into(), json!(format!("{order}b")));
            s
        }),
    ]);
    let next = resolve_changes(change, state_of(json!({})));
    assert_eq!(next["order"], "ab");
}

#[test]
fn test_scoped_reducer_only_sees_and_writes_its_keys() {
    let reducer = to_scoped_reducer(
        state_of(json!({"mine": 0})),
        |state: &StateMap, _action: &Action| {
            assert!(!state.contains_key("theirs"));
            let mut next = state.clone();
            next.insert("mine".into(), json!(1));
            next.insert("theirs".into(), json!("overwritten"));
            Ok(StateChange::Replace(next))
        },
    );

    let state = state_of(json!({"mine": 0, "theirs": "kept"}));
    let next = reducer(Some(state), &Action::event("x", json!(null))).unwrap();
    assert_eq!(next, state_of(json!({"mine": 1, "theirs": "kept"})));
}

#[test]
fn test_scoped_reducer_keeps_keys_missing_from_result() {
    let reducer = to_scoped_reducer(
        state_of(json!({"a": 1, "b": 2})),
        |_state: &StateMap, _action: &Action| Ok(StateChange::Replace(state_of(json!({"a": 5})))),
    );
    let next = reducer(None, &Action::Init).unwrap();
    assert_eq!(next, state_of(json!({"a": 5, "b": 2})));
}

#[test]
fn test_scoped_reducer_bootstraps_from_initial_state() {
    let reducer = to_scoped_reducer(
        state_of(json!({"count": 7})),
        |_state: &StateMap, _action: &Action| Ok(StateChange::Unchanged),
    );
    assert_eq!(reducer(None, &Action::Init).unwrap(), state_of(json!({"count": 7})));
}

#[test]
fn test_scoped_reducer_propagates_errors() {
    let reducer = to_scoped_reducer(
        state_of(json!({"count": 0})),
        |_state: &StateMap, _action: &Action| Err(StoreError::reducer("nope")),
    );
    let err = reducer(None, &Action::Init).unwrap_err();
    assert!(matches!(err, StoreError::Reducer { .. }));
}

#[test]
fn test_merge_runs_second_on_output_of_first() {
    let merged = merge_reducers(append("1"), vec![append("2"), append("3")]);
    let next = merged(Some(StateMap::new()), &Action::Init).unwrap();
    assert_eq!(next["trail"], "123");
}

#[test]
fn test_merge_later_reducer_wins_on_shared_key() {
    let merged = merge_reducers(set("k", 1), vec![set("k", 2)]);
    assert_eq!(merged(None, &Action::Init).unwrap()["k"], 2);

    let reversed = merge_reducers(set("k", 2), vec![set("k", 1)]);
    assert_eq!(reversed(None, &Action::Init).unwrap()["k"], 1);
}

#[test]
fn test_merge_stops_at_first_error() {
    let failing: ReduceFn =
        Rc::new(|_state: Option<StateMap>, _action: &Action| Err(StoreError::reducer("halt")));
    let merged = merge_reducers(append("1"), vec![failing, append("2")]);
    assert!(merged(None, &Action::Init).is_err());
}

#[test]
fn test_later_meta_reducer_wraps_outermost() {
    let log = CallLog::default();
    let reducer = apply_meta_reducers(
        append("base"),
        &[logging_meta(&log, "M1"), logging_meta(&log, "M2")],
    );

    reducer(None, &Action::Init).unwrap();
    assert_eq!(
        log.entries(),
        vec!["before-M2", "before-M1", "after-M1", "after-M2"]
    );
}

#[test]
fn test_no_meta_reducers_is_identity() {
    let reducer = apply_meta_reducers(set("k", 4), &[]);
    assert_eq!(reducer(None, &Action::Init).unwrap()["k"], 4);
}
