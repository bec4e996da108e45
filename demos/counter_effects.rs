//! Counter with methods, computed values, hooks, and an effect.
//!
//! The effect listens for `incremented` events and emits `milestone` every
//! time the count reaches a multiple of five.

use serde_json::{json, Value};
use sigfold::{
    first_arg, method, no_payload, signal_store_feature, with_computed, with_effects,
    with_events, with_hooks, with_methods, with_reducer, with_state, Action, Feature, SignalStore,
    StateChange, StateMap, StoreHooks,
};

fn counter_feature() -> Feature {
    signal_store_feature([
        with_events([("incremented", no_payload()), ("milestone", first_arg())]),
        with_state(json!({"count": 0, "milestones": []})),
        with_reducer(|state: &StateMap, action: &Action| {
            let mut next = state.clone();
            if action.is("incremented") {
                let count = state["count"].as_i64().unwrap_or(0);
                next.insert("count".into(), json!(count + 1));
            } else if let Some(event) = action.as_event().filter(|e| e.event_type == "milestone") {
                let mut milestones = state["milestones"].as_array().cloned().unwrap_or_default();
                milestones.push(event.payload.clone());
                next.insert("milestones".into(), Value::Array(milestones));
            } else {
                return Ok(StateChange::Unchanged);
            }
            Ok(StateChange::Replace(next))
        }),
        with_computed(|store| {
            let count = store.signal("count")?;
            Ok([("isEven", count.map(|c| json!(c.as_i64().unwrap_or(0) % 2 == 0)))])
        }),
        with_methods(|store| {
            let store = store.clone();
            Ok([(
                "increment",
                method(move |_| {
                    store.emit("incremented", &[])?;
                    store.get("count")
                }),
            )])
        }),
    ])
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = SignalStore::builder()
        .name("counter")
        .feature(counter_feature())
        .feature(with_effects(|store| {
            let emitter = store.clone();
            let milestones = store.on("incremented")?.subscribe(move |_| {
                let count = emitter.get("count").ok().and_then(|c| c.as_i64());
                if let Some(count) = count.filter(|c| c % 5 == 0) {
                    if let Err(e) = emitter.emit("milestone", &[json!(count)]) {
                        eprintln!("milestone failed: {e}");
                    }
                }
            });
            Ok(vec![milestones])
        }))
        .feature(with_hooks(
            StoreHooks::new()
                .on_init(|store| println!("init: count = {}", store.state()["count"]))
                .on_destroy(|_| println!("destroyed")),
        ))
        .build()?;

    for _ in 0..12 {
        let count = store.call("increment", &[])?;
        println!("count = {count}, even = {}", store.get("isEven")?);
    }
    println!("milestones: {}", store.get("milestones")?);

    store.destroy();
    match store.call("increment", &[]) {
        Ok(_) => println!("unexpected dispatch after destroy"),
        Err(e) => println!("after destroy: {e}"),
    }
    Ok(())
}
