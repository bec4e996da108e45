//! State containers without feature composition.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sigfold::{
    add_entity, get_state, patch_state, remove_entity, signal_store, with_entities, Action,
    EntityConfig, Event, SignalReducer, SignalState, StateChange, StateMap, StateUpdate,
    StoreError,
};

#[derive(Debug, Serialize, Deserialize)]
struct Profile {
    name: String,
    visits: u32,
}

fn todo_reducer(state: &StateMap, action: &Action) -> Result<StateChange, StoreError> {
    if !action.is("toggleAll") {
        return Ok(StateChange::Unchanged);
    }
    let done = !state["allDone"].as_bool().unwrap_or(false);
    Ok(StateChange::update(move |mut state| {
        state.insert("allDone".into(), json!(done));
        state
    }))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let profile = SignalState::new(Profile {
        name: "ada".into(),
        visits: 0,
    })?;
    let visits = profile.signal("visits");
    for _ in 0..3 {
        patch_state(
            &profile,
            vec![StateUpdate::updater(|s| {
                json!({"visits": s["visits"].as_u64().unwrap_or(0) + 1})
            })],
        )?;
    }
    println!("visits signal = {}", visits.read());
    println!("profile = {:?}", profile.state_as::<Profile>()?);

    let todos = SignalReducer::new(todo_reducer, json!({"allDone": false}))?;
    todos.dispatch(Event::new("toggleAll", json!(null)))?;
    println!("allDone = {}", get_state(&todos)["allDone"]);

    let config = EntityConfig::new().collection("todo");
    let store = signal_store([with_entities(config.clone())])?;
    store.patch(vec![
        add_entity(&config, json!({"id": 1, "text": "write docs"})),
        add_entity(&config, json!({"id": 2, "text": "ship"})),
    ])?;
    store.patch(vec![remove_entity(&config, json!(1))])?;
    println!("todos = {}", store.get("todoEntities")?);
    Ok(())
}
