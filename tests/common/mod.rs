#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sigfold::{
    first_arg, named_args, no_payload, signal_store, with_events, with_history, with_reducer,
    with_state, Action, SignalStore, StateChange, StateMap, StoreError,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub x: i64,
    pub y: i64,
    pub radius: i64,
}

pub fn canvas_initial_state() -> Value {
    json!({"circles": [], "activePoint": null})
}

pub fn canvas_events() -> sigfold::Feature {
    with_events([
        ("canvasLeftClick", first_arg()),
        ("canvasRightClick", first_arg()),
        ("updateRadius", named_args(&["circle", "radius"])),
        ("closeRadiusOverlay", no_payload()),
    ])
}

pub fn canvas_reducer(state: &StateMap, action: &Action) -> Result<StateChange, StoreError> {
    let Some(event) = action.as_event() else {
        return Ok(StateChange::Unchanged);
    };
    let mut next = state.clone();

    match event.event_type.as_str() {
        "canvasLeftClick" => {
            let point: Point = serde_json::from_value(event.payload.clone())?;
            let mut circles: Vec<Circle> = serde_json::from_value(state["circles"].clone())?;
            if circles.iter().any(|c| c.x == point.x && c.y == point.y) {
                return Ok(StateChange::Unchanged);
            }
            circles.push(Circle {
                x: point.x,
                y: point.y,
                radius: 10,
            });
            next.insert("circles".into(), serde_json::to_value(circles)?);
        }
        "canvasRightClick" => {
            next.insert("activePoint".into(), event.payload.clone());
        }
        "closeRadiusOverlay" => {
            next.insert("activePoint".into(), Value::Null);
        }
        "updateRadius" => {
            let target: Circle = serde_json::from_value(event.payload["circle"].clone())?;
            let radius = event.payload["radius"].as_i64().unwrap_or(target.radius);
            let circles: Vec<Circle> = serde_json::from_value(state["circles"].clone())?;
            let circles: Vec<Circle> = circles
                .into_iter()
                .map(|c| {
                    if c.x == target.x && c.y == target.y {
                        Circle { radius, ..c }
                    } else {
                        c
                    }
                })
                .collect();
            next.insert("circles".into(), serde_json::to_value(circles)?);
        }
        _ => return Ok(StateChange::Unchanged),
    }
    Ok(StateChange::Replace(next))
}

/// The circle-drawing store: events, state, reducer, then history over `circles`.
pub fn canvas_store() -> SignalStore {
    signal_store([
        canvas_events(),
        with_state(canvas_initial_state()),
        with_reducer(canvas_reducer),
        with_history(["circles"]),
    ])
    .unwrap()
}

pub fn circles(store: &SignalStore) -> Vec<Circle> {
    store.get_as("circles").unwrap()
}

pub fn click(store: &SignalStore, x: i64, y: i64) {
    store
        .emit("canvasLeftClick", &[json!({"x": x, "y": y})])
        .unwrap();
}

/// Shared log for ordering assertions.
#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

pub fn state_of(value: Value) -> StateMap {
    sigfold::into_state_map(value).unwrap()
}
