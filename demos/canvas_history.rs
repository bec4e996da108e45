//! A circle-drawing canvas with undo and redo.
//!
//! Left clicks add circles, right clicks select one, and the radius dialog
//! resizes it. Only the `circles` slice is tracked by history, so opening and
//! closing the dialog never shows up in the undo log.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sigfold::{
    first_arg, named_args, no_payload, signal_store, with_computed, with_events, with_history,
    with_reducer, with_state, Action, History, StateChange, StateMap, StoreError,
};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct Point {
    x: i64,
    y: i64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct Circle {
    x: i64,
    y: i64,
    radius: i64,
}

fn canvas_reducer(state: &StateMap, action: &Action) -> Result<StateChange, StoreError> {
    let Some(event) = action.as_event() else {
        return Ok(StateChange::Unchanged);
    };
    let mut circles: Vec<Circle> = serde_json::from_value(state["circles"].clone())?;
    let mut next = state.clone();

    match event.event_type.as_str() {
        "canvasLeftClick" => {
            let point: Point = serde_json::from_value(event.payload.clone())?;
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
            let target: Point = serde_json::from_value(event.payload["circle"].clone())?;
            let radius = event.payload["radius"]
                .as_i64()
                .ok_or_else(|| StoreError::reducer("radius must be an integer"))?;
            for circle in circles.iter_mut() {
                if circle.x == target.x && circle.y == target.y {
                    circle.radius = radius;
                }
            }
            next.insert("circles".into(), serde_json::to_value(circles)?);
        }
        _ => return Ok(StateChange::Unchanged),
    }
    Ok(StateChange::Replace(next))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = signal_store([
        with_events([
            ("canvasLeftClick", first_arg()),
            ("canvasRightClick", first_arg()),
            ("updateRadius", named_args(&["circle", "radius"])),
            ("closeRadiusOverlay", no_payload()),
        ]),
        with_state(json!({"circles": [], "activePoint": null})),
        with_reducer(canvas_reducer),
        with_history(["circles"]),
        with_computed(|store| {
            let history = store.signal("history")?;
            let non_empty = |list: &Value| json!(list.as_array().is_some_and(|l| !l.is_empty()));
            Ok([
                ("canUndo", history.map(move |h| non_empty(&h["committed"]))),
                ("canRedo", history.map(move |h| non_empty(&h["staged"]))),
            ])
        }),
    ])?;

    let _resized = store.on("updateRadius")?.subscribe(|event| {
        println!("  resized to {}", event.payload["radius"]);
    });

    for (x, y) in [(10, 10), (40, 25), (70, 10)] {
        store.emit("canvasLeftClick", &[json!({"x": x, "y": y})])?;
    }
    println!("circles: {}", store.get("circles")?);

    let circle = json!({"x": 40, "y": 25});
    store.emit("canvasRightClick", &[circle.clone()])?;
    store.emit("updateRadius", &[circle, json!(30)])?;
    store.emit("closeRadiusOverlay", &[])?;
    println!("after resize: {}", store.get("circles")?);

    store.emit("undo", &[])?;
    println!("undo resize: {}", store.get("circles")?);
    store.emit("undo", &[])?;
    println!("undo click: {}", store.get("circles")?);
    println!(
        "canUndo = {}, canRedo = {}",
        store.get("canUndo")?,
        store.get("canRedo")?
    );

    store.emit("redo", &[])?;
    println!("redo click: {}", store.get("circles")?);

    let history = History::from_store(&store)?;
    println!(
        "history: {} committed, {} staged",
        history.committed.len(),
        history.staged.len()
    );
    Ok(())
}
