//! JSON builders for map content fixtures.

use serde_json::{json, Value};

/// Steps with the given captures, positions assigned in order.
pub fn steps_json(captures: &[i64]) -> Vec<Value> {
    captures
        .iter()
        .enumerate()
        .map(|(position, capture)| json!({"position": position, "capture": capture}))
        .collect()
}

/// A plain chapter-1 map of `count` steps, each costing `capture`.
pub fn uniform_map(count: usize, capture: i64) -> Value {
    json!({
        "chapter": 1,
        "stamina_cost": 2,
        "steps": steps_json(&vec![capture; count]),
    })
}

/// A beyond map with the given health pool.
pub fn beyond_map(count: usize, capture: i64, health: i64) -> Value {
    json!({
        "chapter": 1,
        "is_beyond": true,
        "beyond_health": health,
        "stamina_cost": 2,
        "steps": steps_json(&vec![capture; count]),
    })
}

/// A breached map carrying the given law.
pub fn breached_map(count: usize, capture: i64, health: i64, new_law: &str) -> Value {
    json!({
        "chapter": 1,
        "is_beyond": true,
        "is_breached": true,
        "beyond_health": health,
        "new_law": new_law,
        "stamina_cost": 2,
        "steps": steps_json(&vec![capture; count]),
    })
}
