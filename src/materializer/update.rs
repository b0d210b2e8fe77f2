// Update-operator semantics (spec §4.7.2).

use serde_json::{Map, Value};

fn split_path(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

/// Walks `segments` from `root`, creating intermediate maps as needed, and
/// returns a mutable reference to the final segment's slot. If an
/// intermediate segment exists but isn't a map, it is overwritten with a
/// fresh one and traversal continues — documented behavior (spec §9).
fn walk_create<'a>(root: &'a mut Value, segments: &[&str]) -> &'a mut Value {
    let mut current = root;
    for segment in segments {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let obj = current.as_object_mut().unwrap();
        current = obj
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    current
}

/// Walks `segments` without creating anything; returns `None` as soon as a
/// segment is missing.
fn walk_existing<'a>(root: &'a mut Value, segments: &[&str]) -> Option<(&'a mut Map<String, Value>, &'a str)> {
    let (last, init) = segments.split_last()?;
    let mut current = root;
    for segment in init {
        current = current.get_mut(*segment)?;
    }
    current.as_object_mut().map(|obj| (obj, *last))
}

fn set_field(document: &mut Value, path: &str, value: Value) {
    let segments = split_path(path);
    let (init, last) = segments.split_at(segments.len() - 1);
    let target = walk_create(document, init);
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    target
        .as_object_mut()
        .unwrap()
        .insert(last[0].to_string(), value);
}

fn unset_field(document: &mut Value, path: &str) {
    let segments = split_path(path);
    if let Some((obj, last)) = walk_existing(document, &segments) {
        obj.remove(last);
    }
}

fn inc_field(document: &mut Value, path: &str, amount: f64) {
    let segments = split_path(path);
    let (init, last) = segments.split_at(segments.len() - 1);
    let target = walk_create(document, init);
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let obj = target.as_object_mut().unwrap();
    let existing = obj.get(last[0]);
    // Open question (spec §9): a non-numeric existing value coerces to 0.0
    // rather than erroring.
    let current = existing.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }).unwrap_or(0.0);
    let updated = current + amount;
    obj.insert(
        last[0].to_string(),
        serde_json::Number::from_f64(updated)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    );
}

/// Applies `$set`/`$unset`/`$inc` from `update` to `document` in place.
pub fn apply(document: &mut Value, update: &Value) {
    let Some(update_obj) = update.as_object() else {
        return;
    };

    if let Some(Value::Object(sets)) = update_obj.get("$set") {
        for (path, value) in sets {
            set_field(document, path, value.clone());
        }
    }

    if let Some(unsets) = update_obj.get("$unset") {
        if let Some(arr) = unsets.as_array() {
            for path in arr.iter().filter_map(|v| v.as_str()) {
                unset_field(document, path);
            }
        } else if let Some(obj) = unsets.as_object() {
            for path in obj.keys() {
                unset_field(document, path);
            }
        }
    }

    if let Some(Value::Object(incs)) = update_obj.get("$inc") {
        for (path, amount) in incs {
            let amount = amount.as_f64().unwrap_or(0.0);
            inc_field(document, path, amount);
        }
    }
}
