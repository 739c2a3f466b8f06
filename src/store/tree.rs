//! Path addressing over a JSON tree, with the realtime database's rules:
//! writing `null` deletes, and objects left empty disappear.

use serde_json::{Map, Value};

/// Split `a/b/c` (leading/trailing slashes ignored) into segments.
pub fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Value at `path`, or `Null` if any segment is missing.
pub fn get_at<'a>(root: &'a Value, path: &[String]) -> &'a Value {
    let mut node = root;
    for key in path {
        match node.get(key.as_str()) {
            Some(child) => node = child,
            None => return &Value::Null,
        }
    }
    node
}

/// Replace the value at `path`. `Null` removes it and prunes empty parents.
pub fn set_at(root: &mut Value, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        *root = normalize(value);
        return;
    };

    if !root.is_object() {
        if value.is_null() {
            return;
        }
        *root = Value::Object(Map::new());
    }
    let Value::Object(map) = root else {
        return;
    };

    if rest.is_empty() {
        let value = normalize(value);
        if value.is_null() {
            map.remove(first);
        } else {
            map.insert(first.clone(), value);
        }
    } else {
        let child = map.entry(first.clone()).or_insert(Value::Null);
        set_at(child, rest, value);
        if child.is_null() {
            map.remove(first);
        }
    }

    if map.is_empty() {
        *root = Value::Null;
    }
}

/// Apply a multi-field update below `path`. Keys may themselves be paths.
pub fn merge_at(root: &mut Value, path: &[String], fields: Map<String, Value>) {
    for (key, value) in fields {
        let mut target = path.to_vec();
        target.extend(segments(&key));
        set_at(root, &target, value);
    }
}

/// Drop nulls and empty objects inside a freshly written value.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

/// Whether a write at `written` can change what a watcher of `watched` sees.
pub fn overlaps(watched: &[String], written: &[String]) -> bool {
    watched.iter().zip(written).all(|(a, b)| a == b)
}
