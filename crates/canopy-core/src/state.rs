//! State maps and shallow merge.

use serde_json::{Map, Value};

/// State of an instance or of the store: a flat map of JSON values.
pub type State = Map<String, Value>;

/// Shallow merge: keys of `partial` overwrite keys of `base`, every other key
/// keeps its value. Nested maps are replaced, never merged.
pub fn merge(base: &State, partial: &State) -> State {
    let mut merged = base.clone();
    for (key, value) in partial {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Build a state map from a JSON object. Any other JSON value yields an
/// empty map.
pub fn from_value(value: Value) -> State {
    match value {
        Value::Object(map) => map,
        _ => State::new(),
    }
}
