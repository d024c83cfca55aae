//! Layer merging for JSON-shaped configuration
//!
//! Tables merge key by key, recursively. Anything else in the upper layer,
//! lists included, replaces what the lower layer had.

use serde_json::Value;

/// Fold `upper` into `lower` in place
fn merge_into(lower: &mut Value, upper: Value) {
    match (lower, upper) {
        (Value::Object(lower), Value::Object(upper)) => {
            for (key, value) in upper {
                match lower.get_mut(&key) {
                    Some(slot) => merge_into(slot, value),
                    None => {
                        lower.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Merge `overlay` over `base`; an explicit null in `overlay` clears the key
pub fn deep_merge(mut base: Value, overlay: Value) -> Value {
    merge_into(&mut base, overlay);
    base
}

/// Merge layers lowest precedence first
pub fn merge_layers(layers: Vec<Value>) -> Value {
    let mut merged = Value::Null;
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}
