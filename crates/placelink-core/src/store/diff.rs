//! JSON object diffs.
//!
//! Nested objects diff recursively. Arrays and scalars are replaced whole.
//! A key present before and absent after is recorded as `"-=key": null`.

use super::StorageResult;
use crate::placeables::Placeable;
use serde_json::{Map, Value};

const DELETION_PREFIX: &str = "-=";

/// Changed fields of `after` relative to `before`.
///
/// Non-object inputs produce an empty diff.
pub fn diff_values(before: &Value, after: &Value) -> Map<String, Value> {
    let (Some(before), Some(after)) = (before.as_object(), after.as_object()) else {
        return Map::new();
    };
    let mut changes = Map::new();
    for (key, new_value) in after {
        match before.get(key) {
            Some(old_value) if old_value == new_value => {}
            Some(old_value) if old_value.is_object() && new_value.is_object() => {
                let nested = diff_values(old_value, new_value);
                if !nested.is_empty() {
                    changes.insert(key.clone(), Value::Object(nested));
                }
            }
            _ => {
                changes.insert(key.clone(), new_value.clone());
            }
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            changes.insert(format!("{DELETION_PREFIX}{key}"), Value::Null);
        }
    }
    changes
}

/// Merge a diff into `target` in place.
pub fn merge_changes(target: &mut Map<String, Value>, changes: &Map<String, Value>) {
    for (key, value) in changes {
        if let Some(removed) = key.strip_prefix(DELETION_PREFIX) {
            target.remove(removed);
            continue;
        }
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_changes(existing, nested);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Apply a diff to a document through its JSON form.
pub fn apply_changes(document: &mut Placeable, changes: &Map<String, Value>) -> StorageResult<()> {
    let mut value = serde_json::to_value(&*document)?;
    if let Value::Object(map) = &mut value {
        merge_changes(map, changes);
    }
    *document = serde_json::from_value(value)?;
    Ok(())
}
