use serde_json::{Map, Value};

use super::OpenApiError;

/// Inline every local `$ref` of the document.
///
/// A reference that is already being expanded further up the tree is left as
/// a `$ref` object, so recursive schemas stop after one level.
pub fn resolve_refs(root: &Value) -> Result<Value, OpenApiError> {
    let mut expanding = Vec::new();
    resolve_value(root, root, &mut expanding)
}

fn resolve_value(
    value: &Value,
    root: &Value,
    expanding: &mut Vec<String>,
) -> Result<Value, OpenApiError> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if expanding.contains(reference) {
                    return Ok(value.clone());
                }
                let target = lookup(root, reference)?;
                expanding.push(reference.clone());
                let resolved = resolve_value(target, root, expanding);
                expanding.pop();
                return merge_siblings(resolved?, map, root, expanding);
            }

            let mut resolved = Map::new();
            for (key, item) in map {
                resolved.insert(key.clone(), resolve_value(item, root, expanding)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(item, root, expanding))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

/// Keys written next to a `$ref` (description, summary) win over the target's.
fn merge_siblings(
    resolved: Value,
    reference: &Map<String, Value>,
    root: &Value,
    expanding: &mut Vec<String>,
) -> Result<Value, OpenApiError> {
    match resolved {
        Value::Object(mut target) => {
            for (key, item) in reference {
                if key != "$ref" {
                    target.insert(key.clone(), resolve_value(item, root, expanding)?);
                }
            }
            Ok(Value::Object(target))
        }
        other => Ok(other),
    }
}

fn lookup<'a>(root: &'a Value, reference: &str) -> Result<&'a Value, OpenApiError> {
    let pointer = reference
        .strip_prefix('#')
        .ok_or_else(|| OpenApiError::RemoteRef(reference.to_string()))?;
    let pointer = urlencoding::decode(pointer)
        .map_err(|_| OpenApiError::UnresolvedRef(reference.to_string()))?;

    root.pointer(&pointer)
        .ok_or_else(|| OpenApiError::UnresolvedRef(reference.to_string()))
}
