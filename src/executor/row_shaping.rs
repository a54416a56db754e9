//! Converts raw SQLite rows (JSON-string columns) into public [`Value`]s,
//! reconstituting the `_nf_id`/`_nf_label`/`_nf_type` sentinel fields into a
//! clean node/edge shape (`{id, labels|type, properties}`) rather than
//! leaking the internal convention into results (spec §4.3.5, §9).
//!
//! A node with exactly one label collapses `labels` to a bare string instead
//! of a one-element array — a deliberate asymmetry (most real graphs are
//! single-labeled, and flattening the common case reads better than forcing
//! every caller to unwrap a singleton array) recorded as an Open Question
//! decision.

use serde_json::Value as Json;

use crate::ast::Value;
use crate::value::json_to_value;

pub fn shape_column(raw: &Json) -> Value {
    match raw {
        Json::Object(map) if map.contains_key("_nf_id") => shape_entity(map),
        Json::Array(items) => Value::List(items.iter().map(shape_column).collect()),
        other => json_to_value(other),
    }
}

fn shape_entity(map: &serde_json::Map<String, Json>) -> Value {
    let id = map.get("_nf_id").cloned().unwrap_or(Json::Null);
    let mut properties = serde_json::Map::new();
    for (k, v) in map {
        if !k.starts_with("_nf_") {
            properties.insert(k.clone(), v.clone());
        }
    }
    let mut out = serde_json::Map::new();
    out.insert("id".to_string(), id);
    if let Some(Json::Array(labels)) = map.get("_nf_label") {
        let label_value = match labels.as_slice() {
            [single] => single.clone(),
            _ => Json::Array(labels.clone()),
        };
        out.insert("labels".to_string(), label_value);
    }
    if let Some(ty) = map.get("_nf_type") {
        out.insert("type".to_string(), ty.clone());
    }
    out.insert("properties".to_string(), Json::Object(properties));
    json_to_value(&Json::Object(out))
}

pub fn shape_row(raw: &[Json]) -> Vec<Value> {
    raw.iter().map(shape_column).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!(null), Value::Null; "null")]
    #[test_case(json!(true), Value::Bool(true); "bool")]
    #[test_case(json!(42), Value::Int(42); "int")]
    #[test_case(json!("hi"), Value::Str("hi".to_string()); "string")]
    fn shapes_plain_scalars(raw: Json, expected: Value) {
        assert_eq!(shape_column(&raw), expected);
    }

    #[test]
    fn collapses_single_label_to_scalar() {
        let raw = json!({"_nf_id": "n1", "_nf_label": ["User"], "name": "Ann"});
        let shaped = shape_column(&raw);
        if let Value::Map(entries) = shaped {
            let labels = entries.iter().find(|(k, _)| k == "labels").unwrap();
            assert_eq!(labels.1, Value::Str("User".to_string()));
        } else {
            panic!("expected map");
        }
    }

    #[test]
    fn keeps_multi_label_array() {
        let raw = json!({"_nf_id": "n1", "_nf_label": ["User", "Admin"]});
        let shaped = shape_column(&raw);
        if let Value::Map(entries) = shaped {
            let labels = entries.iter().find(|(k, _)| k == "labels").unwrap();
            assert!(matches!(labels.1, Value::List(_)));
        } else {
            panic!("expected map");
        }
    }

}
