//! Bridges the AST's [`Value`](crate::ast::Value) (parameters, literals) to
//! `serde_json::Value` (property storage / row shaping) and to SQL parameter
//! binding, per spec §6 "parameter conventions".

use crate::ast::Value;
use serde_json::Value as Json;

pub fn value_to_json(v: &Value) -> Json {
    match v {
        Value::Null => Json::Null,
        // Booleans are coerced to 0/1 at the store boundary (spec §6), but
        // inside a JSON property document they stay real JSON booleans.
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Str(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                map.insert(k.clone(), value_to_json(v));
            }
            Json::Object(map)
        }
    }
}

pub fn json_to_value(j: &Json) -> Value {
    match j {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        Json::Object(map) => {
            Value::Map(map.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect())
        }
    }
}

/// A parameter as bound positionally into generated SQL. Values pass through
/// unchanged for scalars; booleans coerce to integer 0/1; lists/maps
/// serialize to JSON text (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

pub fn value_to_sql_param(v: &Value) -> SqlParam {
    match v {
        Value::Null => SqlParam::Null,
        Value::Bool(b) => SqlParam::Int(if *b { 1 } else { 0 }),
        Value::Int(i) => SqlParam::Int(*i),
        Value::Float(f) => SqlParam::Float(*f),
        Value::Str(s) => SqlParam::Text(s.clone()),
        Value::List(_) | Value::Map(_) => {
            SqlParam::Text(value_to_json(v).to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars() {
        for v in [
            Value::Null,
            Value::Bool(true),
            Value::Int(42),
            Value::Float(1.5),
            Value::Str("hi".into()),
        ] {
            let j = value_to_json(&v);
            let back = json_to_value(&j);
            assert_eq!(v, back);
        }
    }

    #[test]
    fn bool_coerces_to_integer_param() {
        assert_eq!(value_to_sql_param(&Value::Bool(true)), SqlParam::Int(1));
        assert_eq!(value_to_sql_param(&Value::Bool(false)), SqlParam::Int(0));
    }

    #[test]
    fn list_param_serializes_to_json_text() {
        let v = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(value_to_sql_param(&v), SqlParam::Text("[1,2]".to_string()));
    }
}
