use serde::{Deserialize, Serialize};
use serde_json::{to_string, to_string_pretty, to_value, Map, Value};

pub fn dejsonify<'a, T>(json_str: &'a str) -> serde_json::Result<T>
where
    T: Deserialize<'a>,
{
    serde_json::from_str::<T>(json_str)
}

pub fn jsonify<T>(obj: &T) -> String
where
    T: Serialize,
{
    to_value(obj)
        .and_then(|v| to_string(&jsonify_internal(&v)))
        .unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
}

pub fn jsonify_pretty<T>(obj: &T) -> String
where
    T: Serialize,
{
    to_value(obj)
        .and_then(|v| to_string_pretty(&jsonify_internal(&v)))
        .unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
}

pub fn jsonify_internal(json_value: &Value) -> Value {
    match json_value {
        Value::Object(obj) => {
            let mut sorted_map = Map::new();
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            for key in keys {
                if let Some(value) = obj.get(key) {
                    sorted_map.insert(key.clone(), jsonify_internal(value));
                }
            }
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(jsonify_internal).collect()),
        _ => json_value.clone(),
    }
}

/// Accepts either an inline json string or a path ending in `.json`.
pub fn load_json<T>(input: &str) -> anyhow::Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = if input.ends_with(".json") {
        std::fs::read_to_string(input)
            .map_err(|e| anyhow::anyhow!("Failed to read json file '{}': {}", input, e))?
    } else {
        input.to_string()
    };
    dejsonify::<T>(&content).map_err(|e| anyhow::anyhow!("Failed to parse json: {}", e))
}
