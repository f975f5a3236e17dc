use crate::grades::Table;
use serde_json::{Map, Value};

pub fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing params.{}", key))
}

/// Optional array-of-strings parameter; absent and null mean empty.
pub fn opt_str_vec(params: &Value, key: &str) -> Result<Vec<String>, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| format!("params.{} must be an array of strings", key))
            })
            .collect(),
        Some(_) => Err(format!("params.{} must be an array of strings", key)),
    }
}

/// JSON object keyed by row id then column id. Insertion order carries the
/// table's row/column order (serde_json preserves it).
pub fn table_json(table: &Table) -> Value {
    let mut rows = Map::new();
    for (row_id, entries) in table {
        let mut row = Map::new();
        for (col_id, entry) in entries {
            row.insert(
                col_id.clone(),
                serde_json::to_value(entry).unwrap_or(Value::Null),
            );
        }
        rows.insert(row_id.clone(), Value::Object(row));
    }
    Value::Object(rows)
}
