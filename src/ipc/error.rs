use crate::err::GradesErr;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Engine errors map onto the wire by kind: `not_found`, `bad_content`, `db`.
pub fn engine_err(id: &str, e: &GradesErr) -> serde_json::Value {
    err(id, e.kind.code(), e.message.clone(), None)
}
