use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::require_str;
use crate::ipc::types::{AppState, Request};
use crate::model::Entry;
use serde_json::json;

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let section_id = match require_str(&req.params, "sectionId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let student_id = match require_str(&req.params, "studentId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let col_id = match require_str(&req.params, "colId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    // Absent score means clearing the cell.
    let score: Entry = match req.params.get("score") {
        None => Entry::Empty,
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
        },
    };
    match store.add_score(&section_id, &student_id, &col_id, score) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_entry(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let section_id = match require_str(&req.params, "sectionId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let row_id = match require_str(&req.params, "rowId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let col_id = match require_str(&req.params, "colId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match store.get_entry(&section_id, &row_id, &col_id) {
        Ok(entry) => ok(
            &req.id,
            json!({ "entry": serde_json::to_value(&entry).unwrap_or(serde_json::Value::Null) }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.add" => Some(handle_add(state, req)),
        "scores.entry" => Some(handle_entry(state, req)),
        _ => None,
    }
}
