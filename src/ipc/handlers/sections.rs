use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{opt_str_vec, require_str, table_json};
use crate::ipc::types::{AppState, Request};
use crate::model::{Entry, SectionInfo};
use serde_json::json;

macro_rules! store_or_err {
    ($state:expr, $req:expr) => {
        match $state.store.as_mut() {
            Some(store) => store,
            None => return err(&$req.id, "no_workspace", "select a workspace first", None),
        }
    };
}

fn parse_info(req: &Request) -> Result<SectionInfo, serde_json::Value> {
    let Some(raw) = req.params.get("info") else {
        return Err(err(&req.id, "bad_params", "missing params.info", None));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

/// Raw rows keyed by student id, each an object of column id to entry.
/// Object insertion order carries through to load order.
fn parse_rows(req: &Request) -> Result<Vec<(String, Vec<(String, Entry)>)>, serde_json::Value> {
    let Some(serde_json::Value::Object(raw)) = req.params.get("rows") else {
        return Err(err(
            &req.id,
            "bad_params",
            "missing or non-object params.rows",
            None,
        ));
    };
    let mut rows = Vec::with_capacity(raw.len());
    for (student_id, row) in raw {
        let serde_json::Value::Object(cells) = row else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("params.rows.{} must be an object", student_id),
                None,
            ));
        };
        let mut entries = Vec::with_capacity(cells.len());
        for (col_id, cell) in cells {
            let entry: Entry = serde_json::from_value(cell.clone())
                .map_err(|e| err(&req.id, "bad_params", e.to_string(), None))?;
            entries.push((col_id.clone(), entry));
        }
        rows.push((student_id.clone(), entries));
    }
    Ok(rows)
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = store_or_err!(state, req);
    let info = match parse_info(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let section_id = info.id.clone();
    match store.add_section_info(info) {
        Ok(()) => ok(&req.id, json!({ "sectionId": section_id })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = store_or_err!(state, req);
    let section_id = match require_str(&req.params, "sectionId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match store.rm_section(&section_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_info(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = store_or_err!(state, req);
    let section_id = match require_str(&req.params, "sectionId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match store.get_section_info(&section_id) {
        Ok(info) => ok(
            &req.id,
            json!({ "info": serde_json::to_value(info).unwrap_or(serde_json::Value::Null) }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_enroll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = store_or_err!(state, req);
    let section_id = match require_str(&req.params, "sectionId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let student_id = match require_str(&req.params, "studentId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match store.enroll_student(&section_id, &student_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_enrolled_ids(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = store_or_err!(state, req);
    let section_id = match require_str(&req.params, "sectionId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match store.get_enrolled_student_ids(&section_id) {
        Ok(ids) => ok(&req.id, json!({ "studentIds": ids })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_data(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = store_or_err!(state, req);
    let section_id = match require_str(&req.params, "sectionId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let row_ids = match opt_str_vec(&req.params, "rowIds") {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let col_ids = match opt_str_vec(&req.params, "colIds") {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match store.get_section_data(&section_id, &row_ids, &col_ids) {
        Ok(table) => ok(&req.id, json!({ "data": table_json(&table) })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_raw_data(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = store_or_err!(state, req);
    let section_id = match require_str(&req.params, "sectionId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match store.get_raw_data(&section_id) {
        Ok(table) => ok(&req.id, json!({ "data": table_json(&table) })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_student_row(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = store_or_err!(state, req);
    let section_id = match require_str(&req.params, "sectionId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let student_id = match require_str(&req.params, "studentId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match store.get_student_data(&section_id, &student_id) {
        Ok(table) => ok(&req.id, json!({ "data": table_json(&table) })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_aggr_rows(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = store_or_err!(state, req);
    let section_id = match require_str(&req.params, "sectionId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match store.get_aggr_rows(&section_id) {
        Ok(table) => ok(&req.id, json!({ "data": table_json(&table) })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = store_or_err!(state, req);
    let info = match parse_info(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let rows = match parse_rows(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let section_id = info.id.clone();
    match store.load_section(info, rows) {
        Ok(()) => ok(&req.id, json!({ "sectionId": section_id })),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sections.create" => Some(handle_create(state, req)),
        "sections.remove" => Some(handle_remove(state, req)),
        "sections.info" => Some(handle_info(state, req)),
        "sections.enroll" => Some(handle_enroll(state, req)),
        "sections.enrolledIds" => Some(handle_enrolled_ids(state, req)),
        "sections.data" => Some(handle_data(state, req)),
        "sections.rawData" => Some(handle_raw_data(state, req)),
        "sections.studentRow" => Some(handle_student_row(state, req)),
        "sections.aggrRows" => Some(handle_aggr_rows(state, req)),
        "sections.load" => Some(handle_load(state, req)),
        _ => None,
    }
}
