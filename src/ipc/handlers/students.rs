use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::require_str;
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use serde_json::json;

fn handle_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw) = req.params.get("student") else {
        return err(&req.id, "bad_params", "missing params.student", None);
    };
    let student: Student = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    match store.add_student(student) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_upsert_many(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw) = req.params.get("students") else {
        return err(&req.id, "bad_params", "missing params.students", None);
    };
    let students: Vec<Student> = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    let count = students.len();
    match store.add_students(students) {
        Ok(()) => ok(&req.id, json!({ "ok": true, "count": count })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match require_str(&req.params, "studentId") {
        Ok(v) => v.to_string(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match store.get_student(&student_id) {
        Ok(student) => ok(
            &req.id,
            json!({ "student": serde_json::to_value(&student).unwrap_or(serde_json::Value::Null) }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.upsert" => Some(handle_upsert(state, req)),
        "students.upsertMany" => Some(handle_upsert_many(state, req)),
        "students.get" => Some(handle_get(state, req)),
        _ => None,
    }
}
