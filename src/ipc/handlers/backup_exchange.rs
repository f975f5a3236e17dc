use crate::aggr::AggrFns;
use crate::backup::{export_workspace_bundle, import_workspace_bundle};
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::require_str;
use crate::ipc::types::{AppState, Request};
use crate::store::DurableGrades;
use serde_json::json;
use std::path::PathBuf;

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = match require_str(&req.params, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match export_workspace_bundle(&workspace, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "outPath": out_path.to_string_lossy(),
                "bundleFormat": summary.bundle_format,
                "dbSha256": summary.db_sha256,
            }),
        ),
        Err(e) => err(&req.id, "export_failed", e.to_string(), None),
    }
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match require_str(&req.params, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    // Release the live connection so the database file can be swapped.
    state.store = None;

    let summary = match import_workspace_bundle(&in_path, &workspace) {
        Ok(s) => s,
        Err(e) => {
            // Reopen over whatever state the workspace is in.
            match DurableGrades::open(&workspace, AggrFns::builtin()) {
                Ok(store) => state.store = Some(store),
                Err(_) => state.workspace = None,
            }
            return err(&req.id, "import_failed", e.to_string(), None);
        }
    };

    match DurableGrades::open(&workspace, AggrFns::builtin()) {
        Ok(store) => {
            state.store = Some(store);
            ok(
                &req.id,
                json!({ "bundleFormatDetected": summary.bundle_format_detected }),
            )
        }
        Err(e) => {
            state.workspace = None;
            engine_err(&req.id, &e)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_export(state, req)),
        "backup.import" => Some(handle_import(state, req)),
        _ => None,
    }
}
