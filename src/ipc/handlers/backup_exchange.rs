use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn workspace_param(state: &AppState, req: &Request) -> Result<PathBuf, serde_json::Value> {
    if let Some(path) = req.params.get("workspacePath").and_then(|v| v.as_str()) {
        return Ok(PathBuf::from(path));
    }
    state
        .workspace
        .clone()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn handle_export_data_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let workspace = match workspace_param(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let out_path = match req.params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) => PathBuf::from(v),
        None => return err(&req.id, "bad_params", "missing outPath", None),
    };

    match backup::export_data_bundle(&workspace, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "fileCount": summary.file_count,
                "outPath": out_path.to_string_lossy()
            }),
        ),
        Err(e) => err(&req.id, "bundle_export_failed", format!("{e:#}"), None),
    }
}

fn handle_import_data_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let workspace = match workspace_param(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let in_path = match req.params.get("inPath").and_then(|v| v.as_str()) {
        Some(v) => PathBuf::from(v),
        None => return err(&req.id, "bad_params", "missing inPath", None),
    };

    match backup::import_data_bundle(&in_path, &workspace) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormatDetected": summary.bundle_format_detected,
                "fileCount": summary.file_count
            }),
        ),
        Err(e) => err(&req.id, "bundle_import_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportDataBundle" => Some(handle_export_data_bundle(state, req)),
        "backup.importDataBundle" => Some(handle_import_data_bundle(state, req)),
        _ => None,
    }
}
