use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::core::{open_workspace, reopen_database};
use crate::ipc::types::{AppState, Caller, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_backup_export_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match req.params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing outPath", None),
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let out = PathBuf::from(&out_path);
    let export = match backup::export_workspace_bundle(&workspace_path, &out) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": out_path })),
            )
        }
    };
    tracing::info!(path = %out_path, photos = export.photo_count, "workspace bundle exported");

    ok(
        &req.id,
        json!({
            "ok": true,
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "photoCount": export.photo_count
        }),
    )
}

fn handle_backup_import_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match req.params.get("inPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing inPath", None),
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    // Reject unusable input while the current database is still open.
    if let Err(e) = backup::inspect_bundle(&src) {
        return err(
            &req.id,
            "invalid_bundle",
            e.to_string(),
            Some(json!({ "path": in_path })),
        );
    }

    // Drop open handle before replacing file.
    state.db = None;

    let import = match backup::import_workspace_bundle(&src, &workspace_path) {
        Ok(v) => v,
        Err(e) => {
            // The database file was not replaced.
            if let Err(reopen) = reopen_database(state, &workspace_path) {
                tracing::error!(error = %reopen, "failed to reopen workspace after rejected import");
                return err(
                    &req.id,
                    "db_open_failed",
                    reopen.to_string(),
                    Some(json!({ "importError": e.to_string() })),
                );
            }
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": src.to_string_lossy() })),
            );
        }
    };

    // Reopening clears sessions, including the caller's: ids may differ in the restored data.
    match open_workspace(state, &workspace_path) {
        Ok(()) => {
            backup::discard_previous_database(&workspace_path);
            tracing::info!(path = %in_path, format = %import.bundle_format_detected, "workspace bundle imported");
            ok(
                &req.id,
                json!({
                    "ok": true,
                    "workspacePath": workspace_path.to_string_lossy(),
                    "bundleFormatDetected": import.bundle_format_detected,
                    "photosRestored": import.photos_restored
                }),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "imported database does not open, restoring previous");
            let restored = backup::restore_previous_database(&workspace_path)
                .and_then(|()| reopen_database(state, &workspace_path));
            if let Err(restore) = &restored {
                tracing::error!(error = %restore, "failed to restore previous database");
            }
            err(
                &req.id,
                "invalid_bundle",
                e.to_string(),
                Some(json!({ "path": in_path, "previousRestored": restored.is_ok() })),
            )
        }
    }
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    _caller: Option<&Caller>,
) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_backup_export_workspace_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_backup_import_workspace_bundle(state, req)),
        _ => None,
    }
}
