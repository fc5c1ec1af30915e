use crate::auth::Role;
use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{parse_params, require_caller, require_db, row_exists, unix_now};
use crate::ipc::types::{AppState, Caller, Request};
use crate::photos::{self, PhotoKind};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadParams {
    #[serde(default)]
    kind: String,
    user_id: i64,
    #[serde(default)]
    source_path: String,
}

fn kind_role(kind: PhotoKind) -> Role {
    match kind {
        PhotoKind::Student => Role::Student,
        PhotoKind::Teacher => Role::Teacher,
        PhotoKind::Admin => Role::Admin,
    }
}

fn upload(state: &AppState, req: &Request, caller: Option<&Caller>) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let conn = require_db(state)?;
    let workspace = state
        .workspace
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let p: UploadParams = parse_params(&req.params)?;

    let source = p.source_path.trim();
    if source.is_empty() {
        return Err(HandlerErr::bad_params("no photo provided"));
    }
    let source = PathBuf::from(source);
    let file_name = source
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    if file_name.is_empty() {
        return Err(HandlerErr::bad_params("invalid file"));
    }
    if !photos::allowed_file(file_name) {
        return Err(HandlerErr::new("unsupported_format", "format not allowed")
            .with_details(json!({ "allowed": photos::ALLOWED_EXTENSIONS })));
    }
    let kind = PhotoKind::parse(&p.kind)
        .ok_or_else(|| HandlerErr::bad_params("kind must be student, teacher or admin"))?;

    // Admins may set anyone's photo; everyone else only their own.
    if caller.session.role != Role::Admin && !caller.session.is_self(kind_role(kind), p.user_id) {
        return Err(HandlerErr::forbidden());
    }
    if !row_exists(conn, kind.table(), p.user_id)? {
        return Err(HandlerErr::not_found(format!("{} not found", kind.as_str())));
    }
    if !source.is_file() {
        return Err(HandlerErr::bad_params("photo file not found")
            .with_details(json!({ "path": source.to_string_lossy() })));
    }

    let name = photos::store_photo(
        &db::uploads_dir(workspace),
        &source,
        kind,
        p.user_id,
        unix_now(),
    )
    .map_err(|e| {
        HandlerErr::new("io_failed", e.to_string())
            .with_details(json!({ "path": source.to_string_lossy() }))
    })?;

    let sql = format!("UPDATE {} SET photo = ? WHERE id = ?", kind.table());
    conn.execute(&sql, (&name, p.user_id))
        .map_err(|e| HandlerErr::update(kind.table(), e))?;
    tracing::info!(kind = kind.as_str(), user_id = p.user_id, file = %name, "photo stored");

    Ok(json!({ "status": "photo updated", "file": name }))
}

#[derive(Deserialize)]
struct GetParams {
    #[serde(default)]
    name: String,
}

fn get(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let workspace = state
        .workspace
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let p: GetParams = parse_params(&req.params)?;
    if !photos::is_safe_name(&p.name) {
        return Err(HandlerErr::bad_params("invalid photo name"));
    }
    let Some(path) = photos::resolve_photo(&db::uploads_dir(workspace), &p.name) else {
        return Err(HandlerErr::not_found("photo not found"));
    };
    let size = std::fs::metadata(&path)
        .map(|m| m.len())
        .map_err(|e| HandlerErr::new("io_failed", e.to_string()))?;
    Ok(json!({
        "name": p.name,
        "path": path.to_string_lossy(),
        "size": size,
    }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "photos.upload" => upload(state, req, caller),
        "photos.get" => get(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
