use crate::auth::{self, Lang};
use crate::db;
use crate::i18n;
use crate::ipc::error::{err, ok, respond, HandlerErr};
use crate::ipc::helpers::parse_params;
use crate::ipc::types::{AppState, Caller, Request};
use crate::scoring::RANK_TABLE;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};

fn connect(state: &AppState, path: &Path) -> anyhow::Result<rusqlite::Connection> {
    let conn = db::open_db(path)?;
    let seeded = db::seed_master_admin(
        &conn,
        &state.config.admin_email,
        &auth::hash_password(&state.config.admin_password),
    )?;
    if seeded {
        tracing::info!(email = %state.config.admin_email, "master admin created");
    }
    Ok(conn)
}

/// Open (or create) the workspace database, seed the master admin, and make it current.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = connect(state, path)?;
    // Session ids refer to rows of the previous database.
    let dropped = state.sessions.len();
    state.sessions.clear();
    if dropped > 0 {
        tracing::info!(dropped, "sessions cleared");
    }
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    tracing::info!(workspace = %path.display(), "workspace opened");
    Ok(())
}

/// Reconnect to the current workspace's unchanged database; sessions stay valid.
pub fn reopen_database(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = connect(state, path)?;
    state.db = Some(conn);
    tracing::info!(workspace = %path.display(), "workspace database reopened");
    Ok(())
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            tracing::warn!(workspace = %path.display(), error = %e, "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

fn handle_ranks_list(req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "ranks": RANK_TABLE }))
}

#[derive(Deserialize)]
struct LabelsParams {
    lang: Option<String>,
}

fn i18n_labels(req: &Request, caller: Option<&Caller>) -> Result<serde_json::Value, HandlerErr> {
    let p: LabelsParams = parse_params(&req.params)?;
    let lang = match p.lang.as_deref() {
        Some(s) => Lang::parse(s).ok_or_else(|| HandlerErr::bad_params("lang must be pt or en"))?,
        None => caller.map(|c| c.session.lang).unwrap_or(Lang::Pt),
    };
    Ok(json!({ "lang": lang, "labels": i18n::labels(lang) }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "ranks.list" => Some(handle_ranks_list(req)),
        "i18n.labels" => Some(respond(&req.id, i18n_labels(req, caller))),
        _ => None,
    }
}
