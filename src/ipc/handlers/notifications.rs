use crate::auth::Role;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{parse_params, query_rows, require_caller, require_db, require_non_empty};
use crate::ipc::types::{AppState, Caller, Request};
use crate::notify::{self, Audience};
use serde::Deserialize;
use serde_json::json;

const LIST_LIMIT: i64 = 100;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendParams {
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
    user_id: Option<i64>,
    grade: Option<String>,
    class_name: Option<String>,
}

fn send(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let p: SendParams = parse_params(&req.params)?;
    let title = require_non_empty(&p.title, "title")?;
    let message = require_non_empty(&p.message, "message")?;
    let audience = Audience::from_parts(p.user_id, p.grade, p.class_name);

    let notification_id = notify::append_notification(conn, &title, &message, &audience)
        .map_err(|e| HandlerErr::insert("notifications", e))?;
    let tokens = notify::resolve_tokens(conn, &audience).map_err(HandlerErr::query)?;
    notify::dispatch_push(&tokens, &title);
    tracing::info!(notification_id, ?audience, tokens = tokens.len(), "notification stored");

    Ok(json!({
        "ok": true,
        "notificationId": notification_id,
        "tokensFound": tokens.len(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    user_id: Option<i64>,
}

/// Students only ever see their own notifications; staff may filter by user or see everything.
fn list(state: &AppState, req: &Request, caller: Option<&Caller>) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let conn = require_db(state)?;
    let p: ListParams = parse_params(&req.params)?;
    let user_id = match caller.session.role {
        Role::Student => {
            if p.user_id.is_some_and(|id| id != caller.session.user_id) {
                return Err(HandlerErr::forbidden());
            }
            Some(caller.session.user_id)
        }
        Role::Admin | Role::Teacher => p.user_id,
    };

    let map_row = |r: &rusqlite::Row<'_>| -> rusqlite::Result<serde_json::Value> {
        Ok(json!({
            "id": r.get::<_, i64>(0)?,
            "title": r.get::<_, String>(1)?,
            "message": r.get::<_, String>(2)?,
            "userId": r.get::<_, Option<i64>>(3)?,
            "grade": r.get::<_, Option<String>>(4)?,
            "className": r.get::<_, Option<String>>(5)?,
            "sentAt": r.get::<_, String>(6)?,
        }))
    };
    let notifications = match user_id {
        Some(id) => query_rows(
            conn,
            "SELECT id, title, message, user_id, grade, class_name, sent_at
             FROM notifications WHERE user_id = ?
             ORDER BY id DESC LIMIT ?",
            (id, LIST_LIMIT),
            map_row,
        )?,
        None => query_rows(
            conn,
            "SELECT id, title, message, user_id, grade, class_name, sent_at
             FROM notifications
             ORDER BY id DESC LIMIT ?",
            [LIST_LIMIT],
            map_row,
        )?,
    };
    Ok(json!({ "notifications": notifications }))
}

#[derive(Deserialize)]
struct RegisterTokenParams {
    #[serde(default)]
    token: String,
    device: Option<String>,
}

fn register_token(state: &AppState, req: &Request, caller: Option<&Caller>) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let conn = require_db(state)?;
    let p: RegisterTokenParams = parse_params(&req.params)?;
    let token = require_non_empty(&p.token, "token")?;
    let device = p
        .device
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "web".to_string());

    conn.execute(
        "INSERT INTO tokens(user_type, user_id, token, device) VALUES(?, ?, ?, ?)",
        (caller.session.role.as_str(), caller.session.user_id, &token, &device),
    )
    .map_err(|e| HandlerErr::insert("tokens", e))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "notifications.send" => send(state, req),
        "notifications.list" => list(state, req, caller),
        "tokens.register" => register_token(state, req, caller),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
