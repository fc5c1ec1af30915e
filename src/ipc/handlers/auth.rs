use crate::auth::{hash_password, teacher_credentials_match, Lang, Role};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{parse_params, require_caller, require_db};
use crate::ipc::types::{AppState, Caller, Request};
use rusqlite::OptionalExtension;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct LoginParams {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct StudentLoginParams {
    #[serde(default)]
    enrollment: String,
    #[serde(default)]
    code: String,
}

fn invalid_credentials() -> HandlerErr {
    HandlerErr::new("invalid_credentials", "invalid credentials")
}

fn session_result(state: &mut AppState, role: Role, user_id: i64) -> serde_json::Value {
    let token = state.sessions.issue(role, user_id, chrono::Utc::now());
    tracing::info!(role = role.as_str(), user_id, "login");
    json!({
        "sessionToken": token,
        "userType": role,
        "userId": user_id,
    })
}

/// Admins are checked first, then teachers (password or first-access code).
fn login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let p: LoginParams = parse_params(&req.params)?;
    let email = p.email.trim();
    if email.is_empty() || p.password.is_empty() {
        return Err(invalid_credentials());
    }
    let conn = require_db(state)?;
    let hash = hash_password(&p.password);

    let admin_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM admins WHERE email = ? AND password_hash = ?",
            (email, &hash),
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::query)?;
    if let Some(id) = admin_id {
        return Ok(session_result(state, Role::Admin, id));
    }

    let teacher: Option<(i64, Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT id, password_hash, first_access_code FROM teachers WHERE email = ?",
            [email],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
        .map_err(HandlerErr::query)?;
    if let Some((id, stored_hash, code)) = teacher {
        if teacher_credentials_match(stored_hash.as_deref(), code.as_deref(), &p.password) {
            return Ok(session_result(state, Role::Teacher, id));
        }
    }

    tracing::debug!(email, "login rejected");
    Err(invalid_credentials())
}

fn student_login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let p: StudentLoginParams = parse_params(&req.params)?;
    let enrollment = p.enrollment.trim();
    let code = p.code.trim();
    if enrollment.is_empty() || code.is_empty() {
        return Err(invalid_credentials());
    }
    let conn = require_db(state)?;
    let student_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM students WHERE enrollment = ? AND access_code = ?",
            (enrollment, code),
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::query)?;
    match student_id {
        Some(id) => Ok(session_result(state, Role::Student, id)),
        None => {
            tracing::debug!(enrollment, "student login rejected");
            Err(invalid_credentials())
        }
    }
}

fn logout(state: &mut AppState, caller: Option<&Caller>) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let revoked = state.sessions.revoke(&caller.token);
    Ok(json!({ "ok": revoked }))
}

fn whoami(caller: Option<&Caller>) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let s = &caller.session;
    Ok(json!({
        "userType": s.role,
        "userId": s.user_id,
        "lang": s.lang,
        "theme": s.theme,
    }))
}

#[derive(Deserialize)]
struct SetLangParams {
    #[serde(default)]
    lang: String,
}

fn set_lang(
    state: &mut AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let p: SetLangParams = parse_params(&req.params)?;
    let lang = Lang::parse(&p.lang).ok_or_else(|| HandlerErr::bad_params("lang must be pt or en"))?;
    let session = state
        .sessions
        .get_mut(&caller.token)
        .ok_or_else(|| HandlerErr::new("unauthenticated", "unknown session"))?;
    session.lang = lang;
    Ok(json!({ "lang": lang }))
}

fn toggle_theme(state: &mut AppState, caller: Option<&Caller>) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let session = state
        .sessions
        .get_mut(&caller.token)
        .ok_or_else(|| HandlerErr::new("unauthenticated", "unknown session"))?;
    session.theme = session.theme.toggled();
    Ok(json!({ "theme": session.theme }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.login" => login(state, req),
        "auth.studentLogin" => student_login(state, req),
        "auth.logout" => logout(state, caller),
        "auth.whoami" => whoami(caller),
        "prefs.setLang" => set_lang(state, req, caller),
        "prefs.toggleTheme" => toggle_theme(state, caller),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
