use super::handlers;
use super::types::{AppState, Caller, Request};
use crate::auth::{Role, SessionError};
use crate::ipc::error::{err, HandlerErr};

const ANY_ROLE: &[Role] = &[Role::Admin, Role::Teacher, Role::Student];
const ADMIN: &[Role] = &[Role::Admin];
const STAFF: &[Role] = &[Role::Admin, Role::Teacher];
const TEACHER: &[Role] = &[Role::Teacher];

#[derive(Debug, Clone, Copy)]
enum Access {
    Public,
    Roles(&'static [Role]),
    /// Public until a workspace is open, then admin only.
    Bootstrap,
}

fn access_for(method: &str) -> Option<Access> {
    let access = match method {
        "workspace.select" => Access::Bootstrap,
        "health"
        | "auth.login"
        | "auth.studentLogin"
        | "ranks.list"
        | "i18n.labels" => Access::Public,
        "auth.logout"
        | "auth.whoami"
        | "prefs.setLang"
        | "prefs.toggleTheme"
        | "tokens.register"
        | "notifications.list"
        | "photos.upload"
        | "photos.get"
        | "student.panel" => Access::Roles(ANY_ROLE),
        "admin.overview"
        | "teachers.create"
        | "students.create"
        | "backup.exportWorkspaceBundle"
        | "backup.importWorkspaceBundle" => Access::Roles(ADMIN),
        "teacher.panel" | "teacherClasses.add" | "scores.update" | "notifications.send" => {
            Access::Roles(STAFF)
        }
        "teachers.setPassword" => Access::Roles(TEACHER),
        _ => return None,
    };
    Some(access)
}

/// Session interceptor: resolves the request's token and enforces the method's roles.
fn authorize(state: &mut AppState, req: &Request, access: Access) -> Result<Option<Caller>, HandlerErr> {
    let now = chrono::Utc::now();
    let token = req
        .session
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let access = match access {
        Access::Bootstrap if state.db.is_some() => Access::Roles(ADMIN),
        Access::Bootstrap => Access::Public,
        other => other,
    };
    let roles = match access {
        Access::Public | Access::Bootstrap => {
            // Public methods still see a valid session (e.g. for language), but never fail on one.
            let caller = token.and_then(|t| {
                state.sessions.touch(t, now).ok().map(|session| Caller {
                    token: t.to_string(),
                    session,
                })
            });
            return Ok(caller);
        }
        Access::Roles(roles) => roles,
    };

    let Some(token) = token else {
        return Err(HandlerErr::new("unauthenticated", "missing session"));
    };
    let session = state.sessions.touch(token, now).map_err(|e| match e {
        SessionError::Unknown => HandlerErr::new("unauthenticated", "unknown session"),
        SessionError::Expired => HandlerErr::new("session_expired", "session expired, log in again"),
    })?;
    if !roles.contains(&session.role) {
        tracing::debug!(method = %req.method, role = session.role.as_str(), "role not allowed");
        return Err(HandlerErr::forbidden());
    }
    Ok(Some(Caller {
        token: token.to_string(),
        session,
    }))
}

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let Some(access) = access_for(&req.method) else {
        return err(
            &req.id,
            "not_implemented",
            format!("unknown method: {}", req.method),
            None,
        );
    };
    let caller = match authorize(state, &req, access) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    let caller = caller.as_ref();

    if let Some(resp) = handlers::core::try_handle(state, &req, caller) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, &req, caller) {
        return resp;
    }
    if let Some(resp) = handlers::admin::try_handle(state, &req, caller) {
        return resp;
    }
    if let Some(resp) = handlers::teachers::try_handle(state, &req, caller) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, &req, caller) {
        return resp;
    }
    if let Some(resp) = handlers::scores::try_handle(state, &req, caller) {
        return resp;
    }
    if let Some(resp) = handlers::notifications::try_handle(state, &req, caller) {
        return resp;
    }
    if let Some(resp) = handlers::photos::try_handle(state, &req, caller) {
        return resp;
    }
    if let Some(resp) = handlers::backup::try_handle(state, &req, caller) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
