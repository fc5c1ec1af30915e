use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{query_rows, require_caller, require_db};
use crate::ipc::types::{AppState, Caller, Request};
use serde_json::json;

fn overview(state: &AppState, caller: Option<&Caller>) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let conn = require_db(state)?;

    let admin = conn
        .query_row(
            "SELECT id, email, is_master, photo FROM admins WHERE id = ?",
            [caller.session.user_id],
            |r| {
                Ok(json!({
                    "id": r.get::<_, i64>(0)?,
                    "email": r.get::<_, String>(1)?,
                    "isMaster": r.get::<_, i64>(2)? != 0,
                    "photo": r.get::<_, Option<String>>(3)?,
                }))
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => HandlerErr::not_found("admin not found"),
            e => HandlerErr::query(e),
        })?;

    let teachers = query_rows(
        conn,
        "SELECT id, full_name, subject, email, password_hash IS NOT NULL, photo
         FROM teachers
         ORDER BY full_name",
        [],
        |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "fullName": r.get::<_, String>(1)?,
                "subject": r.get::<_, String>(2)?,
                "email": r.get::<_, String>(3)?,
                "hasPassword": r.get::<_, i64>(4)? != 0,
                "photo": r.get::<_, Option<String>>(5)?,
            }))
        },
    )?;

    let students = query_rows(
        conn,
        "SELECT id, full_name, grade, class_name, enrollment, total_points, rank, photo
         FROM students
         ORDER BY full_name",
        [],
        |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "fullName": r.get::<_, String>(1)?,
                "grade": r.get::<_, String>(2)?,
                "className": r.get::<_, Option<String>>(3)?,
                "enrollment": r.get::<_, Option<String>>(4)?,
                "totalPoints": r.get::<_, f64>(5)?,
                "rank": r.get::<_, String>(6)?,
                "photo": r.get::<_, Option<String>>(7)?,
            }))
        },
    )?;

    let ranking = query_rows(
        conn,
        "SELECT id, full_name, total_points FROM students ORDER BY total_points DESC, id",
        [],
        |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "fullName": r.get::<_, String>(1)?,
                "totalPoints": r.get::<_, f64>(2)?,
            }))
        },
    )?;

    Ok(json!({
        "admin": admin,
        "teachers": teachers,
        "students": students,
        "ranking": ranking,
    }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.overview" => Some(respond(&req.id, overview(state, caller))),
        _ => None,
    }
}
