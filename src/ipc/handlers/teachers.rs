use crate::auth::{hash_password, Role};
use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    parse_params, query_rows, require_caller, require_db, require_non_empty, row_exists,
};
use crate::ipc::types::{AppState, Caller, Request};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

/// Classes one teacher may hold within a single grade.
pub const MAX_CLASSES_PER_GRADE: i64 = 2;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTeacherParams {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    email: String,
}

fn create_teacher(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let p: CreateTeacherParams = parse_params(&req.params)?;
    let full_name = require_non_empty(&p.full_name, "fullName")?;
    let subject = require_non_empty(&p.subject, "subject")?;
    let email = require_non_empty(&p.email, "email")?;

    let taken: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM teachers WHERE email = ?1)
                 OR EXISTS(SELECT 1 FROM admins WHERE email = ?1)",
            [&email],
            |r| r.get(0),
        )
        .map_err(HandlerErr::query)?;
    if taken {
        return Err(HandlerErr::new("conflict", "email already registered")
            .with_details(json!({ "email": email })));
    }

    let code = db::generate_access_code();
    conn.execute(
        "INSERT INTO teachers(full_name, subject, email, first_access_code) VALUES(?, ?, ?, ?)",
        (&full_name, &subject, &email, &code),
    )
    .map_err(|e| HandlerErr::insert("teachers", e))?;
    let teacher_id = conn.last_insert_rowid();
    tracing::info!(teacher_id, "teacher registered");

    Ok(json!({ "teacherId": teacher_id, "firstAccessCode": code }))
}

#[derive(Deserialize)]
struct SetPasswordParams {
    #[serde(default)]
    password: String,
}

fn set_password(
    state: &mut AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let p: SetPasswordParams = parse_params(&req.params)?;
    if p.password.chars().count() < 6 {
        return Err(HandlerErr::bad_params("password must have at least 6 characters"));
    }
    let teacher_id = caller.session.user_id;
    let conn = require_db(state)?;
    let changed = conn
        .execute(
            "UPDATE teachers SET password_hash = ?, first_access_code = NULL WHERE id = ?",
            (hash_password(&p.password), teacher_id),
        )
        .map_err(|e| HandlerErr::update("teachers", e))?;
    if changed == 0 {
        return Err(HandlerErr::not_found("teacher not found"));
    }
    // Other devices logged in with the old credentials must log in again.
    let dropped = state
        .sessions
        .revoke_user(Role::Teacher, teacher_id, Some(caller.token.as_str()));
    tracing::info!(teacher_id, dropped_sessions = dropped, "teacher password set");
    Ok(json!({ "ok": true }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddClassParams {
    teacher_id: i64,
    #[serde(default)]
    grade: String,
    #[serde(default)]
    class_name: String,
}

fn classes_in_grade(conn: &Connection, teacher_id: i64, grade: &str) -> Result<i64, HandlerErr> {
    conn.query_row(
        "SELECT COUNT(*) FROM teacher_classes WHERE teacher_id = ? AND grade = ?",
        (teacher_id, grade),
        |r| r.get(0),
    )
    .map_err(HandlerErr::query)
}

fn add_class(
    state: &AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let conn = require_db(state)?;
    let p: AddClassParams = parse_params(&req.params)?;
    if caller.session.role == Role::Teacher && caller.session.user_id != p.teacher_id {
        return Err(HandlerErr::forbidden());
    }
    let grade = require_non_empty(&p.grade, "grade")?;
    let class_name = require_non_empty(&p.class_name, "className")?;
    if !row_exists(conn, "teachers", p.teacher_id)? {
        return Err(HandlerErr::not_found("teacher not found"));
    }

    let held = classes_in_grade(conn, p.teacher_id, &grade)?;
    if held >= MAX_CLASSES_PER_GRADE {
        return Err(HandlerErr::new(
            "limit_reached",
            format!("teacher already has {} classes in this grade", MAX_CLASSES_PER_GRADE),
        )
        .with_details(json!({ "grade": grade, "count": held })));
    }

    conn.execute(
        "INSERT INTO teacher_classes(teacher_id, grade, class_name) VALUES(?, ?, ?)",
        (p.teacher_id, &grade, &class_name),
    )
    .map_err(|e| HandlerErr::insert("teacher_classes", e))?;
    Ok(json!({ "classId": conn.last_insert_rowid() }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PanelParams {
    teacher_id: i64,
}

fn panel(
    state: &AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let conn = require_db(state)?;
    let p: PanelParams = parse_params(&req.params)?;
    if caller.session.role == Role::Teacher && !caller.session.is_self(Role::Teacher, p.teacher_id) {
        return Err(HandlerErr::forbidden());
    }

    let teacher = conn
        .query_row(
            "SELECT id, full_name, subject, email, photo FROM teachers WHERE id = ?",
            [p.teacher_id],
            |r| {
                Ok(json!({
                    "id": r.get::<_, i64>(0)?,
                    "fullName": r.get::<_, String>(1)?,
                    "subject": r.get::<_, String>(2)?,
                    "email": r.get::<_, String>(3)?,
                    "photo": r.get::<_, Option<String>>(4)?,
                }))
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => HandlerErr::not_found("teacher not found"),
            e => HandlerErr::query(e),
        })?;

    let classes = query_rows(
        conn,
        "SELECT id, grade, class_name FROM teacher_classes WHERE teacher_id = ? ORDER BY grade, class_name",
        [p.teacher_id],
        |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "grade": r.get::<_, String>(1)?,
                "className": r.get::<_, String>(2)?,
            }))
        },
    )?;

    let students = query_rows(
        conn,
        "SELECT s.id, s.full_name, s.grade, s.class_name, s.total_points, s.rank, s.photo
         FROM students s
         JOIN teacher_classes tc ON tc.grade = s.grade AND tc.class_name = s.class_name
         WHERE tc.teacher_id = ?
         ORDER BY s.grade, s.class_name, s.full_name",
        [p.teacher_id],
        |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "fullName": r.get::<_, String>(1)?,
                "grade": r.get::<_, String>(2)?,
                "className": r.get::<_, Option<String>>(3)?,
                "totalPoints": r.get::<_, f64>(4)?,
                "rank": r.get::<_, String>(5)?,
                "photo": r.get::<_, Option<String>>(6)?,
            }))
        },
    )?;

    Ok(json!({
        "teacher": teacher,
        "classes": classes,
        "students": students,
    }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "teachers.create" => create_teacher(state, req),
        "teachers.setPassword" => set_password(state, req, caller),
        "teacherClasses.add" => add_class(state, req, caller),
        "teacher.panel" => panel(state, req, caller),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
