use crate::auth::Role;
use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{parse_params, query_rows, require_caller, require_db, require_non_empty};
use crate::ipc::types::{AppState, Caller, Request};
use crate::scoring::LOWEST_RANK;
use rusqlite::OptionalExtension;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateStudentParams {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    mother_name: String,
    father_name: Option<String>,
    age: i64,
    #[serde(default)]
    grade: String,
    class_name: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Registers a student with a zeroed score record, an enrollment number and an access code.
fn create_student(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let p: CreateStudentParams = parse_params(&req.params)?;
    let full_name = require_non_empty(&p.full_name, "fullName")?;
    let mother_name = require_non_empty(&p.mother_name, "motherName")?;
    let grade = require_non_empty(&p.grade, "grade")?;
    if !(1..=120).contains(&p.age) {
        return Err(HandlerErr::bad_params("age must be between 1 and 120"));
    }
    let father_name = non_blank(p.father_name);
    let class_name = non_blank(p.class_name);

    let tx = conn.unchecked_transaction().map_err(|e| HandlerErr {
        code: "db_tx_failed",
        message: e.to_string(),
        details: None,
    })?;
    tx.execute(
        "INSERT INTO students(full_name, mother_name, father_name, age, grade, class_name, rank, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (
            &full_name,
            &mother_name,
            father_name.as_deref(),
            p.age,
            &grade,
            class_name.as_deref(),
            LOWEST_RANK,
        ),
    )
    .map_err(|e| HandlerErr::insert("students", e))?;
    let student_id = tx.last_insert_rowid();

    // Enrollment embeds the row id, so it is assigned after the insert.
    let enrollment = db::enrollment_for(student_id, db::current_year());
    let access_code = db::generate_access_code();
    tx.execute(
        "UPDATE students SET enrollment = ?, access_code = ? WHERE id = ?",
        (&enrollment, &access_code, student_id),
    )
    .map_err(|e| HandlerErr::update("students", e))?;
    tx.execute("INSERT INTO evaluations(student_id) VALUES(?)", [student_id])
        .map_err(|e| HandlerErr::insert("evaluations", e))?;
    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;
    tracing::info!(student_id, %enrollment, "student registered");

    Ok(json!({
        "studentId": student_id,
        "enrollment": enrollment,
        "accessCode": access_code,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PanelParams {
    student_id: i64,
}

fn panel(
    state: &AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Result<serde_json::Value, HandlerErr> {
    let caller = require_caller(caller)?;
    let conn = require_db(state)?;
    let p: PanelParams = parse_params(&req.params)?;
    if caller.session.role == Role::Student && !caller.session.is_self(Role::Student, p.student_id) {
        return Err(HandlerErr::forbidden());
    }

    let row = conn
        .query_row(
            "SELECT id, full_name, mother_name, father_name, age, grade, class_name, enrollment,
                    evaluation_points, mission_points, discipline_points, attendance_points,
                    total_points, rank, photo
             FROM students WHERE id = ?",
            [p.student_id],
            |r| {
                let grade: String = r.get(5)?;
                let class_name: Option<String> = r.get(6)?;
                let student = json!({
                    "id": r.get::<_, i64>(0)?,
                    "fullName": r.get::<_, String>(1)?,
                    "motherName": r.get::<_, String>(2)?,
                    "fatherName": r.get::<_, Option<String>>(3)?,
                    "age": r.get::<_, i64>(4)?,
                    "grade": grade,
                    "className": class_name,
                    "enrollment": r.get::<_, Option<String>>(7)?,
                    "evaluationPoints": r.get::<_, f64>(8)?,
                    "missionPoints": r.get::<_, f64>(9)?,
                    "disciplinePoints": r.get::<_, f64>(10)?,
                    "attendancePoints": r.get::<_, f64>(11)?,
                    "totalPoints": r.get::<_, f64>(12)?,
                    "rank": r.get::<_, String>(13)?,
                    "photo": r.get::<_, Option<String>>(14)?,
                });
                Ok((student, grade, class_name))
            },
        )
        .optional()
        .map_err(HandlerErr::query)?;
    let Some((student, grade, class_name)) = row else {
        return Err(HandlerErr::not_found("student not found"));
    };

    let evaluation = conn
        .query_row(
            "SELECT exam1, exam2, exam3, exam_final, evaluation_total FROM evaluations WHERE student_id = ?",
            [p.student_id],
            |r| {
                Ok(json!({
                    "exam1": r.get::<_, f64>(0)?,
                    "exam2": r.get::<_, f64>(1)?,
                    "exam3": r.get::<_, f64>(2)?,
                    "examFinal": r.get::<_, f64>(3)?,
                    "evaluationTotal": r.get::<_, f64>(4)?,
                }))
            },
        )
        .optional()
        .map_err(HandlerErr::query)?;

    // Students without a class have no class ranking.
    let ranking = match class_name.as_deref() {
        Some(class_name) => query_rows(
            conn,
            "SELECT id, full_name, total_points FROM students
             WHERE grade = ? AND class_name = ?
             ORDER BY total_points DESC, id",
            (&grade, class_name),
            |r| {
                Ok(json!({
                    "id": r.get::<_, i64>(0)?,
                    "fullName": r.get::<_, String>(1)?,
                    "totalPoints": r.get::<_, f64>(2)?,
                }))
            },
        )?,
        None => Vec::new(),
    };

    Ok(json!({
        "student": student,
        "evaluation": evaluation,
        "ranking": ranking,
    }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.create" => create_student(state, req),
        "student.panel" => panel(state, req, caller),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
