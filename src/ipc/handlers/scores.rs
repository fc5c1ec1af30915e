use crate::i18n;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{parse_params, require_caller, require_db};
use crate::ipc::types::{AppState, Caller, Request};
use crate::notify::{self, Audience};
use crate::scoring::{self, ScoreSubmission};
use rusqlite::OptionalExtension;
use serde::Deserialize;
use serde_json::json;

/// Missing component fields default to zero; present fields must be numbers.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateScoresParams {
    student_id: i64,
    #[serde(flatten)]
    submission: ScoreSubmission,
}

fn update_scores(
    state: &AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Result<serde_json::Value, HandlerErr> {
    let lang = require_caller(caller)?.session.lang;
    let conn = require_db(state)?;
    let p: UpdateScoresParams = parse_params(&req.params)?;
    let sub = p.submission;

    let previous_rank: Option<String> = conn
        .query_row(
            "SELECT rank FROM students WHERE id = ?",
            [p.student_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::query)?;
    let Some(previous_rank) = previous_rank else {
        return Err(HandlerErr::not_found("student not found")
            .with_details(json!({ "studentId": p.student_id })));
    };

    let update = scoring::evaluate_submission(&sub);
    // Huge negative inputs can overflow the exam sum; there is no floor to absorb them.
    if !update.outcome.total.is_finite() {
        return Err(HandlerErr::bad_params("scores must add up to a finite total")
            .with_details(json!({ "studentId": p.student_id })));
    }
    let c = update.components;
    let outcome = update.outcome;
    let stored_rank = scoring::resolve_stored_rank(&outcome, &previous_rank);

    let tx = conn.unchecked_transaction().map_err(|e| HandlerErr {
        code: "db_tx_failed",
        message: e.to_string(),
        details: None,
    })?;
    tx.execute(
        "INSERT INTO evaluations(student_id, exam1, exam2, exam3, exam_final, evaluation_total)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id) DO UPDATE SET
           exam1 = excluded.exam1,
           exam2 = excluded.exam2,
           exam3 = excluded.exam3,
           exam_final = excluded.exam_final,
           evaluation_total = excluded.evaluation_total",
        (
            p.student_id,
            sub.exam1,
            sub.exam2,
            sub.exam3,
            sub.exam_final,
            c.evaluation,
        ),
    )
    .map_err(|e| HandlerErr::update("evaluations", e))?;
    tx.execute(
        "UPDATE students SET
           evaluation_points = ?,
           mission_points = ?,
           discipline_points = ?,
           attendance_points = ?,
           total_points = ?,
           rank = ?,
           updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE id = ?",
        (
            c.evaluation,
            c.missions,
            c.discipline,
            c.attendance,
            outcome.total,
            stored_rank,
            p.student_id,
        ),
    )
    .map_err(|e| HandlerErr::update("students", e))?;
    notify::append_notification(
        &tx,
        i18n::score_update_title(lang),
        &i18n::score_update_message(lang, outcome.total, outcome.new_rank),
        &Audience::Student(p.student_id),
    )
    .map_err(|e| HandlerErr::insert("notifications", e))?;
    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;

    let tokens = notify::resolve_tokens(conn, &Audience::Student(p.student_id)).map_err(HandlerErr::query)?;
    notify::dispatch_push(&tokens, i18n::score_update_title(lang));

    tracing::info!(
        student_id = p.student_id,
        total = outcome.total,
        promoted = outcome.promoted,
        rank = stored_rank,
        "scores updated"
    );

    Ok(json!({
        "total": outcome.total,
        "promoted": outcome.promoted,
        "newRank": outcome.new_rank,
        "tokensFound": tokens.len(),
    }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    caller: Option<&Caller>,
) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.update" => Some(respond(&req.id, update_scores(state, req, caller))),
        _ => None,
    }
}
