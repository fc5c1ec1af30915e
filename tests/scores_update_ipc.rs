use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_aresd");
    let mut child = Command::new(exe)
        .env_remove("ARESD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn aresd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
    session: Option<&str>,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
        "session": session,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
    session: Option<&str>,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params, session);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok response for {}: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

struct Fixture {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    workspace: PathBuf,
    admin: String,
    student: String,
    student_id: i64,
}

fn setup(prefix: &str) -> Fixture {
    let workspace = temp_dir(prefix);
    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
        None,
    );
    let login = request_ok(
        &mut stdin,
        &mut reader,
        "s2",
        "auth.login",
        json!({ "email": "admin@ares.com", "password": "Mestre123" }),
        None,
    );
    let admin = login["sessionToken"].as_str().expect("admin token").to_string();
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "s3",
        "students.create",
        json!({
            "fullName": "Ana Souza",
            "motherName": "Maria Souza",
            "age": 15,
            "grade": "1",
            "className": "B"
        }),
        Some(admin.as_str()),
    );
    let student_id = created["studentId"].as_i64().expect("studentId");
    let student_login = request_ok(
        &mut stdin,
        &mut reader,
        "s4",
        "auth.studentLogin",
        json!({
            "enrollment": created["enrollment"],
            "code": created["accessCode"]
        }),
        None,
    );
    let student = student_login["sessionToken"]
        .as_str()
        .expect("student token")
        .to_string();
    Fixture {
        child,
        stdin,
        reader,
        workspace,
        admin,
        student,
        student_id,
    }
}

fn teardown(mut f: Fixture) {
    drop(f.stdin);
    let _ = f.child.wait();
    let _ = std::fs::remove_dir_all(f.workspace);
}

fn stored_rank(f: &mut Fixture, id: &str) -> String {
    let panel = request_ok(
        &mut f.stdin,
        &mut f.reader,
        id,
        "student.panel",
        json!({ "studentId": f.student_id }),
        Some(f.admin.as_str()),
    );
    panel["student"]["rank"].as_str().expect("rank").to_string()
}

#[test]
fn full_marks_promote_and_low_marks_never_demote() {
    let mut f = setup("ares-scores-promote");
    let admin = f.admin.clone();

    let low = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "1",
        "scores.update",
        json!({
            "studentId": f.student_id,
            "exam1": 5, "exam2": 5, "exam3": 5, "examFinal": 5,
            "missions": 10, "discipline": 5, "attendance": 2
        }),
        Some(admin.as_str()),
    );
    assert_eq!(low["total"].as_f64(), Some(37.0));
    assert_eq!(low["promoted"].as_bool(), Some(false));
    assert!(low["newRank"].is_null());
    assert_eq!(stored_rank(&mut f, "2"), "Recruit");

    let full = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "3",
        "scores.update",
        json!({
            "studentId": f.student_id,
            "exam1": 10, "exam2": 10, "exam3": 10, "examFinal": 10,
            "missions": 30, "discipline": 20, "attendance": 10
        }),
        Some(admin.as_str()),
    );
    assert_eq!(full["total"].as_f64(), Some(100.0));
    assert_eq!(full["promoted"].as_bool(), Some(true));
    // floor(100 / 28) = 3
    assert_eq!(full["newRank"].as_str(), Some("Sergeant"));
    assert_eq!(stored_rank(&mut f, "4"), "Sergeant");

    let again_low = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "5",
        "scores.update",
        json!({
            "studentId": f.student_id,
            "exam1": 5, "exam2": 5, "exam3": 5, "examFinal": 5,
            "missions": 10, "discipline": 5, "attendance": 2
        }),
        Some(admin.as_str()),
    );
    assert_eq!(again_low["promoted"].as_bool(), Some(false));
    assert_eq!(stored_rank(&mut f, "6"), "Sergeant");

    let panel = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "7",
        "student.panel",
        json!({ "studentId": f.student_id }),
        Some(admin.as_str()),
    );
    assert_eq!(panel["student"]["totalPoints"].as_f64(), Some(37.0));
    assert_eq!(panel["evaluation"]["examFinal"].as_f64(), Some(5.0));
    assert_eq!(panel["evaluation"]["evaluationTotal"].as_f64(), Some(20.0));

    teardown(f);
}

#[test]
fn components_over_ceiling_are_clamped_before_summing() {
    let mut f = setup("ares-scores-clamp");
    let admin = f.admin.clone();

    let over = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "1",
        "scores.update",
        json!({
            "studentId": f.student_id,
            "exam1": 15, "exam2": 15, "exam3": 15, "examFinal": 15,
            "missions": 45, "discipline": 20, "attendance": 10
        }),
        Some(admin.as_str()),
    );
    assert_eq!(over["total"].as_f64(), Some(100.0));

    let panel = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "2",
        "student.panel",
        json!({ "studentId": f.student_id }),
        Some(admin.as_str()),
    );
    assert_eq!(panel["student"]["evaluationPoints"].as_f64(), Some(40.0));
    assert_eq!(panel["student"]["missionPoints"].as_f64(), Some(30.0));
    // Raw exam marks are kept as submitted.
    assert_eq!(panel["evaluation"]["exam1"].as_f64(), Some(15.0));

    teardown(f);
}

#[test]
fn missing_fields_default_to_zero_and_bad_types_are_rejected() {
    let mut f = setup("ares-scores-params");
    let admin = f.admin.clone();

    let partial = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "1",
        "scores.update",
        json!({ "studentId": f.student_id, "missions": 12.5 }),
        Some(admin.as_str()),
    );
    assert_eq!(partial["total"].as_f64(), Some(12.5));

    let bad = request(
        &mut f.stdin,
        &mut f.reader,
        "2",
        "scores.update",
        json!({ "studentId": f.student_id, "missions": "lots" }),
        Some(admin.as_str()),
    );
    assert_eq!(bad["error"]["code"].as_str(), Some("bad_params"));

    let missing = request(
        &mut f.stdin,
        &mut f.reader,
        "3",
        "scores.update",
        json!({ "studentId": 9999, "missions": 1 }),
        Some(admin.as_str()),
    );
    assert_eq!(missing["error"]["code"].as_str(), Some("not_found"));

    teardown(f);
}

#[test]
fn update_notifies_student_in_caller_language() {
    let mut f = setup("ares-scores-notify");
    let admin = f.admin.clone();
    let student = f.student.clone();

    request_ok(
        &mut f.stdin,
        &mut f.reader,
        "1",
        "tokens.register",
        json!({ "token": "device-abc", "device": "android" }),
        Some(student.as_str()),
    );
    request_ok(
        &mut f.stdin,
        &mut f.reader,
        "2",
        "prefs.setLang",
        json!({ "lang": "en" }),
        Some(admin.as_str()),
    );

    let updated = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "3",
        "scores.update",
        json!({
            "studentId": f.student_id,
            "exam1": 10, "exam2": 10, "exam3": 10, "examFinal": 10,
            "missions": 30, "discipline": 20, "attendance": 10
        }),
        Some(admin.as_str()),
    );
    assert_eq!(updated["tokensFound"].as_u64(), Some(1));

    let listed = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "4",
        "notifications.list",
        json!({}),
        Some(student.as_str()),
    );
    let notes = listed["notifications"].as_array().expect("notifications");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["title"].as_str(), Some("Score Update"));
    assert_eq!(notes[0]["userId"].as_i64(), Some(f.student_id));
    let message = notes[0]["message"].as_str().unwrap_or("");
    assert!(message.contains("Sergeant"), "message: {}", message);

    teardown(f);
}

#[test]
fn students_cannot_update_scores() {
    let mut f = setup("ares-scores-forbidden");
    let student = f.student.clone();

    let denied = request(
        &mut f.stdin,
        &mut f.reader,
        "1",
        "scores.update",
        json!({ "studentId": f.student_id, "missions": 30 }),
        Some(student.as_str()),
    );
    assert_eq!(denied["error"]["code"].as_str(), Some("forbidden"));

    let anonymous = request(
        &mut f.stdin,
        &mut f.reader,
        "2",
        "scores.update",
        json!({ "studentId": f.student_id, "missions": 30 }),
        None,
    );
    assert_eq!(anonymous["error"]["code"].as_str(), Some("unauthenticated"));

    teardown(f);
}

#[test]
fn overflowing_exam_sum_is_rejected_and_record_unchanged() {
    let mut f = setup("ares-scores-overflow");
    let admin = f.admin.clone();

    let overflow = request(
        &mut f.stdin,
        &mut f.reader,
        "1",
        "scores.update",
        json!({ "studentId": f.student_id, "exam1": -1e308, "exam2": -1e308 }),
        Some(admin.as_str()),
    );
    assert_eq!(overflow["error"]["code"].as_str(), Some("bad_params"));

    // Finite negatives still pass through unclamped.
    let negative = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "2",
        "scores.update",
        json!({ "studentId": f.student_id, "exam1": -5, "missions": 10 }),
        Some(admin.as_str()),
    );
    assert_eq!(negative["total"].as_f64(), Some(5.0));

    let panel = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "3",
        "student.panel",
        json!({ "studentId": f.student_id }),
        Some(admin.as_str()),
    );
    assert_eq!(panel["student"]["totalPoints"].as_f64(), Some(5.0));
    let notes = request_ok(
        &mut f.stdin,
        &mut f.reader,
        "4",
        "notifications.list",
        json!({ "userId": f.student_id }),
        Some(admin.as_str()),
    );
    assert_eq!(notes["notifications"].as_array().map(|n| n.len()), Some(1));

    teardown(f);
}
