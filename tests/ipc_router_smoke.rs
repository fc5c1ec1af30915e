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
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("ares-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}), None);
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
        None,
    );
    let _ = request(&mut stdin, &mut reader, "3", "ranks.list", json!({}), None);
    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "i18n.labels",
        json!({ "lang": "en" }),
        None,
    );
    let login = request(
        &mut stdin,
        &mut reader,
        "5",
        "auth.login",
        json!({ "email": "admin@ares.com", "password": "Mestre123" }),
        None,
    );
    let token = login
        .get("result")
        .and_then(|v| v.get("sessionToken"))
        .and_then(|v| v.as_str())
        .expect("sessionToken")
        .to_string();
    let s = Some(token.as_str());

    let _ = request(&mut stdin, &mut reader, "6", "auth.whoami", json!({}), s);
    let _ = request(&mut stdin, &mut reader, "7", "prefs.setLang", json!({ "lang": "en" }), s);
    let _ = request(&mut stdin, &mut reader, "8", "prefs.toggleTheme", json!({}), s);
    let _ = request(&mut stdin, &mut reader, "9", "admin.overview", json!({}), s);
    let teacher = request(
        &mut stdin,
        &mut reader,
        "10",
        "teachers.create",
        json!({ "fullName": "Smoke Teacher", "subject": "Math", "email": "smoke@ares.com" }),
        s,
    );
    let teacher_id = teacher["result"]["teacherId"].as_i64().unwrap_or(0);
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "teacherClasses.add",
        json!({ "teacherId": teacher_id, "grade": "9", "className": "A" }),
        s,
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "teacher.panel",
        json!({ "teacherId": teacher_id }),
        s,
    );
    let student = request(
        &mut stdin,
        &mut reader,
        "13",
        "students.create",
        json!({
            "fullName": "Smoke Student",
            "motherName": "Smoke Mother",
            "age": 14,
            "grade": "9",
            "className": "A"
        }),
        s,
    );
    let student_id = student["result"]["studentId"].as_i64().unwrap_or(0);
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "scores.update",
        json!({ "studentId": student_id, "exam1": 5, "missions": 10 }),
        s,
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "15",
        "student.panel",
        json!({ "studentId": student_id }),
        s,
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "16",
        "notifications.send",
        json!({ "title": "Smoke", "message": "hello", "grade": "9" }),
        s,
    );
    let _ = request(&mut stdin, &mut reader, "17", "notifications.list", json!({}), s);
    let _ = request(
        &mut stdin,
        &mut reader,
        "18",
        "tokens.register",
        json!({ "token": "smoke-device" }),
        s,
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "19",
        "photos.upload",
        json!({ "kind": "student", "userId": student_id, "sourcePath": "" }),
        s,
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "20",
        "photos.get",
        json!({ "name": "missing.jpg" }),
        s,
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "21",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle_out.to_string_lossy() }),
        s,
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "22",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle_out.to_string_lossy() }),
        s,
    );
    // The import reopened the workspace, which dropped every session.
    let after = request(&mut stdin, &mut reader, "23", "auth.logout", json!({}), s);
    assert_eq!(error_code(&after), Some("unauthenticated"));
    let _ = request(
        &mut stdin,
        &mut reader,
        "24",
        "auth.studentLogin",
        json!({ "enrollment": "ARES-0000-00000", "code": "000000" }),
        None,
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "25",
        "teachers.setPassword",
        json!({ "password": "secret1" }),
        None,
    );

    let unknown = {
        writeln!(stdin, "{}", json!({ "id": "26", "method": "nope.nothing", "params": {} }))
            .expect("write request");
        stdin.flush().expect("flush request");
        let mut line = String::new();
        reader.read_line(&mut line).expect("read response line");
        serde_json::from_str::<serde_json::Value>(line.trim()).expect("parse response json")
    };
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
