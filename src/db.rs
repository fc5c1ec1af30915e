use chrono::Datelike;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DB_FILE: &str = "ares.sqlite3";
pub const UPLOADS_DIR: &str = "uploads";

pub fn uploads_dir(workspace: &Path) -> PathBuf {
    workspace.join(UPLOADS_DIR)
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(uploads_dir(workspace))?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admins(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_master INTEGER NOT NULL DEFAULT 0,
            photo TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            first_access_code TEXT,
            password_hash TEXT,
            photo TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_classes(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            teacher_id INTEGER NOT NULL,
            grade TEXT NOT NULL,
            class_name TEXT NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teacher_classes_teacher ON teacher_classes(teacher_id, grade)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name TEXT NOT NULL,
            mother_name TEXT NOT NULL,
            father_name TEXT,
            age INTEGER NOT NULL,
            grade TEXT NOT NULL,
            class_name TEXT,
            enrollment TEXT UNIQUE,
            access_code TEXT,
            evaluation_points REAL NOT NULL DEFAULT 0,
            mission_points REAL NOT NULL DEFAULT 0,
            discipline_points REAL NOT NULL DEFAULT 0,
            attendance_points REAL NOT NULL DEFAULT 0,
            total_points REAL NOT NULL DEFAULT 0,
            rank TEXT NOT NULL DEFAULT 'Recruit',
            photo TEXT
        )",
        [],
    )?;
    ensure_students_updated_at(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(grade, class_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS evaluations(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL UNIQUE,
            exam1 REAL NOT NULL DEFAULT 0,
            exam2 REAL NOT NULL DEFAULT 0,
            exam3 REAL NOT NULL DEFAULT 0,
            exam_final REAL NOT NULL DEFAULT 0,
            evaluation_total REAL NOT NULL DEFAULT 0,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notifications(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            user_id INTEGER,
            grade TEXT,
            class_name TEXT,
            sent_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tokens(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_type TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            token TEXT NOT NULL,
            device TEXT NOT NULL DEFAULT 'web',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_type, user_id)",
        [],
    )?;

    Ok(conn)
}

/// Insert the master admin unless one already exists. Returns true when a row was created.
pub fn seed_master_admin(conn: &Connection, email: &str, password_hash: &str) -> anyhow::Result<bool> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM admins WHERE is_master = 1 LIMIT 1", [], |r| r.get(0))
        .optional()?;
    if existing.is_some() {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO admins(email, password_hash, is_master) VALUES(?, ?, 1)",
        (email, password_hash),
    )?;
    Ok(true)
}

/// `ARES-<year>-<id padded to 5>`
pub fn enrollment_for(student_id: i64, year: i32) -> String {
    format!("ARES-{}-{:05}", year, student_id)
}

pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}

/// Six decimal digits in 100000..=999999.
pub fn generate_access_code() -> String {
    let entropy = Uuid::new_v4().as_u128();
    (100_000 + (entropy % 900_000) as u64).to_string()
}

fn ensure_students_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
