use rusqlite::{params_from_iter, types::Value, Connection};

/// Who a notification is addressed to, most specific first.
#[derive(Debug, Clone, PartialEq)]
pub enum Audience {
    User(i64),
    Student(i64),
    Class { grade: String, class_name: String },
    Grade(String),
    Everyone,
}

impl Audience {
    pub fn from_parts(user_id: Option<i64>, grade: Option<String>, class_name: Option<String>) -> Audience {
        let grade = grade.filter(|g| !g.trim().is_empty());
        let class_name = class_name.filter(|c| !c.trim().is_empty());
        match (user_id, grade, class_name) {
            (Some(id), _, _) => Audience::User(id),
            (None, Some(grade), Some(class_name)) => Audience::Class { grade, class_name },
            (None, Some(grade), None) => Audience::Grade(grade),
            (None, None, _) => Audience::Everyone,
        }
    }
}

pub fn append_notification(
    conn: &Connection,
    title: &str,
    message: &str,
    audience: &Audience,
) -> rusqlite::Result<i64> {
    let (user_id, grade, class_name): (Option<i64>, Option<&str>, Option<&str>) = match audience {
        Audience::User(id) | Audience::Student(id) => (Some(*id), None, None),
        Audience::Class { grade, class_name } => {
            (None, Some(grade.as_str()), Some(class_name.as_str()))
        }
        Audience::Grade(grade) => (None, Some(grade.as_str()), None),
        Audience::Everyone => (None, None, None),
    };
    conn.execute(
        "INSERT INTO notifications(title, message, user_id, grade, class_name) VALUES(?, ?, ?, ?, ?)",
        (title, message, user_id, grade, class_name),
    )?;
    Ok(conn.last_insert_rowid())
}

/// Registered delivery tokens for the audience. Class and grade audiences only reach students.
pub fn resolve_tokens(conn: &Connection, audience: &Audience) -> rusqlite::Result<Vec<String>> {
    let (sql, binds): (&str, Vec<Value>) = match audience {
        Audience::User(id) => (
            "SELECT token FROM tokens WHERE user_id = ? ORDER BY id",
            vec![Value::Integer(*id)],
        ),
        Audience::Student(id) => (
            "SELECT token FROM tokens WHERE user_type = 'student' AND user_id = ? ORDER BY id",
            vec![Value::Integer(*id)],
        ),
        Audience::Class { grade, class_name } => (
            "SELECT t.token FROM tokens t
             JOIN students s ON s.id = t.user_id
             WHERE t.user_type = 'student' AND s.grade = ? AND s.class_name = ?
             ORDER BY t.id",
            vec![Value::Text(grade.clone()), Value::Text(class_name.clone())],
        ),
        Audience::Grade(grade) => (
            "SELECT t.token FROM tokens t
             JOIN students s ON s.id = t.user_id
             WHERE t.user_type = 'student' AND s.grade = ?
             ORDER BY t.id",
            vec![Value::Text(grade.clone())],
        ),
        Audience::Everyone => ("SELECT token FROM tokens ORDER BY id", vec![]),
    };
    let mut stmt = conn.prepare(sql)?;
    let tokens = stmt
        .query_map(params_from_iter(binds), |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tokens)
}

/// Push delivery is not wired to any provider yet; record what would have been sent.
pub fn dispatch_push(tokens: &[String], title: &str) {
    tracing::debug!(
        token_count = tokens.len(),
        title,
        "push dispatch skipped, no provider configured"
    );
}
