use rusqlite::{Connection, OptionalExtension, Params};
use serde::de::DeserializeOwned;

use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Caller};

/// Deserialize `params` into a typed struct; unknown fields are ignored, type errors are `bad_params`.
pub fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T, HandlerErr> {
    let params = if params.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(params).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn require_caller(caller: Option<&Caller>) -> Result<&Caller, HandlerErr> {
    caller.ok_or_else(|| HandlerErr::new("unauthenticated", "missing session"))
}

pub fn require_non_empty(value: &str, key: &str) -> Result<String, HandlerErr> {
    let t = value.trim();
    if t.is_empty() {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    }
    Ok(t.to_string())
}

pub fn row_exists(conn: &Connection, table: &str, id: i64) -> Result<bool, HandlerErr> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    conn.query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
        .map_err(HandlerErr::query)
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn query_rows<P, F>(
    conn: &Connection,
    sql: &str,
    params: P,
    f: F,
) -> Result<Vec<serde_json::Value>, HandlerErr>
where
    P: Params,
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value>,
{
    let mut stmt = conn.prepare(sql).map_err(HandlerErr::query)?;
    stmt.query_map(params, f)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)
}
