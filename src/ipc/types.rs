use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::{Session, SessionStore};
use crate::config::Config;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub session: Option<String>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub sessions: SessionStore,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            workspace: None,
            db: None,
            sessions: SessionStore::new(config.session_ttl()),
            config,
        }
    }
}

/// The authenticated user behind a request, resolved by the router before dispatch.
#[derive(Debug, Clone)]
pub struct Caller {
    pub token: String,
    pub session: Session,
}
