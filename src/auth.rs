use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

/// Unsalted SHA-256, lowercase hex.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Teachers may log in with their password once set, or with the first-access code until then.
pub fn teacher_credentials_match(
    stored_hash: Option<&str>,
    first_access_code: Option<&str>,
    password: &str,
) -> bool {
    match stored_hash {
        Some(h) if !h.is_empty() => h == hash_password(password),
        _ => matches!(first_access_code, Some(c) if !c.is_empty() && c == password),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Pt,
    En,
}

impl Lang {
    pub fn parse(s: &str) -> Option<Lang> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pt" => Some(Lang::Pt),
            "en" => Some(Lang::En),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub role: Role,
    pub user_id: i64,
    pub lang: Lang,
    pub theme: Theme,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    /// True when the session is the given role acting on its own record.
    pub fn is_self(&self, role: Role, user_id: i64) -> bool {
        self.role == role && self.user_id == user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    Unknown,
    Expired,
}

pub struct SessionStore {
    ttl: Duration,
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: HashMap::new(),
        }
    }

    pub fn issue(&mut self, role: Role, user_id: i64, now: DateTime<Utc>) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                role,
                user_id,
                lang: Lang::Pt,
                theme: Theme::Light,
                last_seen: now,
            },
        );
        token
    }

    /// Validates the token and refreshes its idle timer. Expired sessions are evicted.
    pub fn touch(&mut self, token: &str, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let Some(session) = self.sessions.get_mut(token) else {
            return Err(SessionError::Unknown);
        };
        if now - session.last_seen > self.ttl {
            self.sessions.remove(token);
            return Err(SessionError::Expired);
        }
        session.last_seen = now;
        Ok(session.clone())
    }

    pub fn get_mut(&mut self, token: &str) -> Option<&mut Session> {
        self.sessions.get_mut(token)
    }

    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drop every session belonging to a user, except `keep` if given.
    pub fn revoke_user(&mut self, role: Role, user_id: i64, keep: Option<&str>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|token, s| {
            Some(token.as_str()) == keep || !(s.role == role && s.user_id == user_id)
        });
        before - self.sessions.len()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
