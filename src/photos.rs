use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoKind {
    Student,
    Teacher,
    Admin,
}

impl PhotoKind {
    pub fn parse(s: &str) -> Option<PhotoKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(PhotoKind::Student),
            "teacher" => Some(PhotoKind::Teacher),
            "admin" => Some(PhotoKind::Admin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhotoKind::Student => "student",
            PhotoKind::Teacher => "teacher",
            PhotoKind::Admin => "admin",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            PhotoKind::Student => "students",
            PhotoKind::Teacher => "teachers",
            PhotoKind::Admin => "admins",
        }
    }
}

pub fn allowed_file(filename: &str) -> bool {
    let Some((stem, ext)) = filename.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty() {
        return false;
    }
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str())
}

/// Stored photos are always saved with a `.jpg` suffix regardless of the source format.
pub fn stored_name(kind: PhotoKind, user_id: i64, unix_secs: i64) -> String {
    format!("{}_{}_{}.jpg", kind.as_str(), user_id, unix_secs)
}

/// Names handed out by `stored_name` are a single path component; reject anything else.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

pub fn store_photo(
    uploads: &Path,
    source: &Path,
    kind: PhotoKind,
    user_id: i64,
    unix_secs: i64,
) -> anyhow::Result<String> {
    if !source.is_file() {
        return Err(anyhow!("photo not found: {}", source.to_string_lossy()));
    }
    std::fs::create_dir_all(uploads)
        .with_context(|| format!("failed to create directory {}", uploads.to_string_lossy()))?;
    let name = stored_name(kind, user_id, unix_secs);
    let dst = uploads.join(&name);
    std::fs::copy(source, &dst).with_context(|| {
        format!(
            "failed to copy photo from {} to {}",
            source.to_string_lossy(),
            dst.to_string_lossy()
        )
    })?;
    Ok(name)
}

pub fn resolve_photo(uploads: &Path, name: &str) -> Option<PathBuf> {
    if !is_safe_name(name) {
        return None;
    }
    let p = uploads.join(name);
    p.is_file().then_some(p)
}
