use anyhow::{anyhow, Context};
use serde_json::json;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_FILE: &str = "ares.sqlite3";
const DB_ENTRY: &str = "db/ares.sqlite3";
const UPLOADS_DIR: &str = "uploads";
const UPLOADS_PREFIX: &str = "uploads/";
pub const BUNDLE_FORMAT_V1: &str = "ares-workspace-v1";
pub const LEGACY_FORMAT: &str = "legacy-sqlite3";
const IMPORTING_FILE: &str = "ares.sqlite3.importing";
const PREVIOUS_FILE: &str = "ares.sqlite3.previous";
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub photo_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub photos_restored: usize,
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE);
    if !db_path.is_file() {
        return Err(anyhow!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        ));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let photos = list_photos(&workspace_path.join(UPLOADS_DIR))?;

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "photoCount": photos.len(),
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    let mut db_file = File::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    std::io::copy(&mut db_file, &mut zip).context("failed to write database entry")?;

    // Photos are already compressed images.
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    for name in &photos {
        let src = workspace_path.join(UPLOADS_DIR).join(name);
        zip.start_file(format!("{}{}", UPLOADS_PREFIX, name), stored)
            .with_context(|| format!("failed to start photo entry {}", name))?;
        let mut f = File::open(&src)
            .with_context(|| format!("failed to open photo {}", src.to_string_lossy()))?;
        std::io::copy(&mut f, &mut zip)
            .with_context(|| format!("failed to write photo entry {}", name))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2 + photos.len(),
        photo_count: photos.len(),
    })
}

/// What `import_workspace_bundle` would read from `in_path`, checked without touching any workspace.
pub fn inspect_bundle(in_path: &Path) -> anyhow::Result<String> {
    if !is_zip_file(in_path)? {
        if !is_sqlite_file(in_path)? {
            return Err(anyhow!(
                "not a workspace bundle or sqlite database: {}",
                in_path.to_string_lossy()
            ));
        }
        return Ok(LEGACY_FORMAT.to_string());
    }
    let mut archive = open_bundle(in_path)?;
    read_manifest_format(&mut archive)?;
    archive
        .by_name(DB_ENTRY)
        .context("bundle missing db/ares.sqlite3")?;
    Ok(BUNDLE_FORMAT_V1.to_string())
}

/// Replace the workspace database (and restore photos) from a bundle or a bare sqlite file.
///
/// The current database is kept as `ares.sqlite3.previous` until `discard_previous_database`
/// or `restore_previous_database` is called. Nothing in the workspace changes on error.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    let tmp_dst = workspace_path.join(IMPORTING_FILE);
    if tmp_dst.exists() {
        let _ = std::fs::remove_file(&tmp_dst);
    }

    if !is_zip_file(in_path)? {
        if !is_sqlite_file(in_path)? {
            return Err(anyhow!(
                "not a workspace bundle or sqlite database: {}",
                in_path.to_string_lossy()
            ));
        }
        std::fs::copy(in_path, &tmp_dst).with_context(|| {
            format!(
                "failed to copy legacy sqlite backup from {} to {}",
                in_path.to_string_lossy(),
                tmp_dst.to_string_lossy()
            )
        })?;
        swap_in_database(workspace_path, &tmp_dst)?;
        return Ok(ImportSummary {
            bundle_format_detected: LEGACY_FORMAT.to_string(),
            photos_restored: 0,
        });
    }

    let mut archive = open_bundle(in_path)?;
    read_manifest_format(&mut archive)?;

    let extracted = extract_database(&mut archive, &tmp_dst);
    // Photos go in before the database swap; a failure leaves the old database in place.
    let restored = extracted.and_then(|()| restore_photos(&mut archive, workspace_path));
    let photos_restored = match restored {
        Ok(n) => n,
        Err(e) => {
            let _ = std::fs::remove_file(&tmp_dst);
            return Err(e);
        }
    };
    swap_in_database(workspace_path, &tmp_dst)?;

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        photos_restored,
    })
}

/// Drop the database kept aside by a successful import.
pub fn discard_previous_database(workspace_path: &Path) {
    let prev = workspace_path.join(PREVIOUS_FILE);
    if prev.exists() {
        let _ = std::fs::remove_file(prev);
    }
}

/// Put the database kept aside by an import back in place.
pub fn restore_previous_database(workspace_path: &Path) -> anyhow::Result<()> {
    let prev = workspace_path.join(PREVIOUS_FILE);
    let dst = workspace_path.join(DB_FILE);
    if !prev.is_file() {
        return Err(anyhow!("no previous database in {}", workspace_path.to_string_lossy()));
    }
    std::fs::rename(&prev, &dst).with_context(|| {
        format!(
            "failed to restore previous database to {}",
            dst.to_string_lossy()
        )
    })
}

fn swap_in_database(workspace_path: &Path, tmp_dst: &Path) -> anyhow::Result<()> {
    let dst = workspace_path.join(DB_FILE);
    let prev = workspace_path.join(PREVIOUS_FILE);
    if prev.exists() {
        let _ = std::fs::remove_file(&prev);
    }
    if dst.exists() {
        std::fs::rename(&dst, &prev).with_context(|| {
            format!(
                "failed to set aside existing database {}",
                dst.to_string_lossy()
            )
        })?;
    }
    if let Err(e) = std::fs::rename(tmp_dst, &dst) {
        let _ = std::fs::rename(&prev, &dst);
        return Err(anyhow!(
            "failed to move imported database to {}: {}",
            dst.to_string_lossy(),
            e
        ));
    }
    Ok(())
}

fn open_bundle(in_path: &Path) -> anyhow::Result<ZipArchive<File>> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    ZipArchive::new(in_file).context("invalid zip archive")
}

fn read_manifest_format(archive: &mut ZipArchive<File>) -> anyhow::Result<()> {
    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    Ok(())
}

fn extract_database(archive: &mut ZipArchive<File>, tmp_dst: &Path) -> anyhow::Result<()> {
    let mut db_out = File::create(tmp_dst).with_context(|| {
        format!(
            "failed to create temp database {}",
            tmp_dst.to_string_lossy()
        )
    })?;
    {
        let mut db_entry = archive
            .by_name(DB_ENTRY)
            .context("bundle missing db/ares.sqlite3")?;
        std::io::copy(&mut db_entry, &mut db_out).context("failed to extract database entry")?;
    }
    db_out
        .flush()
        .context("failed to flush extracted database")?;
    Ok(())
}

fn restore_photos(archive: &mut ZipArchive<File>, workspace_path: &Path) -> anyhow::Result<usize> {
    let uploads = workspace_path.join(UPLOADS_DIR);
    std::fs::create_dir_all(&uploads)
        .with_context(|| format!("failed to create directory {}", uploads.to_string_lossy()))?;
    let mut photos_restored = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("failed to read bundle entry")?;
        let Some(name) = entry.name().strip_prefix(UPLOADS_PREFIX).map(|s| s.to_string()) else {
            continue;
        };
        // Only flat file names; nested or traversing entries are skipped.
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            continue;
        }
        let out = uploads.join(&name);
        let mut f = File::create(&out)
            .with_context(|| format!("failed to create photo {}", out.to_string_lossy()))?;
        std::io::copy(&mut entry, &mut f)
            .with_context(|| format!("failed to extract photo {}", name))?;
        photos_restored += 1;
    }
    Ok(photos_restored)
}

fn list_photos(uploads: &Path) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    if !uploads.is_dir() {
        return Ok(out);
    }
    for ent in std::fs::read_dir(uploads)
        .with_context(|| format!("failed to read directory {}", uploads.to_string_lossy()))?
    {
        let ent = ent?;
        let p = ent.path();
        if !p.is_file() {
            continue;
        }
        if let Some(name) = p.file_name().and_then(|s| s.to_str()) {
            out.push(name.to_string());
        }
    }
    out.sort();
    Ok(out)
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}

fn is_sqlite_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut header = [0u8; 16];
    let mut filled = 0;
    while filled < header.len() {
        let n = f
            .read(&mut header[filled..])
            .context("failed to read file header")?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(&header == SQLITE_HEADER)
}
