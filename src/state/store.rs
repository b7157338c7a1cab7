//! Release store persistence.
//!
//! The store is a single JSON document holding all releases, newest first.
//! Writes follow the write-temp-then-rename discipline on the same
//! filesystem as the target; the rename is the linearization point. The temp
//! filename embeds the process id so two processes sharing a directory never
//! collide on the temp file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::Release;
use crate::error::StateError;

/// Default store location relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = ".stagecraft/releases.json";

/// Environment override for the store location. Read fresh on every manager
/// construction, never cached process-wide.
pub const STATE_FILE_ENV: &str = "STAGECRAFT_STATE_FILE";

/// Persisted form: `{ "releases": [ ...newest-first... ] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    pub releases: Vec<Release>,
}

/// Resolve the store path: explicit argument, then `STAGECRAFT_STATE_FILE`,
/// then the default.
pub fn resolve_store_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if let Ok(path) = std::env::var(STATE_FILE_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(DEFAULT_STATE_FILE)
}

/// Load the store document. A missing file is an empty store; an undecodable
/// file is corruption.
pub fn load_store(path: &Path) -> Result<StoreDocument, StateError> {
    if !path.exists() {
        return Ok(StoreDocument::default());
    }

    let content = fs::read_to_string(path).map_err(|e| StateError::Io {
        message: format!("failed to read {}: {}", path.display(), e),
    })?;

    serde_json::from_str(&content).map_err(|e| StateError::Corrupt {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Persist the store document atomically.
pub fn save_store(path: &Path, doc: &StoreDocument) -> Result<(), StateError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| StateError::Io {
                message: format!("failed to create {}: {}", parent.display(), e),
            })?;
        }
    }

    let data = serde_json::to_vec_pretty(doc).map_err(|e| StateError::Io {
        message: format!("failed to serialize release store: {}", e),
    })?;

    let tmp = temp_path(path);
    {
        let mut f = fs::File::create(&tmp).map_err(|e| StateError::Io {
            message: format!("failed to create {}: {}", tmp.display(), e),
        })?;
        f.write_all(&data).map_err(|e| StateError::Io {
            message: format!("failed to write {}: {}", tmp.display(), e),
        })?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path).map_err(|e| StateError::Io {
        message: format!(
            "failed to rename {} to {}: {}",
            tmp.display(),
            path.display(),
            e
        ),
    })?;

    fsync_parent_dir(path);

    Ok(())
}

/// Temp file beside the target, pid-suffixed.
fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "releases.json".to_string());
    let tmp_name = format!(".{}.{}.tmp", file_name, std::process::id());
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(tmp_name),
        _ => PathBuf::from(tmp_name),
    }
}

/// Best-effort fsync of the parent directory after a rename, ensuring the
/// directory entry update is durable on crash. Errors are ignored because
/// not all platforms support opening a directory for sync.
fn fsync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}
