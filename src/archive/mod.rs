// src/archive/mod.rs
//! Zip backups of the storage root
//!
//! Entry names are relative to the parent of the storage root and always use
//! `/`, so an archive made on one machine restores the same layout anywhere.
//! Every blob entry is immediately followed by its sidecar.
mod backup;
mod restore;

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::consts::{BACKUP_EXTENSION, BACKUP_PREFIX};
use crate::error::Result;

/// One archive found by [`ArchiveService::list_backups`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ArchiveService {
    storage_root: PathBuf,
}

impl ArchiveService {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Directory archive entry names are relative to: the storage root's parent
    pub fn entry_base(&self) -> &Path {
        match self.storage_root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => &self.storage_root,
        }
    }

    /// Backups in `dir`, newest first; a missing directory has none
    pub fn list_backups(dir: &Path) -> Result<Vec<BackupInfo>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_backup_name(&name) {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let created_at = meta
                .created()
                .or_else(|_| meta.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            backups.push(BackupInfo {
                name,
                path: entry.path(),
                size: meta.len(),
                created_at,
            });
        }

        backups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| backup_order(&b.name).cmp(&backup_order(&a.name)))
        });
        Ok(backups)
    }
}

/// `backup-2025-01-31T12-00-00-000Z.zip`
pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!(
        "{BACKUP_PREFIX}{}.{BACKUP_EXTENSION}",
        at.format("%Y-%m-%dT%H-%M-%S-%3fZ")
    )
}

fn is_backup_name(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX) && name.ends_with(&format!(".{BACKUP_EXTENSION}"))
}

/// Timestamp stem plus the collision suffix: `backup-<ts>-2.zip` is
/// `("backup-<ts>", 2)`, an unsuffixed name counts as 0
fn backup_order(name: &str) -> (&str, u32) {
    let stem = name
        .strip_suffix(&format!(".{BACKUP_EXTENSION}"))
        .unwrap_or(name);
    stem.rsplit_once('-')
        .filter(|(_, n)| n.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|(head, n)| Some((head, n.parse().ok()?)))
        .unwrap_or((stem, 0))
}

/// Portable zip entry name for `path` relative to `base`
fn entry_name(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts = rel
        .components()
        .map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
