// src/crypto/sidecar.rs
//! `<blob>.meta` sidecar files: the only place a blob's IV and tag live
//!
//! Wire format: `{"iv": "<hex>", "authTag": "<hex>", "algorithm": "aes-256-gcm"}`

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::consts::{IV_LEN, SIDECAR_EXTENSION, STAGING_PREFIX, TAG_LEN};
use crate::enums::CipherAlgorithm;
use crate::error::{CoreError, Result};
use crate::util::remove_file_if_exists;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarMetadata {
    pub iv: String,
    pub auth_tag: String,
    pub algorithm: CipherAlgorithm,
}

impl SidecarMetadata {
    pub fn new(iv: &[u8; IV_LEN], auth_tag: &[u8; TAG_LEN]) -> Self {
        Self {
            iv: hex::encode(iv),
            auth_tag: hex::encode(auth_tag),
            algorithm: CipherAlgorithm::Aes256Gcm,
        }
    }

    pub fn iv_bytes(&self) -> Result<[u8; IV_LEN]> {
        decode_fixed(&self.iv, "iv")
    }

    pub fn tag_bytes(&self) -> Result<[u8; TAG_LEN]> {
        decode_fixed(&self.auth_tag, "authTag")
    }
}

fn decode_fixed<const N: usize>(encoded: &str, field: &str) -> Result<[u8; N]> {
    let raw = hex::decode(encoded)
        .map_err(|e| CoreError::MalformedMetadata(format!("{field} is not valid hex: {e}")))?;
    let len = raw.len();
    raw.try_into().map_err(|_| {
        CoreError::MalformedMetadata(format!("{field} must be {N} bytes, found {len}"))
    })
}

/// `<blob>` → `<blob>.meta` (appended, so `a.enc` becomes `a.enc.meta`)
pub fn sidecar_path(blob: &Path) -> PathBuf {
    let mut raw = blob.as_os_str().to_owned();
    raw.push(".");
    raw.push(SIDECAR_EXTENSION);
    PathBuf::from(raw)
}

pub fn is_sidecar(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == SIDECAR_EXTENSION)
        .unwrap_or(false)
}

/// Load and validate the sidecar next to `blob`
pub fn read_sidecar(blob: &Path) -> Result<SidecarMetadata> {
    let path = sidecar_path(blob);
    let raw = match std::fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CoreError::MissingMetadata {
                blob: blob.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let meta: SidecarMetadata = serde_json::from_slice(&raw)
        .map_err(|e| CoreError::MalformedMetadata(format!("{}: {e}", path.display())))?;

    // Reject wrong-sized fields up front rather than at decrypt time
    meta.iv_bytes()?;
    meta.tag_bytes()?;
    Ok(meta)
}

/// Serialize into a staging file beside the final sidecar path
pub(crate) fn stage_sidecar(blob: &Path, meta: &SidecarMetadata) -> Result<NamedTempFile> {
    let dir = staging_dir(blob);
    let mut staged = tempfile::Builder::new()
        .prefix(&format!("{STAGING_PREFIX}meta-"))
        .suffix(".partial")
        .tempfile_in(&dir)?;
    serde_json::to_writer(&mut staged, meta)?;
    staged.flush()?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

/// Write the sidecar atomically (staging file + rename)
pub fn write_sidecar(blob: &Path, meta: &SidecarMetadata) -> Result<PathBuf> {
    let target = sidecar_path(blob);
    stage_sidecar(blob, meta)?
        .persist(&target)
        .map_err(|e| CoreError::Io(e.error))?;
    Ok(target)
}

/// Delete a blob together with its sidecar; missing files are not an error
pub fn remove_blob_pair(blob: &Path) -> Result<()> {
    remove_file_if_exists(blob)?;
    remove_file_if_exists(&sidecar_path(blob))?;
    Ok(())
}

/// Directory where staging files for `target` must live (same filesystem)
pub(crate) fn staging_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
