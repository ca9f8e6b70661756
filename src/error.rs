// src/error.rs
//! Public error type for the entire crate

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication tag did not match: ciphertext, IV or tag was altered
    #[error("integrity check failed: content or authentication tag was tampered with")]
    CryptoIntegrity,

    /// The blob has no `.meta` sidecar, so it can never be decrypted
    #[error("missing sidecar metadata for blob {}", blob.display())]
    MissingMetadata { blob: PathBuf },

    #[error("malformed sidecar metadata: {0}")]
    MalformedMetadata(String),

    #[error("version invariant violated: {0}")]
    VersionInvariant(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backup incomplete: {0}")]
    BackupIncomplete(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("key error: {0}")]
    Key(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("input exceeds the maximum AES-GCM message length")]
    InputTooLarge,
}

pub type Result<T> = std::result::Result<T, CoreError>;
