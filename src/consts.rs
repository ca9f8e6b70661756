// src/consts.rs
//! Shared constants: security parameters and defaults

/// Recommended KDF iterations for SQLCipher databases (2025+)
// ~0.1-0.2s on modern hardware
pub const DB_KDF_ITERATIONS: u32 = 256_000;

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// 96-bit GCM nonce: the only size that maps directly onto J0
pub const IV_LEN: usize = 12;

/// Full-length GCM authentication tag
pub const TAG_LEN: usize = 16;

/// NIST SP 800-38D upper bound on plaintext per (key, IV): 2^39 - 256 bits
pub const GCM_MAX_PLAINTEXT: u64 = (1 << 36) - 32;

/// Read/transform/write chunk size for the streaming pipelines
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Extension appended (not substituted) to a blob path to locate its sidecar
pub const SIDECAR_EXTENSION: &str = "meta";

/// Extension used for encrypted blobs created by the vault
pub const BLOB_EXTENSION: &str = "enc";

/// Prefix + extension of archive files produced by the backup service
pub const BACKUP_PREFIX: &str = "backup-";
pub const BACKUP_EXTENSION: &str = "zip";

/// Change note on the synthesised first version of a pre-versioning document
pub const INITIAL_VERSION_NOTE: &str = "Initial version";

/// `createdBy` recorded on versions the store synthesises itself
pub const SYSTEM_ACTOR: &str = "system";

/// Name prefix of every staging file; such files are never archived
pub const STAGING_PREFIX: &str = ".edv-";
