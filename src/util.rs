//! Small utility functions used across the crate
//!
//! Id generation and best-effort file removal.
//! Keep this light: if it grows, split further.

use std::io;
use std::path::Path;

/// Random 128-bit identifier rendered as 32 lowercase hex chars
pub fn new_record_id() -> String {
    let raw: [u8; 16] = rand::random();
    hex::encode(raw)
}

/// Remove a file, treating "already gone" as success
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
