// src/db/index_db_conn.rs
use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::aliases::IndexPassphrase;
use crate::consts::DB_KDF_ITERATIONS;
use crate::error::Result;

/// Open (or create) the SQLCipher index and make sure the schema exists
pub fn open_index_db(path: &Path, passphrase: &IndexPassphrase) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    key_connection(&conn, passphrase)?;
    create_schema(&conn)?;
    debug!(db = %path.display(), "index database opened");
    Ok(conn)
}

/// In-memory database with the same schema (still keyed, never touches disk)
pub fn open_index_db_in_memory(passphrase: &IndexPassphrase) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    key_connection(&conn, passphrase)?;
    create_schema(&conn)?;
    Ok(conn)
}

fn key_connection(conn: &Connection, passphrase: &IndexPassphrase) -> Result<()> {
    let key = passphrase.expose_secret().replace('\'', "''");
    conn.execute_batch(&format!(
        r#"
        PRAGMA key = '{key}';
        PRAGMA cipher_page_size = 4096;
        PRAGMA kdf_iter = {DB_KDF_ITERATIONS};
        PRAGMA cipher_hmac_algorithm = HMAC_SHA512;
        PRAGMA cipher_kdf_algorithm = PBKDF2_HMAC_SHA512;
        PRAGMA cipher_plaintext_header_size = 0;
        "#
    ))?;
    Ok(())
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            size INTEGER NOT NULL,
            path TEXT NOT NULL,
            current_version_number INTEGER NOT NULL DEFAULT 1,
            is_encrypted INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS document_versions (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            version_number INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            created_by TEXT NOT NULL,
            changes TEXT,
            file_size INTEGER NOT NULL,
            path TEXT NOT NULL,
            UNIQUE (document_id, version_number)
        );

        CREATE INDEX IF NOT EXISTS idx_versions_document ON document_versions(document_id);
        CREATE INDEX IF NOT EXISTS idx_versions_path ON document_versions(path);

        -- One row per blob path; rows at zero are deleted
        CREATE TABLE IF NOT EXISTS blob_refs (
            path TEXT PRIMARY KEY,
            refs INTEGER NOT NULL CHECK (refs >= 0)
        );
        "#,
    )?;
    Ok(())
}
