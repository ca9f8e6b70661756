// src/db/index_db_ops.rs
//! SQLCipher-backed [`DocumentRepository`]
//!
//! One connection behind a mutex; every trait method is a single statement or
//! a short transaction.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use super::index_db_conn::{open_index_db, open_index_db_in_memory};
use crate::aliases::IndexPassphrase;
use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::versioning::{Document, DocumentRepository, DocumentVersion, VersionFilter};

const DOCUMENT_COLUMNS: &str =
    "id, name, size, path, current_version_number, is_encrypted, created_at, updated_at";
const VERSION_COLUMNS: &str =
    "id, document_id, version_number, created_at, created_by, changes, file_size, path";

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    pub fn open(path: &Path, passphrase: &IndexPassphrase) -> Result<Self> {
        Ok(Self::from_connection(open_index_db(path, passphrase)?))
    }

    pub fn in_memory(passphrase: &IndexPassphrase) -> Result<Self> {
        Ok(Self::from_connection(open_index_db_in_memory(passphrase)?))
    }

    /// Open the index named by `config.paths.index_db` with `config.keys.index_key`
    pub fn from_config(config: &Config) -> Result<Self> {
        let passphrase = IndexPassphrase::new(config.keys.index_key.clone());
        Self::open(&config.paths.index_db, &passphrase)
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        name: row.get(1)?,
        size: row.get::<_, i64>(2)? as u64,
        path: PathBuf::from(row.get::<_, String>(3)?),
        current_version_number: row.get(4)?,
        is_encrypted: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentVersion> {
    Ok(DocumentVersion {
        id: row.get(0)?,
        document_id: row.get(1)?,
        version_number: row.get(2)?,
        created_at: row.get(3)?,
        created_by: row.get(4)?,
        changes: row.get(5)?,
        file_size: row.get::<_, i64>(6)? as u64,
        path: PathBuf::from(row.get::<_, String>(7)?),
    })
}

/// Unique-key violations surface as invariant errors, like the in-memory store
fn map_constraint(e: rusqlite::Error, what: impl FnOnce() -> String) -> CoreError {
    match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => CoreError::VersionInvariant(what()),
        _ => CoreError::Sql(e),
    }
}

impl DocumentRepository for SqliteRepository {
    fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.conn();
        let doc = conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                [id],
                document_from_row,
            )
            .optional()?;
        Ok(doc)
    }

    fn create_document(&self, document: &Document) -> Result<()> {
        self.conn()
            .execute(
                &format!("INSERT INTO documents ({DOCUMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    document.id,
                    document.name,
                    document.size as i64,
                    path_text(&document.path),
                    document.current_version_number,
                    document.is_encrypted,
                    document.created_at,
                    document.updated_at,
                ],
            )
            .map_err(|e| map_constraint(e, || format!("document {} already exists", document.id)))?;
        Ok(())
    }

    fn update_document(&self, document: &Document) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE documents
             SET name = ?2, size = ?3, path = ?4, current_version_number = ?5,
                 is_encrypted = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                document.id,
                document.name,
                document.size as i64,
                path_text(&document.path),
                document.current_version_number,
                document.is_encrypted,
                document.updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound(format!("document {}", document.id)));
        }
        Ok(())
    }

    fn delete_document(&self, id: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM documents WHERE id = ?1", [id])?;
        Ok(())
    }

    fn list_documents(&self) -> Result<Vec<Document>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at, id"
        ))?;
        let docs = stmt
            .query_map([], document_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(docs)
    }

    fn get_version(&self, id: &str) -> Result<Option<DocumentVersion>> {
        let conn = self.conn();
        let version = conn
            .query_row(
                &format!("SELECT {VERSION_COLUMNS} FROM document_versions WHERE id = ?1"),
                [id],
                version_from_row,
            )
            .optional()?;
        Ok(version)
    }

    fn create_version(&self, version: &DocumentVersion) -> Result<()> {
        self.conn()
            .execute(
                &format!("INSERT INTO document_versions ({VERSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    version.id,
                    version.document_id,
                    version.version_number,
                    version.created_at,
                    version.created_by,
                    version.changes,
                    version.file_size as i64,
                    path_text(&version.path),
                ],
            )
            .map_err(|e| {
                map_constraint(e, || {
                    format!(
                        "version {} of document {} already exists",
                        version.version_number, version.document_id
                    )
                })
            })?;
        Ok(())
    }

    fn delete_version(&self, id: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM document_versions WHERE id = ?1", [id])?;
        Ok(())
    }

    fn list_versions(&self, filter: &VersionFilter) -> Result<Vec<DocumentVersion>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM document_versions
             WHERE (?1 IS NULL OR document_id = ?1) AND (?2 IS NULL OR path = ?2)
             ORDER BY document_id, version_number"
        ))?;
        let path = filter.path.as_deref().map(path_text);
        let versions = stmt
            .query_map(params![filter.document_id, path], version_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(versions)
    }

    fn acquire_blob(&self, path: &Path) -> Result<u32> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let key = path_text(path);
        tx.execute(
            "INSERT INTO blob_refs (path, refs) VALUES (?1, 1)
             ON CONFLICT(path) DO UPDATE SET refs = refs + 1",
            [&key],
        )?;
        let refs: u32 = tx.query_row("SELECT refs FROM blob_refs WHERE path = ?1", [&key], |row| {
            row.get(0)
        })?;
        tx.commit()?;
        Ok(refs)
    }

    fn release_blob(&self, path: &Path) -> Result<u32> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let key = path_text(path);
        tx.execute(
            "UPDATE blob_refs SET refs = refs - 1 WHERE path = ?1 AND refs > 0",
            [&key],
        )?;
        let remaining: u32 = tx
            .query_row("SELECT refs FROM blob_refs WHERE path = ?1", [&key], |row| {
                row.get(0)
            })
            .optional()?
            .unwrap_or(0);
        if remaining == 0 {
            tx.execute("DELETE FROM blob_refs WHERE path = ?1", [&key])?;
        }
        tx.commit()?;
        Ok(remaining)
    }

    fn ensure_blob(&self, path: &Path) -> Result<u32> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let key = path_text(path);
        tx.execute(
            "INSERT INTO blob_refs (path, refs) VALUES (?1, 1)
             ON CONFLICT(path) DO UPDATE SET refs = MAX(refs, 1)",
            [&key],
        )?;
        let refs: u32 = tx.query_row("SELECT refs FROM blob_refs WHERE path = ?1", [&key], |row| {
            row.get(0)
        })?;
        tx.commit()?;
        Ok(refs)
    }

    fn blob_refs(&self, path: &Path) -> Result<u32> {
        let conn = self.conn();
        let refs = conn
            .query_row(
                "SELECT refs FROM blob_refs WHERE path = ?1",
                [path_text(path)],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        Ok(refs)
    }
}
