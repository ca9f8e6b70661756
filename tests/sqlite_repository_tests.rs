// tests/sqlite_repository_tests.rs
mod common;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use encrypted_doc_vault::crypto::sidecar_path;
use encrypted_doc_vault::versioning::VersionFilter;
use encrypted_doc_vault::{
    BlobRef, CoreError, Document, DocumentRepository, DocumentVersion, IndexPassphrase,
    NewDocument, SqliteRepository, StorageLayout, VersionMeta, VersionStore,
};

use common::{setup, write_file};

fn passphrase() -> IndexPassphrase {
    IndexPassphrase::new("test-index-pass".to_string())
}

fn document(id: &str) -> Document {
    let now = Utc::now();
    Document {
        id: id.into(),
        name: format!("{id}.txt"),
        size: 12,
        path: PathBuf::from(format!("/vault/{id}/a.enc")),
        current_version_number: 1,
        is_encrypted: true,
        created_at: now,
        updated_at: now,
    }
}

fn version(document_id: &str, number: u32, path: &str) -> DocumentVersion {
    DocumentVersion {
        id: format!("{document_id}-v{number}"),
        document_id: document_id.into(),
        version_number: number,
        created_at: Utc::now(),
        created_by: "tester".into(),
        changes: (number > 1).then(|| format!("edit {number}")),
        file_size: u64::from(number) * 100,
        path: PathBuf::from(path),
    }
}

#[test]
fn test_document_rows_round_trip() {
    setup();
    let repo = SqliteRepository::in_memory(&passphrase()).unwrap();
    let doc = document("d1");
    repo.create_document(&doc).unwrap();

    let loaded = repo.get_document("d1").unwrap().unwrap();
    assert_eq!(loaded.id, doc.id);
    assert_eq!(loaded.path, doc.path);
    assert_eq!(loaded.size, doc.size);
    assert_eq!(loaded.created_at, doc.created_at);

    let mut updated = loaded.clone();
    updated.current_version_number = 3;
    updated.size = 77;
    repo.update_document(&updated).unwrap();
    assert_eq!(repo.get_document("d1").unwrap().unwrap().size, 77);

    assert!(matches!(
        repo.create_document(&doc),
        Err(CoreError::VersionInvariant(_))
    ));
    assert!(matches!(
        repo.update_document(&document("ghost")),
        Err(CoreError::NotFound(_))
    ));

    repo.delete_document("d1").unwrap();
    assert!(repo.get_document("d1").unwrap().is_none());
}

#[test]
fn test_duplicate_version_number_is_rejected() {
    let repo = SqliteRepository::in_memory(&passphrase()).unwrap();
    repo.create_version(&version("d1", 1, "/a")).unwrap();
    let mut dup = version("d1", 1, "/b");
    dup.id = "other-id".into();
    assert!(matches!(
        repo.create_version(&dup),
        Err(CoreError::VersionInvariant(_))
    ));
}

#[test]
fn test_version_filters() {
    let repo = SqliteRepository::in_memory(&passphrase()).unwrap();
    repo.create_version(&version("d2", 2, "/shared")).unwrap();
    repo.create_version(&version("d1", 2, "/b")).unwrap();
    repo.create_version(&version("d1", 1, "/shared")).unwrap();

    let d1: Vec<u32> = repo
        .list_versions(&VersionFilter::for_document("d1"))
        .unwrap()
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(d1, vec![1, 2]);

    let shared = repo
        .list_versions(&VersionFilter::referencing("/shared"))
        .unwrap();
    assert_eq!(shared.len(), 2);
    assert_eq!(repo.list_versions(&VersionFilter::default()).unwrap().len(), 3);

    let v = repo.get_version("d1-v2").unwrap().unwrap();
    assert_eq!(v.changes.as_deref(), Some("edit 2"));
    assert_eq!(v.file_size, 200);
    repo.delete_version("d1-v2").unwrap();
    assert!(repo.get_version("d1-v2").unwrap().is_none());
}

#[test]
fn test_blob_ledger_counts() {
    let repo = SqliteRepository::in_memory(&passphrase()).unwrap();
    let blob = PathBuf::from("/vault/x.enc");

    assert_eq!(repo.blob_refs(&blob).unwrap(), 0);
    assert_eq!(repo.ensure_blob(&blob).unwrap(), 1);
    assert_eq!(repo.ensure_blob(&blob).unwrap(), 1);
    assert_eq!(repo.acquire_blob(&blob).unwrap(), 2);
    assert_eq!(repo.release_blob(&blob).unwrap(), 1);
    assert_eq!(repo.release_blob(&blob).unwrap(), 0);
    assert_eq!(repo.release_blob(&blob).unwrap(), 0);
    assert_eq!(repo.blob_refs(&blob).unwrap(), 0);
}

#[test]
fn test_index_persists_and_needs_the_passphrase() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("index").join("index.db");
    {
        let repo = SqliteRepository::open(&db, &passphrase()).unwrap();
        repo.create_document(&document("kept")).unwrap();
    }

    let reopened = SqliteRepository::open(&db, &passphrase()).unwrap();
    assert!(reopened.get_document("kept").unwrap().is_some());
    drop(reopened);

    let wrong = IndexPassphrase::new("not-the-pass".to_string());
    assert!(SqliteRepository::open(&db, &wrong).is_err());
}

#[test]
fn test_version_store_over_sqlite() {
    setup();
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("documents"));
    let repo = Arc::new(SqliteRepository::in_memory(&passphrase()).unwrap());
    let store = VersionStore::new(repo, layout);

    let blob = |doc: &str, size: u64| {
        let path = store.layout().new_blob_path(doc);
        write_file(&path, b"cipher");
        write_file(&sidecar_path(&path), b"{}");
        BlobRef::new(path, size)
    };

    let doc = store
        .create_document(NewDocument::with_id("doc", "doc.txt", blob("doc", 1)))
        .unwrap();
    let v2 = store
        .create_version(&doc.id, Some(blob("doc", 2)), VersionMeta::new("a"))
        .unwrap();
    store
        .create_version(&doc.id, Some(blob("doc", 3)), VersionMeta::new("a"))
        .unwrap();
    assert_eq!(store.latest_version_number(&doc.id).unwrap(), 3);

    store.delete_version(&doc.id, &v2.id).unwrap();
    assert!(!v2.path.exists());
    let numbers: Vec<u32> = store
        .list_versions(&doc.id)
        .unwrap()
        .iter()
        .map(|v| v.version_number)
        .collect();
    assert_eq!(numbers, vec![1, 3]);

    let v1 = store.get_version(&doc.id, 1).unwrap();
    let v4 = store.restore_version(&doc.id, &v1.id, "b").unwrap();
    assert_eq!(v4.version_number, 4);
    assert_eq!(store.document(&doc.id).unwrap().path, v1.path);
}
