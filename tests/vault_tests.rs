// tests/vault_tests.rs
mod common;

use std::fs;

use encrypted_doc_vault::crypto::sidecar_path;
use encrypted_doc_vault::{CoreError, DocumentRepository, VersionMeta};
use sha2::{Digest, Sha256};

use common::{cipher, sample_bytes, tree, TestVault};

#[test]
fn test_add_upload_and_read_back_every_version() {
    let tv = TestVault::new();
    let doc = tv.vault.add_document("report.txt", &b"draft one"[..]).unwrap();
    assert_eq!(doc.size, 9);
    assert!(doc.path.starts_with(tv.storage_root().join(&doc.id)));

    tv.vault
        .upload_version(&doc.id, &b"draft two!"[..], VersionMeta::new("alice"))
        .unwrap();
    tv.vault
        .upload_version(
            &doc.id,
            &b"final"[..],
            VersionMeta::new("bob").with_changes("sign-off"),
        )
        .unwrap();

    assert_eq!(tv.vault.read_version_to_vec(&doc.id, 1).unwrap(), b"draft one");
    assert_eq!(tv.vault.read_version_to_vec(&doc.id, 2).unwrap(), b"draft two!");
    let out = tv.dir.path().join("out.txt");
    tv.vault.read_current(&doc.id, &out).unwrap();
    assert_eq!(fs::read(&out).unwrap(), b"final");

    let current = tv.vault.store().document(&doc.id).unwrap();
    assert_eq!(current.current_version_number, 3);
    assert_eq!(current.size, 5);
}

#[test]
fn test_restore_makes_old_content_current() {
    let tv = TestVault::new();
    let doc = tv.vault.add_document("a.txt", &b"v1"[..]).unwrap();
    tv.vault
        .upload_version(&doc.id, &b"v2"[..], VersionMeta::new("x"))
        .unwrap();
    let v1 = tv.vault.store().get_version(&doc.id, 1).unwrap();

    tv.vault.restore_version(&doc.id, &v1.id, "x").unwrap();
    let out = tv.dir.path().join("restored.txt");
    tv.vault.read_current(&doc.id, &out).unwrap();
    assert_eq!(fs::read(&out).unwrap(), b"v1");
    assert_eq!(tv.vault.list_versions(&doc.id).unwrap().len(), 3);
}

#[test]
fn test_upload_to_unknown_document_writes_nothing() {
    let tv = TestVault::new();
    let err = tv
        .vault
        .upload_version("nobody", &b"data"[..], VersionMeta::new("x"))
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
    assert!(tree(&tv.storage_root()).is_empty());
}

#[test]
fn test_deleting_a_version_removes_its_blob_pair() {
    let tv = TestVault::new();
    let doc = tv.vault.add_document("a.txt", &b"one"[..]).unwrap();
    let v2 = tv
        .vault
        .upload_version(&doc.id, &b"two"[..], VersionMeta::new("x"))
        .unwrap();
    tv.vault
        .upload_version(&doc.id, &b"three"[..], VersionMeta::new("x"))
        .unwrap();

    tv.vault.delete_version(&doc.id, &v2.id).unwrap();
    assert!(!v2.path.exists());
    assert!(!sidecar_path(&v2.path).exists());
    assert_eq!(tree(&tv.storage_root()).len(), 4);
}

#[test]
fn test_vault_backup_and_restore() {
    let tv = TestVault::new();
    let data = sample_bytes(250_000, 9);
    let doc = tv.vault.add_document("big.bin", &data[..]).unwrap();

    let archive = tv.vault.backup(&tv.backup_dir()).unwrap();
    assert_eq!(tv.vault.list_backups(&tv.backup_dir()).unwrap().len(), 1);

    fs::remove_dir_all(tv.storage_root()).unwrap();
    let restored = tv.vault.restore(&archive).unwrap();
    assert_eq!(restored, vec![doc.path.clone()]);

    let plain = tv.vault.read_version_to_vec(&doc.id, 1).unwrap();
    assert_eq!(Sha256::digest(&plain), Sha256::digest(&data));
}

#[test]
fn test_rotate_key_reencrypts_every_blob() {
    let mut tv = TestVault::new();
    let doc = tv.vault.add_document("a.txt", &b"alpha"[..]).unwrap();
    tv.vault
        .upload_version(&doc.id, &b"beta"[..], VersionMeta::new("x"))
        .unwrap();
    let other = tv.vault.add_document("b.txt", &b"gamma"[..]).unwrap();

    let old_blob = fs::read(&doc.path).unwrap();
    let old_key_copy = tv.vault.cipher().decrypt_to_vec(&other.path).unwrap();
    assert_eq!(old_key_copy, b"gamma");

    let rotated = tv.vault.rotate_key(cipher()).unwrap();
    assert_eq!(rotated, 3);
    assert_ne!(fs::read(&doc.path).unwrap(), old_blob);

    assert_eq!(tv.vault.read_version_to_vec(&doc.id, 1).unwrap(), b"alpha");
    assert_eq!(tv.vault.read_version_to_vec(&doc.id, 2).unwrap(), b"beta");
    assert_eq!(tv.vault.read_version_to_vec(&other.id, 1).unwrap(), b"gamma");
    // No staging leftovers: three blobs, three sidecars
    assert_eq!(tree(&tv.storage_root()).len(), 6);
}

#[test]
fn test_failed_rotation_leaves_blobs_untouched() {
    let mut tv = TestVault::new();
    let good = tv.vault.add_document("good.txt", &b"good"[..]).unwrap();
    let bad = tv.vault.add_document("bad.txt", &b"bad!"[..]).unwrap();

    let mut bytes = fs::read(&bad.path).unwrap();
    bytes[0] ^= 0xff;
    fs::write(&bad.path, bytes).unwrap();
    let good_before = fs::read(&good.path).unwrap();
    let good_meta_before = fs::read(sidecar_path(&good.path)).unwrap();

    let err = tv.vault.rotate_key(cipher()).unwrap_err();
    assert!(matches!(err, CoreError::CryptoIntegrity));

    assert_eq!(fs::read(&good.path).unwrap(), good_before);
    assert_eq!(fs::read(sidecar_path(&good.path)).unwrap(), good_meta_before);
    assert_eq!(tv.vault.read_version_to_vec(&good.id, 1).unwrap(), b"good");
}

#[test]
fn test_failed_rotation_leaves_no_staging_files() {
    let mut tv = TestVault::new();
    tv.vault.add_document("good.txt", &b"good"[..]).unwrap();
    let bad = tv.vault.add_document("bad.txt", &b"bad!"[..]).unwrap();
    let mut bytes = fs::read(&bad.path).unwrap();
    bytes[0] ^= 0xff;
    fs::write(&bad.path, bytes).unwrap();
    let before = tree(&tv.storage_root());

    assert!(tv.vault.rotate_key(cipher()).is_err());
    assert_eq!(tree(&tv.storage_root()), before);
}

#[test]
fn test_rotate_key_after_backup_into_storage_root() {
    let mut tv = TestVault::new();
    let doc = tv.vault.add_document("a.txt", &b"alpha"[..]).unwrap();
    let root = tv.storage_root();
    let archive = tv.vault.backup(&root).unwrap();

    assert_eq!(tv.vault.rotate_key(cipher()).unwrap(), 1);
    assert_eq!(tv.vault.read_version_to_vec(&doc.id, 1).unwrap(), b"alpha");
    assert!(archive.is_file());
}

#[test]
fn test_delete_document_cleans_storage() {
    let tv = TestVault::new();
    let doc = tv.vault.add_document("a.txt", &b"one"[..]).unwrap();
    tv.vault
        .upload_version(&doc.id, &b"two"[..], VersionMeta::new("x"))
        .unwrap();

    tv.vault.delete_document(&doc.id).unwrap();
    assert!(tree(&tv.storage_root()).is_empty());
    assert!(tv.repo.get_document(&doc.id).unwrap().is_none());
    assert_eq!(tv.repo.blob_refs(&doc.path).unwrap(), 0);
}
