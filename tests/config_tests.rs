// tests/config_tests.rs
mod common;

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use encrypted_doc_vault::crypto::{ConfigKeyProvider, EnvKeyProvider, KeyProvider};
use encrypted_doc_vault::{CipherService, Config, CoreError};

#[test]
fn test_defaults_use_dev_keys_and_data_dir() {
    let config = Config::default();
    assert!(config.features.use_dev_keys);
    assert!(config.paths.storage_root.ends_with("encrypted-doc-vault/documents"));
    assert!(config.paths.backup_dir.ends_with("encrypted-doc-vault/backups"));
    assert!(config.keys.master_key.is_some());
}

#[test]
fn test_partial_toml_keeps_defaults_for_missing_sections() {
    let config = Config::from_toml_str(
        r#"
        [paths]
        storage_root = "/srv/vault/documents"
        backup_dir = "/srv/vault/backups"
        index_db = "/srv/vault/index.db"
        "#,
    )
    .unwrap();
    assert_eq!(config.paths.storage_root, PathBuf::from("/srv/vault/documents"));
    assert_eq!(config.paths.index_db, PathBuf::from("/srv/vault/index.db"));
    assert!(config.features.use_dev_keys);
    assert_eq!(config.keys.index_key, Config::default().keys.index_key);
}

#[test]
fn test_invalid_toml_is_a_config_error() {
    assert!(matches!(
        Config::from_toml_str("[paths\nstorage_root ="),
        Err(CoreError::Config(_))
    ));
}

#[test]
fn test_from_file_reads_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edv-config.toml");
    std::fs::write(
        &path,
        "[features]\nuse_dev_keys = false\n[keys]\nindex_key = \"file-pass\"\n",
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert!(!config.features.use_dev_keys);
    assert_eq!(config.keys.index_key, "file-pass");
    assert_eq!(config.keys.master_key, None);
}

#[test]
fn test_overrides_replace_paths_and_disable_dev_keys() {
    let vars: HashMap<&str, &str> = [
        ("EDV_STORAGE_ROOT", "/tmp/edv/docs"),
        ("EDV_BACKUP_DIR", "/tmp/edv/bak"),
        ("EDV_INDEX_DB", "/tmp/edv/i.db"),
        ("EDV_INDEX_KEY", "override-pass"),
        ("EDV_MASTER_KEY", "unused-here"),
    ]
    .into_iter()
    .collect();

    let mut config = Config::default();
    config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

    assert_eq!(config.paths.storage_root, PathBuf::from("/tmp/edv/docs"));
    assert_eq!(config.paths.backup_dir, PathBuf::from("/tmp/edv/bak"));
    assert_eq!(config.paths.index_db, PathBuf::from("/tmp/edv/i.db"));
    assert_eq!(config.keys.index_key, "override-pass");
    assert!(!config.features.use_dev_keys);
}

#[test]
fn test_no_overrides_leave_config_untouched() {
    let mut config = Config::default();
    config.apply_overrides(|_| None);
    assert!(config.features.use_dev_keys);
    assert_eq!(config.paths.storage_root, Config::default().paths.storage_root);
}

#[test]
fn test_config_key_provider_uses_dev_key() {
    let config = Config::default();
    let key = ConfigKeyProvider::new(&config).master_key().unwrap();
    assert_eq!(key.expose_secret().len(), 32);

    // The same dev key always decrypts what it encrypted
    let dir = tempfile::tempdir().unwrap();
    let blob = dir.path().join("x.enc");
    CipherService::new(&ConfigKeyProvider::new(&config))
        .unwrap()
        .encrypt(&b"dev data"[..], &blob)
        .unwrap();
    let plain = CipherService::new(&ConfigKeyProvider::new(&config))
        .unwrap()
        .decrypt_to_vec(&blob)
        .unwrap();
    assert_eq!(plain, b"dev data");
}

#[test]
fn test_config_key_provider_requires_dev_key_when_enabled() {
    let mut config = Config::default();
    config.keys.master_key = None;
    assert!(matches!(
        ConfigKeyProvider::new(&config).master_key(),
        Err(CoreError::Key(_))
    ));
}

#[test]
fn test_env_key_provider_reads_named_variable() {
    let var = "EDV_TEST_ENV_KEY_PROVIDER";
    env::set_var(var, hex::encode([7u8; 32]));
    let key = EnvKeyProvider::new(var).master_key().unwrap();
    assert_eq!(key.expose_secret(), &[7u8; 32]);
    env::remove_var(var);

    assert!(matches!(
        EnvKeyProvider::new("EDV_TEST_ENV_KEY_UNSET").master_key(),
        Err(CoreError::Key(_))
    ));
}
