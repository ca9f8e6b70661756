// src/config/defaults.rs
use std::path::PathBuf;

use crate::config::app::{Features, Keys, Paths};

pub const DEFAULT_CONFIG_FILE: &str = "edv-config.toml";

pub const DEFAULT_INDEX_KEY: &str = "dev-index-password-2025";

/// Development-only content key (hex). Never used unless `use_dev_keys = true`.
pub const DEFAULT_DEV_MASTER_KEY: &str =
    "6465762d6d61737465722d6b65792d323032352d656e637279707465642d6476";

const APP_DIR: &str = "encrypted-doc-vault";

fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn default_paths() -> Paths {
    let root = data_root();
    Paths {
        storage_root: root.join("documents"),
        backup_dir: root.join("backups"),
        index_db: root.join("index.db"),
    }
}

pub fn default_keys() -> Keys {
    Keys {
        master_key: Some(DEFAULT_DEV_MASTER_KEY.into()),
        index_key: DEFAULT_INDEX_KEY.into(),
    }
}

pub fn default_features() -> Features {
    Features { use_dev_keys: true }
}
