// src/bin/edv.rs
//! `edv`: encrypt, decrypt and back up vault blobs from the shell
//!
//! ```text
//! edv encrypt <input> <blob>
//! edv decrypt <blob> <output>
//! edv backup [target_dir]
//! edv restore <archive> [target_dir]
//! edv list-backups [dir]
//! ```

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use encrypted_doc_vault::crypto::{parse_master_key, MASTER_KEY_ENV};
use encrypted_doc_vault::{load_config, ArchiveService, CipherService};
use rpassword::prompt_password;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: edv <encrypt|decrypt|backup|restore|list-backups> [args...]";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!(USAGE);
    };

    match (command.as_str(), rest) {
        ("encrypt", [input, output]) => {
            let cipher = cipher_from_env_or_prompt()?;
            let outcome = cipher
                .encrypt_file(Path::new(input), Path::new(output))
                .with_context(|| format!("failed to encrypt {input}"))?;
            info!(
                blob = %outcome.dest_path.display(),
                bytes = outcome.plaintext_len,
                blake3 = %outcome.content_hash,
                "encrypted"
            );
        }
        ("decrypt", [blob, output]) => {
            let cipher = cipher_from_env_or_prompt()?;
            let out = cipher
                .decrypt(Path::new(blob), Path::new(output), None)
                .with_context(|| format!("failed to decrypt {blob}"))?;
            info!(output = %out.display(), "decrypted");
        }
        ("backup", rest) if rest.len() <= 1 => {
            let config = load_config().context("failed to load config")?;
            let target = rest
                .first()
                .map(PathBuf::from)
                .unwrap_or_else(|| config.paths.backup_dir.clone());
            let archive = ArchiveService::new(&config.paths.storage_root)
                .create_backup(None, &target)
                .context("backup failed")?;
            println!("{}", archive.display());
        }
        ("restore", [archive, rest @ ..]) if rest.len() <= 1 => {
            let config = load_config().context("failed to load config")?;
            let service = ArchiveService::new(&config.paths.storage_root);
            let target = rest
                .first()
                .map(PathBuf::from)
                .unwrap_or_else(|| service.entry_base().to_path_buf());
            let restored = service
                .restore_backup(Path::new(archive), &target)
                .with_context(|| format!("failed to restore {archive}"))?;
            for path in restored {
                println!("{}", path.display());
            }
        }
        ("list-backups", rest) if rest.len() <= 1 => {
            let dir = match rest.first() {
                Some(dir) => PathBuf::from(dir),
                None => load_config()
                    .context("failed to load config")?
                    .paths
                    .backup_dir
                    .clone(),
            };
            for backup in ArchiveService::list_backups(&dir)? {
                println!(
                    "{}\t{}\t{}",
                    backup.created_at.to_rfc3339(),
                    backup.size,
                    backup.path.display()
                );
            }
        }
        _ => bail!(USAGE),
    }

    Ok(())
}

fn cipher_from_env_or_prompt() -> Result<CipherService> {
    let encoded = match env::var(MASTER_KEY_ENV) {
        Ok(value) => value,
        Err(_) => prompt_password("Master key (hex or base64): ")
            .context("failed to read master key")?,
    };
    Ok(CipherService::from_key(parse_master_key(&encoded)?))
}
