//! Writing a stored key pair to disk.
//!
//! Files are named `<fingerprint>_pub.key` and `<fingerprint>_priv.key` and
//! created with owner-only permissions on unix. The private key is written as
//! stored unless a decryptor is configured. Keys sealed to an OpenPGP
//! recipient are always written as stored; only the recipient can open them.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::entity::encryptor::{EncryptionError, XChaChaEncryptor};
use crate::models::KeyRecord;
use crate::repository::{KeyQueries, RepositoryError};

const ARMOR_PREFIX: &str = "-----BEGIN PGP";
const SEALED_PREFIX: &str = "-----BEGIN PGP MESSAGE-----";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no key found with fingerprint ending in '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("failed to decrypt private key: {0}")]
    Decrypt(#[from] EncryptionError),

    #[error("decryption requested but no encryption key is configured")]
    MissingKey,

    #[error(
        "private key {0} is sealed to an OpenPGP recipient; export without --decrypt and open it with the recipient's key"
    )]
    RecipientSealed(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Paths of the files written by one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub fingerprint: String,
    pub public_key: PathBuf,
    pub private_key: PathBuf,
}

#[derive(Debug)]
pub struct Exporter {
    output_dir: PathBuf,
    decryptor: Option<XChaChaEncryptor>,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            decryptor: None,
        }
    }

    /// Decrypt stored private keys before writing them. Keys that were
    /// stored unencrypted are written unchanged.
    pub fn with_decryptor(mut self, decryptor: XChaChaEncryptor) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Look up the key by fingerprint suffix and write both halves.
    pub fn export(
        &self,
        queries: &mut dyn KeyQueries,
        suffix: &str,
    ) -> Result<ExportedFiles, ExportError> {
        let record = queries
            .by_fingerprint_suffix(suffix)?
            .ok_or_else(|| ExportError::NotFound(suffix.trim().to_string()))?;
        self.write(&record)
    }

    pub fn write(&self, record: &KeyRecord) -> Result<ExportedFiles, ExportError> {
        let private_key = self.private_key_text(record)?;

        fs::create_dir_all(&self.output_dir).map_err(|e| ExportError::Write {
            path: self.output_dir.clone(),
            source: e,
        })?;
        let public_path = self.output_dir.join(format!("{}_pub.key", record.fingerprint));
        let private_path = self.output_dir.join(format!("{}_priv.key", record.fingerprint));
        write_private(&public_path, &record.public_key)?;
        write_private(&private_path, &private_key)?;

        tracing::info!(
            fingerprint = %record.fingerprint,
            dir = %self.output_dir.display(),
            "exported key pair"
        );
        Ok(ExportedFiles {
            fingerprint: record.fingerprint.clone(),
            public_key: public_path,
            private_key: private_path,
        })
    }

    fn private_key_text(&self, record: &KeyRecord) -> Result<String, ExportError> {
        match &self.decryptor {
            Some(_) if record.private_key.starts_with(SEALED_PREFIX) => {
                Err(ExportError::RecipientSealed(record.fingerprint.clone()))
            }
            Some(decryptor) if !record.private_key.starts_with(ARMOR_PREFIX) => {
                Ok(decryptor.decrypt(&record.private_key)?)
            }
            _ => Ok(record.private_key.clone()),
        }
    }
}

/// Build the decryptor for `export --decrypt` from the configured hex key.
pub fn decryptor(key_hex: Option<&str>) -> Result<XChaChaEncryptor, ExportError> {
    let key_hex = key_hex.ok_or(ExportError::MissingKey)?;
    Ok(XChaChaEncryptor::from_hex(key_hex)?)
}

fn write_private(path: &Path, contents: &str) -> Result<(), ExportError> {
    let write = || -> std::io::Result<()> {
        let mut file = open_owner_only(path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    };
    write().map_err(|e| ExportError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(unix)]
fn open_owner_only(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_owner_only(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
