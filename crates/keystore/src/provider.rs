//! Sources of the 32-byte secret key.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use codec::{SecretKey, KEY_LEN};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::error::KeyStoreError;

/// Something that can hand out the current secret key.
///
/// Called once when a [`CodecService`](crate::CodecService) is built and again
/// on every reload.
#[cfg_attr(test, mockall::automock)]
pub trait KeyProvider: Send + Sync {
    fn load_key(&self) -> Result<SecretKey, KeyStoreError>;
}

/// Always returns the same key.
#[derive(Clone, Debug)]
pub struct StaticKeyProvider {
    key: SecretKey,
}

impl StaticKeyProvider {
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn load_key(&self) -> Result<SecretKey, KeyStoreError> {
        Ok(self.key.clone())
    }
}

/// Raw 32-byte key stored in a file, created on first use.
///
/// Lookup order:
/// 1. `path`, if present;
/// 2. `legacy_path`, if configured and present: copied to `path`, then removed;
/// 3. otherwise a fresh key is generated and written to `path`.
///
/// A file of the wrong length is an error. It is never overwritten, because
/// every token sealed under the old key would become unreadable.
#[derive(Clone, Debug)]
pub struct FileKeyProvider {
    path: PathBuf,
    legacy_path: Option<PathBuf>,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            legacy_path: None,
        }
    }

    /// Migrate a key from `legacy` when `path` does not exist yet.
    pub fn with_legacy_path(mut self, legacy: impl Into<PathBuf>) -> Self {
        self.legacy_path = Some(legacy.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn migrate_legacy(&self) -> Result<Option<SecretKey>, KeyStoreError> {
        let Some(legacy) = &self.legacy_path else {
            return Ok(None);
        };
        let Some(key) = read_key_file(legacy)? else {
            return Ok(None);
        };
        let key = write_key_file(&self.path, key)?;
        if let Err(e) = fs::remove_file(legacy) {
            warn!(path = %legacy.display(), error = %e, "failed to remove legacy key file");
        }
        info!(
            from = %legacy.display(),
            to = %self.path.display(),
            "migrated legacy key file"
        );
        Ok(Some(key))
    }
}

impl KeyProvider for FileKeyProvider {
    fn load_key(&self) -> Result<SecretKey, KeyStoreError> {
        if let Some(key) = read_key_file(&self.path)? {
            return Ok(key);
        }
        if let Some(key) = self.migrate_legacy()? {
            return Ok(key);
        }
        let key = write_key_file(&self.path, SecretKey::generate()?)?;
        info!(path = %self.path.display(), "generated new key file");
        Ok(key)
    }
}

/// `Ok(None)` if the file does not exist.
fn read_key_file(path: &Path) -> Result<Option<SecretKey>, KeyStoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => Zeroizing::new(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(KeyStoreError::io(path, e)),
    };
    if bytes.len() != KEY_LEN {
        return Err(KeyStoreError::InvalidKeyLength {
            path: path.to_path_buf(),
            actual: bytes.len(),
        });
    }
    Ok(Some(SecretKey::from_slice(&bytes)?))
}

/// Create `path` holding `key`. If another writer got there first, their key wins.
fn write_key_file(path: &Path, key: SecretKey) -> Result<SecretKey, KeyStoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| KeyStoreError::io(parent, e))?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return read_key_file(path)?.ok_or_else(|| KeyStoreError::io(path, e));
        }
        Err(e) => return Err(KeyStoreError::io(path, e)),
    };
    let written = file.write_all(key.as_bytes()).and_then(|()| file.sync_all());
    drop(file);
    discard_on_error(path, written)?;
    Ok(key)
}

/// Remove a partially written key file so the next load starts clean.
fn discard_on_error(path: &Path, written: std::io::Result<()>) -> Result<(), KeyStoreError> {
    let Err(e) = written else {
        return Ok(());
    };
    if let Err(rm) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %rm, "failed to remove partial key file");
    }
    Err(KeyStoreError::io(path, e))
}
