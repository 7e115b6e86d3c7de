//! Durable storage for the encrypted keystore record.
//!
//! Storage is a plain key/value surface: the keystore module decides what the
//! value is and which key it lives under.

use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub trait KeystoreStorage: Send + Sync {
    /// Value stored under `key`, or `None` if nothing has been stored yet.
    fn load(&self, key: &str) -> Result<Option<String>>;
    /// Store `value` under `key`, replacing any previous value.
    fn store(&self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per storage key inside a directory.
#[derive(Debug, Clone)]
pub struct FileKeystoreStorage {
    dir: PathBuf,
}

impl FileKeystoreStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(anyhow::anyhow!("Invalid storage key '{}'", key));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeystoreStorage for FileKeystoreStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "[storage] loaded keystore record");
                Ok(Some(content))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!("Failed to read {}: {}", path.display(), e)),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", self.dir.display(), e))?;

        // Write to a sibling temp file then rename, so a crash never leaves a half-written record.
        let tmp = path.with_extension("json.tmp");
        {
            let mut options = fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options
                .open(&tmp)
                .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", tmp.display(), e))?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)
            .map_err(|e| anyhow::anyhow!("Failed to replace {}: {}", path.display(), e))?;

        info!(path = %path.display(), "[storage] keystore record written");
        Ok(())
    }
}

/// Process-local storage, for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryKeystoreStorage {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryKeystoreStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeystoreStorage for MemoryKeystoreStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        self.records.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
