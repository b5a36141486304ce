//! Key-value store adapters.

use crate::domain::KVStoreError;
use crate::ports::KeyValueStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// In-memory key-value store.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKVStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.read().contains_key(key))
    }
}

/// File-backed key-value store.
///
/// The whole map is rewritten on every mutation: the temp file is synced
/// before the rename and the directory after it, so a crash leaves either
/// the old or the new contents on disk.
pub struct FileBackedKVStore {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    path: PathBuf,
}

impl FileBackedKVStore {
    /// Open the store at `path`, loading existing contents.
    ///
    /// # Errors
    ///
    /// Returns `CorruptionError` if an existing file cannot be decoded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => bincode::deserialize(&bytes).map_err(|e| KVStoreError::CorruptionError {
                message: format!("{}: {}", path.display(), e),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(KVStoreError::IOError {
                    message: e.to_string(),
                })
            }
        };

        tracing::info!(path = %path.display(), keys = data.len(), "Opened file-backed store");

        Ok(Self {
            data: RwLock::new(data),
            path,
        })
    }

    fn save(&self, data: &HashMap<Vec<u8>, Vec<u8>>) -> Result<(), KVStoreError> {
        let io_err = |e: std::io::Error| KVStoreError::IOError {
            message: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let bytes = bincode::serialize(data).map_err(|e| KVStoreError::IOError {
            message: e.to_string(),
        })?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = File::create(&temp_path).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        std::fs::rename(&temp_path, &self.path).map_err(io_err)?;
        sync_parent_dir(&self.path).map_err(io_err)?;
        Ok(())
    }

    fn mutate(
        &self,
        apply: impl FnOnce(&mut HashMap<Vec<u8>, Vec<u8>>),
    ) -> Result<(), KVStoreError> {
        let mut data = self.data.write();
        let mut next = data.clone();
        apply(&mut next);
        self.save(&next)?;
        *data = next;
        Ok(())
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.mutate(|data| {
            data.insert(key.to_vec(), value.to_vec());
        })
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.mutate(|data| {
            data.remove(key);
        })
    }
}
