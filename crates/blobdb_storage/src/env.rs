//! Path-addressed factories for storage backends.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::file::FileBackend;
use crate::memory::InMemoryBackend;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Creates and opens backends by path.
///
/// A blob file is created once for appending, may be reopened for appending
/// during recovery, and is opened any number of times for reading.
pub trait StorageEnv: Send + Sync {
    /// Creates a new, empty file. Fails if the path already exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] or an I/O error.
    fn create(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>>;

    /// Reopens an existing file for appending at its end.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] or an I/O error.
    fn open_append(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>>;

    /// Opens an existing file for reading.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] or an I/O error.
    fn open_readable(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>>;

    /// Returns whether a file exists at the path.
    fn exists(&self, path: &Path) -> bool;
}

/// Operating-system file environment backed by [`FileBackend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEnv;

impl OsEnv {
    /// Creates the OS environment.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StorageEnv for OsEnv {
    fn create(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>> {
        Ok(Box::new(FileBackend::create_with_dirs(path)?))
    }

    fn open_append(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>> {
        Ok(Box::new(FileBackend::open_append(path)?))
    }

    fn open_readable(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>> {
        Ok(Box::new(FileBackend::open_read_only(path)?))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// In-memory environment; every handle to a path shares one buffer.
#[derive(Debug, Default)]
pub struct MemoryEnv {
    files: Mutex<HashMap<PathBuf, InMemoryBackend>>,
}

impl MemoryEnv {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs raw bytes at `path`, replacing any existing file.
    pub fn insert(&self, path: &Path, data: Vec<u8>) {
        self.files
            .lock()
            .insert(path.to_path_buf(), InMemoryBackend::with_data(data));
    }

    /// Returns a copy of the bytes stored at `path`.
    #[must_use]
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().get(path).map(InMemoryBackend::data)
    }

    /// Overwrites bytes of an existing file in place.
    ///
    /// Returns `false` if no file exists at `path`.
    pub fn corrupt(&self, path: &Path, offset: usize, bytes: &[u8]) -> bool {
        match self.files.lock().get(path) {
            Some(file) => {
                file.overwrite(offset, bytes);
                true
            }
            None => false,
        }
    }

    fn lookup(&self, path: &Path) -> StorageResult<InMemoryBackend> {
        self.files
            .lock()
            .get(path)
            .map(InMemoryBackend::append_handle)
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_path_buf(),
            })
    }
}

impl StorageEnv for MemoryEnv {
    fn create(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>> {
        let mut files = self.files.lock();
        if files.contains_key(path) {
            return Err(StorageError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        let backend = InMemoryBackend::new();
        let handle = backend.append_handle();
        files.insert(path.to_path_buf(), backend);
        Ok(Box::new(handle))
    }

    fn open_append(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>> {
        Ok(Box::new(self.lookup(path)?))
    }

    fn open_readable(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>> {
        Ok(Box::new(self.lookup(path)?.read_handle()))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_env_handles_share_bytes() {
        let env = MemoryEnv::new();
        let path = Path::new("blobs/000001.blob");

        let mut writer = env.create(path).unwrap();
        let reader = env.open_readable(path).unwrap();
        writer.append(b"payload").unwrap();

        assert_eq!(reader.read_at(0, 7).unwrap(), b"payload");
        assert_eq!(env.contents(path).unwrap(), b"payload");
    }

    #[test]
    fn memory_env_create_twice_fails() {
        let env = MemoryEnv::new();
        let path = Path::new("000001.blob");

        env.create(path).unwrap();
        assert!(matches!(
            env.create(path),
            Err(StorageError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn memory_env_missing_file() {
        let env = MemoryEnv::new();
        let path = Path::new("000009.blob");

        assert!(!env.exists(path));
        assert!(matches!(
            env.open_readable(path),
            Err(StorageError::NotFound { .. })
        ));
        assert!(!env.corrupt(path, 0, b"x"));
    }

    #[test]
    fn memory_env_corrupt_rewrites_in_place() {
        let env = MemoryEnv::new();
        let path = Path::new("000001.blob");
        env.insert(path, b"abcdef".to_vec());

        assert!(env.corrupt(path, 1, b"ZZ"));
        assert_eq!(env.contents(path).unwrap(), b"aZZdef");
    }

    #[test]
    fn os_env_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob_dir").join("000001.blob");
        let env = OsEnv::new();

        {
            let mut writer = env.create(&path).unwrap();
            writer.append(b"on disk").unwrap();
            writer.sync().unwrap();
        }
        assert!(env.exists(&path));

        let reader = env.open_readable(&path).unwrap();
        assert_eq!(reader.read_at(3, 4).unwrap(), b"disk");

        let mut appender = env.open_append(&path).unwrap();
        assert_eq!(appender.append(b"!").unwrap(), 7);
    }
}
