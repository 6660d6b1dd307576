//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// A blob file has exactly one append handle (created with
/// [`FileBackend::create_new`] or reopened with [`FileBackend::open_append`])
/// and any number of read handles ([`FileBackend::open_read_only`]).
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_data()` to put the bytes on disk
///
/// # Read handles on a growing file
///
/// A read handle caches the file length. When a read falls past the cached
/// length the handle re-reads the file metadata once before reporting
/// [`StorageError::ReadPastEnd`], so readers see records appended after the
/// handle was opened.
///
/// # Example
///
/// ```no_run
/// use blobdb_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::create_new(Path::new("000001.blob")).unwrap();
/// backend.append(b"blob bytes").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
    read_only: bool,
}

impl FileBackend {
    /// Creates a new file, failing if one already exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] or an I/O error.
    pub fn create_new(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| map_open_error(e, path))?;

        Ok(Self::from_file(path, file, 0, false))
    }

    /// Creates a new file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file exists.
    pub fn create_with_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::create_new(path)
    }

    /// Reopens an existing file for appending.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] or an I/O error.
    pub fn open_append(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| map_open_error(e, path))?;
        let size = file.metadata()?.len();

        Ok(Self::from_file(path, file, size, false))
    }

    /// Opens an existing file for reading only.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] or an I/O error.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let file = File::open(path).map_err(|e| map_open_error(e, path))?;
        let size = file.metadata()?.len();

        Ok(Self::from_file(path, file, size, true))
    }

    fn from_file(path: &Path, file: File, size: u64, read_only: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
            read_only,
        }
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether this handle rejects writes.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn refresh_size(&self) -> StorageResult<u64> {
        let len = self.file.read().metadata()?.len();
        let mut size = self.size.write();
        if len > *size {
            *size = len;
        }
        Ok(*size)
    }
}

fn map_open_error(err: io::Error, path: &Path) -> StorageError {
    match err.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound {
            path: path.to_path_buf(),
        },
        io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
            path: path.to_path_buf(),
        },
        _ => StorageError::Io(err),
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let end = offset.saturating_add(len as u64);
        let mut size = *self.size.read();

        if end > size && self.read_only {
            size = self.refresh_size()?;
        }
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.read_only {
            return Ok(());
        }
        self.file.write().flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        if self.read_only {
            return self.refresh_size();
        }
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let mut file = self.file.write();
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let file = self.file.write();
        let mut size = self.size.write();

        if new_size > *size {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, *size
                ),
            )));
        }

        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;

        Ok(())
    }
}
