//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory storage backend.
///
/// Handles created with [`InMemoryBackend::read_handle`] share the same
/// buffer, which lets tests observe a blob file through a reader while a
/// writer is still appending to it.
///
/// # Example
///
/// ```rust
/// use blobdb_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let reader = backend.read_handle();
/// backend.append(b"test data").unwrap();
/// assert_eq!(reader.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
    read_only: bool,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            read_only: false,
        }
    }

    /// Returns a read-only handle onto the same buffer.
    #[must_use]
    pub fn read_handle(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            read_only: true,
        }
    }

    /// Returns a writable handle onto the same buffer.
    #[must_use]
    pub fn append_handle(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            read_only: false,
        }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Overwrites bytes in place, bypassing the append-only contract.
    ///
    /// Only meant for corrupting files in tests.
    pub fn overwrite(&self, offset: usize, bytes: &[u8]) {
        let mut data = self.data.write();
        let end = (offset + bytes.len()).min(data.len());
        if offset < end {
            data[offset..end].copy_from_slice(&bytes[..end - offset]);
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let offset_usize = offset as usize;
        let end = offset_usize.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset_usize..end].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let mut data = self.data.write();
        let current_size = data.len() as u64;

        if new_size > current_size {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, current_size
                ),
            )));
        }

        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(backend.data().is_empty());
    }

    #[test]
    fn memory_append_returns_correct_offset() {
        let mut backend = InMemoryBackend::new();

        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.size().unwrap(), 11);
    }

    #[test]
    fn memory_read_at_past_end_fails() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello").unwrap();

        let result = backend.read_at(3, 10);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn read_handle_shares_buffer() {
        let mut writer = InMemoryBackend::new();
        let reader = writer.read_handle();

        writer.append(b"abc").unwrap();
        assert_eq!(reader.read_at(0, 3).unwrap(), b"abc");
    }

    #[test]
    fn read_handle_rejects_writes() {
        let backend = InMemoryBackend::new();
        let mut reader = backend.read_handle();

        assert!(matches!(reader.append(b"x"), Err(StorageError::ReadOnly)));
        assert!(matches!(reader.sync(), Err(StorageError::ReadOnly)));
        assert!(matches!(reader.truncate(0), Err(StorageError::ReadOnly)));
    }

    #[test]
    fn overwrite_stays_inside_buffer() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());
        backend.overwrite(3, b"XYZ");
        assert_eq!(backend.data(), b"helXY");
    }

    #[test]
    fn memory_truncate_partial() {
        let mut backend = InMemoryBackend::new();
        backend.append(b"hello world").unwrap();

        backend.truncate(5).unwrap();
        assert_eq!(backend.read_at(0, 5).unwrap(), b"hello");
        assert!(backend.truncate(100).is_err());
    }

    proptest! {
        #[test]
        fn appended_chunks_read_back_at_their_offsets(
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..16)
        ) {
            let mut backend = InMemoryBackend::new();
            let offsets: Vec<u64> = chunks
                .iter()
                .map(|c| backend.append(c).unwrap())
                .collect();

            for (chunk, offset) in chunks.iter().zip(offsets) {
                prop_assert_eq!(&backend.read_at(offset, chunk.len()).unwrap(), chunk);
            }
        }
    }
}
