//! Sequential blob log writer.

use crate::error::{CoreError, CoreResult};
use crate::format::{BlobLogFooter, BlobLogHeader, BlobRecord};
use blobdb_storage::StorageBackend;

/// Append-only writer for one blob file.
///
/// The writer is owned by exactly one blob file while it accepts appends and
/// is dropped once the footer is durable. Each record is handed to the
/// backend in a single `append` call.
pub struct BlobLogWriter {
    backend: Box<dyn StorageBackend>,
}

impl BlobLogWriter {
    /// Wraps a backend positioned at the end of the file.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Writes the file header. The file must be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already has content or the write fails.
    pub fn write_header(&mut self, header: &BlobLogHeader) -> CoreResult<()> {
        let size = self.backend.size()?;
        if size != 0 {
            return Err(CoreError::corrupt_header(format!(
                "header must start the file, file already holds {size} bytes"
            )));
        }
        self.backend.append(&header.encode())?;
        Ok(())
    }

    /// Appends a record.
    ///
    /// Returns the offset and encoded length of the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    pub fn append_record(&mut self, record: &BlobRecord) -> CoreResult<(u64, u64)> {
        let encoded = record.encode()?;
        let offset = self.backend.append(&encoded)?;
        Ok((offset, encoded.len() as u64))
    }

    /// Writes the footer and syncs the file if `sync` is set.
    ///
    /// Returns the footer's offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or sync fails.
    pub fn write_footer(&mut self, footer: &BlobLogFooter, sync: bool) -> CoreResult<u64> {
        let offset = self.backend.append(&footer.encode())?;
        if sync {
            self.backend.sync()?;
        } else {
            self.backend.flush()?;
        }
        Ok(offset)
    }

    /// Pushes buffered writes to the OS.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        Ok(())
    }

    /// Syncs written data to stable storage.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    /// Returns the number of bytes written, header included.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Drops everything after `offset`.
    pub(crate) fn truncate(&mut self, offset: u64) -> CoreResult<()> {
        self.backend.truncate(offset)?;
        Ok(())
    }
}

impl std::fmt::Debug for BlobLogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobLogWriter")
            .field("size", &self.backend.size().ok())
            .finish_non_exhaustive()
    }
}
