//! Random-access reader used by point lookups.

use crate::error::{CoreError, CoreResult};
use crate::format::{
    BlobLogFooter, BlobLogHeader, BlobRecord, RecordHeader, FOOTER_SIZE, HEADER_SIZE,
    RECORD_HEADER_SIZE,
};
use crate::types::FileNumber;
use blobdb_storage::StorageBackend;

/// Shared, read-only handle onto one blob file.
///
/// All methods take `&self`; a single handle is cached by the blob file and
/// used concurrently by every reader thread.
pub struct RandomAccessReader {
    file_number: FileNumber,
    backend: Box<dyn StorageBackend>,
}

impl RandomAccessReader {
    /// Wraps a read-only backend.
    pub fn new(file_number: FileNumber, backend: Box<dyn StorageBackend>) -> Self {
        Self {
            file_number,
            backend,
        }
    }

    /// Returns the file this reader belongs to.
    pub fn file_number(&self) -> FileNumber {
        self.file_number
    }

    /// Returns the current file size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Reads and validates the header.
    pub fn read_header(&self) -> CoreResult<BlobLogHeader> {
        let size = self.size()?;
        if size < HEADER_SIZE as u64 {
            return Err(CoreError::corrupt_header(format!(
                "file holds {size} bytes, header needs {HEADER_SIZE}"
            )));
        }
        BlobLogHeader::decode(&self.backend.read_at(0, HEADER_SIZE)?)
    }

    /// Reads and validates the footer at the end of the file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptFooter`] if the file is too short to hold
    /// one or the footer does not validate.
    pub fn read_footer(&self) -> CoreResult<BlobLogFooter> {
        let size = self.size()?;
        if size < (HEADER_SIZE + FOOTER_SIZE) as u64 {
            return Err(CoreError::corrupt_footer(format!(
                "file holds {size} bytes, too short for a footer"
            )));
        }
        let bytes = self.backend.read_at(size - FOOTER_SIZE as u64, FOOTER_SIZE)?;
        BlobLogFooter::decode(&bytes)
    }

    /// Reads the record stored at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptRecord`] if the offset does not start a
    /// complete record, [`CoreError::ChecksumMismatch`] if the body fails
    /// its checksum, or an I/O error.
    pub fn read_record(&self, offset: u64) -> CoreResult<BlobRecord> {
        if offset < HEADER_SIZE as u64 {
            return Err(CoreError::corrupt_record(offset, "offset inside file header"));
        }
        let size = self.size()?;
        offset
            .checked_add(RECORD_HEADER_SIZE as u64)
            .filter(|end| *end <= size)
            .ok_or_else(|| CoreError::corrupt_record(offset, "offset beyond end of file"))?;

        let header_bytes = self.backend.read_at(offset, RECORD_HEADER_SIZE)?;
        let header = RecordHeader::decode(&header_bytes, offset)?;

        let record_len = header.record_len();
        offset
            .checked_add(record_len as u64)
            .filter(|end| *end <= size)
            .ok_or_else(|| {
                CoreError::corrupt_record(offset, "record extends beyond end of file")
            })?;

        let data = self.backend.read_at(offset, record_len)?;
        BlobRecord::decode_body(header, &data, offset)
    }
}

impl std::fmt::Debug for RandomAccessReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomAccessReader")
            .field("file_number", &self.file_number)
            .finish_non_exhaustive()
    }
}
