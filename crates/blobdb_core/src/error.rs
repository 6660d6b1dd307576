//! Error types for BlobDB core.

use crate::types::FileNumber;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in blob file operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] blobdb_storage::StorageError),

    /// Operation attempted in a lifecycle phase that does not allow it.
    ///
    /// Raised for appends after finalization, a second finalization, or
    /// marking a file obsolete before it is finalized. The caller has broken
    /// the blob file contract.
    #[error("invalid state for {file}: {message}")]
    InvalidState {
        /// The file the operation targeted.
        file: FileNumber,
        /// Description of the violation.
        message: String,
    },

    /// A record's expiration did not match the file's TTL setting.
    #[error("TTL mismatch for {file}: file has_ttl={has_ttl}")]
    TtlMismatch {
        /// The file the record was appended to.
        file: FileNumber,
        /// Whether the file carries expirations.
        has_ttl: bool,
    },

    /// The file header is missing or invalid.
    #[error("corrupt blob header: {message}")]
    CorruptHeader {
        /// Description of the corruption.
        message: String,
    },

    /// The file footer is missing or invalid.
    #[error("corrupt blob footer: {message}")]
    CorruptFooter {
        /// Description of the corruption.
        message: String,
    },

    /// A blob record is invalid.
    #[error("corrupt blob record at offset {offset}: {message}")]
    CorruptRecord {
        /// Offset of the record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },
}

impl CoreError {
    /// Creates an invalid state error.
    pub fn invalid_state(file: FileNumber, message: impl Into<String>) -> Self {
        Self::InvalidState {
            file,
            message: message.into(),
        }
    }

    /// Creates a corrupt header error.
    pub fn corrupt_header(message: impl Into<String>) -> Self {
        Self::CorruptHeader {
            message: message.into(),
        }
    }

    /// Creates a corrupt footer error.
    pub fn corrupt_footer(message: impl Into<String>) -> Self {
        Self::CorruptFooter {
            message: message.into(),
        }
    }

    /// Creates a corrupt record error.
    pub fn corrupt_record(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            offset,
            message: message.into(),
        }
    }

    /// Returns whether this is a recoverable I/O failure.
    ///
    /// Lifecycle flags are left untouched when an operation fails this way,
    /// so the caller may retry.
    #[must_use]
    pub fn is_io_failure(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns whether this error reports on-disk corruption.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptHeader { .. }
                | Self::CorruptFooter { .. }
                | Self::CorruptRecord { .. }
                | Self::ChecksumMismatch { .. }
        )
    }

    /// Returns whether this is a lifecycle contract violation.
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::TtlMismatch { .. })
    }
}
