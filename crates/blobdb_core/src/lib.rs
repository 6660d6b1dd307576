//! # BlobDB Core
//!
//! Blob file state for BlobDB's key-value separation.
//!
//! Large values are written to append-only blob log files instead of the
//! main tree. This crate provides:
//! - The blob log file format (header, records, footer)
//! - A writer and sequential and random-access readers
//! - [`BlobFile`], the per-file state shared by the appender, readers and
//!   garbage collection, with [`BlobFileControl`] as its mutation capability
//! - Reopening of finalized files and recovery of unsealed ones
//!
//! ## Example
//!
//! ```rust
//! use blobdb_core::{BlobFile, BlobFileOptions, BlobRecord, FileNumber, FileState, SequenceNumber};
//! use blobdb_storage::MemoryEnv;
//! use std::sync::Arc;
//!
//! let env = Arc::new(MemoryEnv::new());
//! let control = BlobFile::create(FileNumber::new(1), "blobs", env, BlobFileOptions::default()).unwrap();
//!
//! let offset = control
//!     .append(&BlobRecord::new(b"key".to_vec(), b"value".to_vec(), SequenceNumber::new(7)))
//!     .unwrap();
//! control.finalize().unwrap();
//!
//! let shared = control.shared();
//! assert_eq!(shared.state(), FileState::Closed);
//! let (reader, _) = shared.get_or_open_reader().unwrap();
//! assert_eq!(reader.read_record(offset).unwrap().value, b"value");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob_file;
mod config;
mod error;
pub mod format;
pub mod log;
mod types;

pub use blob_file::{BlobFile, BlobFileControl, FileState};
pub use config::BlobFileOptions;
pub use error::{CoreError, CoreResult};
pub use format::{BlobLogFooter, BlobLogHeader, BlobRecord};
pub use log::{BlobLogIterator, BlobLogWriter, RandomAccessReader};
pub use types::{
    Bounds, CompressionKind, ExpirationRange, FileNumber, SequenceNumber, SequenceRange,
    BLOB_FILE_EXTENSION,
};
