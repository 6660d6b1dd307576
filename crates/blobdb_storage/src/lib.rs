//! # BlobDB Storage
//!
//! Byte-store backends used by BlobDB blob log files.
//!
//! Backends are **opaque byte stores**: they append, read at an offset,
//! flush and sync. They know nothing about blob headers, records or
//! footers; `blobdb_core` owns the file format.
//!
//! A [`StorageEnv`] maps paths to backends so that the blob file layer can
//! create a file for appending and later open independent read handles to
//! the same bytes.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing; handles can share one buffer
//! - [`FileBackend`] - Persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use blobdb_storage::{MemoryEnv, StorageBackend, StorageEnv};
//! use std::path::Path;
//!
//! let env = MemoryEnv::new();
//! let mut writer = env.create(Path::new("blobs/000001.blob")).unwrap();
//! writer.append(b"hello world").unwrap();
//!
//! let reader = env.open_readable(Path::new("blobs/000001.blob")).unwrap();
//! assert_eq!(reader.read_at(6, 5).unwrap(), b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod env;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use env::{MemoryEnv, OsEnv, StorageEnv};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
