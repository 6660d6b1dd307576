//! Blob log file format.
//!
//! A blob file is a header, a run of records, and (once finalized) a footer:
//!
//! ```text
//! | header (16) | record | record | ... | footer (50) |
//! ```
//!
//! ## Header
//!
//! ```text
//! | magic "BLOB" (4) | version (2) | column_family (4) | compression (1) | has_ttl (1) | crc (4) |
//! ```
//!
//! ## Record
//!
//! ```text
//! | key_len (4) | value_len (4) | flags (1) | expiration (8) | sequence (8) | header_crc (4) |
//! | key | value | body_crc (4) |
//! ```
//!
//! Flags:
//! - `0x01` = record carries an expiration
//!
//! ## Footer
//!
//! ```text
//! | magic "BFTR" (4) | blob_count (8) | seq_min (8) | seq_max (8) | exp_min (8) | exp_max (8) |
//! | compression (1) | has_ttl (1) | crc (4) |
//! ```
//!
//! All integers are little-endian and all checksums are CRC32 (IEEE).

mod crc;
mod footer;
mod header;
mod record;

pub use crc::compute_crc32;
pub use footer::{BlobLogFooter, FOOTER_MAGIC, FOOTER_SIZE};
pub use header::{BlobLogHeader, BLOB_FORMAT_VERSION, HEADER_MAGIC, HEADER_SIZE};
pub use record::{BlobRecord, RECORD_HEADER_SIZE, RECORD_TRAILER_SIZE};
pub(crate) use record::RecordHeader;

pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}
