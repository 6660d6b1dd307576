//! Blob file header.

use crate::error::{CoreError, CoreResult};
use crate::format::crc::compute_crc32;
use crate::format::read_u32;
use crate::types::CompressionKind;

/// Magic bytes at the start of every blob file.
pub const HEADER_MAGIC: [u8; 4] = *b"BLOB";

/// Current blob format version.
pub const BLOB_FORMAT_VERSION: u16 = 1;

/// Encoded header size in bytes.
pub const HEADER_SIZE: usize = 16;

/// Header written once when a blob file is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobLogHeader {
    /// Format version.
    pub version: u16,
    /// Column family the file belongs to.
    pub column_family_id: u32,
    /// Compression applied to every record.
    pub compression: CompressionKind,
    /// Whether every record carries an expiration.
    pub has_ttl: bool,
}

impl BlobLogHeader {
    /// Creates a header for the current format version.
    #[must_use]
    pub const fn new(column_family_id: u32, compression: CompressionKind, has_ttl: bool) -> Self {
        Self {
            version: BLOB_FORMAT_VERSION,
            column_family_id,
            compression,
            has_ttl,
        }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&HEADER_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..10].copy_from_slice(&self.column_family_id.to_le_bytes());
        buf[10] = self.compression.as_byte();
        buf[11] = u8::from(self.has_ttl);
        let crc = compute_crc32(&buf[..12]);
        buf[12..16].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes and validates a header.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptHeader`] on short input, bad magic, an
    /// unsupported version, an unknown compression tag or a bad flag byte,
    /// and [`CoreError::ChecksumMismatch`] if the checksum fails.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(CoreError::corrupt_header(format!(
                "header too short: {} bytes",
                data.len()
            )));
        }
        let buf = &data[..HEADER_SIZE];

        if buf[0..4] != HEADER_MAGIC {
            return Err(CoreError::corrupt_header("invalid magic"));
        }

        let expected = read_u32(buf, 12);
        let actual = compute_crc32(&buf[..12]);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version == 0 || version > BLOB_FORMAT_VERSION {
            return Err(CoreError::corrupt_header(format!(
                "unsupported version {version}"
            )));
        }

        let compression = CompressionKind::from_byte(buf[10]).ok_or_else(|| {
            CoreError::corrupt_header(format!("unknown compression tag {}", buf[10]))
        })?;
        let has_ttl = match buf[11] {
            0 => false,
            1 => true,
            other => {
                return Err(CoreError::corrupt_header(format!(
                    "invalid has_ttl byte {other}"
                )))
            }
        };

        Ok(Self {
            version,
            column_family_id: read_u32(buf, 6),
            compression,
            has_ttl,
        })
    }
}
