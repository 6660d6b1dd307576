//! Blob file footer.

use crate::error::{CoreError, CoreResult};
use crate::format::crc::compute_crc32;
use crate::format::{read_u32, read_u64};
use crate::types::{CompressionKind, ExpirationRange, SequenceNumber, SequenceRange};

/// Magic bytes at the start of the footer.
pub const FOOTER_MAGIC: [u8; 4] = *b"BFTR";

/// Encoded footer size in bytes.
pub const FOOTER_SIZE: usize = 50;

/// Summary written once when a blob file is finalized.
///
/// Empty ranges are stored as `(u64::MAX, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobLogFooter {
    /// Number of records in the file.
    pub blob_count: u64,
    /// Sequence numbers of all records.
    pub sequence_range: SequenceRange,
    /// Expirations of all records (empty for non-TTL files).
    pub expiration_range: ExpirationRange,
    /// Compression applied to every record.
    pub compression: CompressionKind,
    /// Whether every record carries an expiration.
    pub has_ttl: bool,
}

impl BlobLogFooter {
    /// Encodes the footer.
    #[must_use]
    pub fn encode(&self) -> [u8; FOOTER_SIZE] {
        let (seq_min, seq_max) = self
            .sequence_range
            .as_pair()
            .map_or((u64::MAX, 0), |(min, max)| (min.as_u64(), max.as_u64()));
        let (exp_min, exp_max) = self.expiration_range.as_pair().unwrap_or((u64::MAX, 0));

        let mut buf = [0u8; FOOTER_SIZE];
        buf[0..4].copy_from_slice(&FOOTER_MAGIC);
        buf[4..12].copy_from_slice(&self.blob_count.to_le_bytes());
        buf[12..20].copy_from_slice(&seq_min.to_le_bytes());
        buf[20..28].copy_from_slice(&seq_max.to_le_bytes());
        buf[28..36].copy_from_slice(&exp_min.to_le_bytes());
        buf[36..44].copy_from_slice(&exp_max.to_le_bytes());
        buf[44] = self.compression.as_byte();
        buf[45] = u8::from(self.has_ttl);
        let crc = compute_crc32(&buf[..46]);
        buf[46..50].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes and validates a footer.
    ///
    /// Every failure is reported as [`CoreError::CorruptFooter`] so that a
    /// file with an unreadable footer is never mistaken for a finalized one.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptFooter`] on short input, bad magic, a
    /// checksum mismatch or invalid field values.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < FOOTER_SIZE {
            return Err(CoreError::corrupt_footer(format!(
                "footer too short: {} bytes",
                data.len()
            )));
        }
        let buf = &data[..FOOTER_SIZE];

        if buf[0..4] != FOOTER_MAGIC {
            return Err(CoreError::corrupt_footer("invalid magic"));
        }

        let expected = read_u32(buf, 46);
        let actual = compute_crc32(&buf[..46]);
        if expected != actual {
            return Err(CoreError::corrupt_footer(format!(
                "checksum mismatch: expected {expected:08x}, got {actual:08x}"
            )));
        }

        let compression = CompressionKind::from_byte(buf[44]).ok_or_else(|| {
            CoreError::corrupt_footer(format!("unknown compression tag {}", buf[44]))
        })?;
        let has_ttl = match buf[45] {
            0 => false,
            1 => true,
            other => {
                return Err(CoreError::corrupt_footer(format!(
                    "invalid has_ttl byte {other}"
                )))
            }
        };

        let blob_count = read_u64(buf, 4);
        let sequence_range = SequenceRange::new(
            SequenceNumber::new(read_u64(buf, 12)),
            SequenceNumber::new(read_u64(buf, 20)),
        );
        let expiration_range = ExpirationRange::new(read_u64(buf, 28), read_u64(buf, 36));

        if (blob_count == 0) != sequence_range.is_empty() {
            return Err(CoreError::corrupt_footer(format!(
                "blob count {blob_count} disagrees with sequence range {sequence_range}"
            )));
        }

        Ok(Self {
            blob_count,
            sequence_range,
            expiration_range,
            compression,
            has_ttl,
        })
    }
}
