//! Blob record encoding.

use crate::error::{CoreError, CoreResult};
use crate::format::crc::{compute_crc32, crc32_extend};
use crate::format::{read_u32, read_u64};
use crate::types::SequenceNumber;

/// Record header size:
/// key_len (4) + value_len (4) + flags (1) + expiration (8) + sequence (8) + header_crc (4) = 29
pub const RECORD_HEADER_SIZE: usize = 29;

/// Trailing body checksum size.
pub const RECORD_TRAILER_SIZE: usize = 4;

const FLAG_HAS_EXPIRATION: u8 = 0x01;

/// One key/value pair stored in a blob file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    /// User key.
    pub key: Vec<u8>,
    /// Value bytes, already compressed with the file's compression kind.
    pub value: Vec<u8>,
    /// Expiration timestamp, present exactly when the file has TTL.
    pub expiration: Option<u64>,
    /// Sequence number of the write.
    pub sequence: SequenceNumber,
}

/// Decoded fixed-size part of a record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordHeader {
    pub key_len: usize,
    pub value_len: usize,
    pub expiration: Option<u64>,
    pub sequence: SequenceNumber,
}

impl RecordHeader {
    /// Total encoded record size, header and trailer included.
    pub fn record_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.key_len + self.value_len + RECORD_TRAILER_SIZE
    }

    /// Parses and checks the record header found at `offset`.
    pub fn decode(buf: &[u8], offset: u64) -> CoreResult<Self> {
        if buf.len() < RECORD_HEADER_SIZE {
            return Err(CoreError::corrupt_record(offset, "truncated record header"));
        }

        let expected = read_u32(buf, 25);
        let actual = compute_crc32(&buf[..25]);
        if expected != actual {
            return Err(CoreError::corrupt_record(
                offset,
                format!("header checksum mismatch: expected {expected:08x}, got {actual:08x}"),
            ));
        }

        let flags = buf[8];
        if flags & !FLAG_HAS_EXPIRATION != 0 {
            return Err(CoreError::corrupt_record(
                offset,
                format!("unknown flags {flags:#04x}"),
            ));
        }

        let expiration = (flags & FLAG_HAS_EXPIRATION != 0).then(|| read_u64(buf, 9));

        Ok(Self {
            key_len: read_u32(buf, 0) as usize,
            value_len: read_u32(buf, 4) as usize,
            expiration,
            sequence: SequenceNumber::new(read_u64(buf, 17)),
        })
    }
}

impl BlobRecord {
    /// Creates a record without expiration.
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, sequence: SequenceNumber) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expiration: None,
            sequence,
        }
    }

    /// Creates a record that expires at `expiration`.
    #[must_use]
    pub fn with_ttl(
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        sequence: SequenceNumber,
        expiration: u64,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expiration: Some(expiration),
            sequence,
        }
    }

    /// Returns the encoded size in bytes.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        RECORD_HEADER_SIZE + self.key.len() + self.value.len() + RECORD_TRAILER_SIZE
    }

    /// Encodes the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or value exceeds 4 GiB.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let key_len = u32::try_from(self.key.len())
            .map_err(|_| CoreError::corrupt_record(0, "key too large"))?;
        let value_len = u32::try_from(self.value.len())
            .map_err(|_| CoreError::corrupt_record(0, "value too large"))?;

        let mut buf = Vec::with_capacity(self.encoded_size());
        buf.extend_from_slice(&key_len.to_le_bytes());
        buf.extend_from_slice(&value_len.to_le_bytes());
        match self.expiration {
            Some(expiration) => {
                buf.push(FLAG_HAS_EXPIRATION);
                buf.extend_from_slice(&expiration.to_le_bytes());
            }
            None => {
                buf.push(0);
                buf.extend_from_slice(&0u64.to_le_bytes());
            }
        }
        buf.extend_from_slice(&self.sequence.as_u64().to_le_bytes());

        let header_crc = compute_crc32(&buf);
        buf.extend_from_slice(&header_crc.to_le_bytes());

        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);

        let body_crc = crc32_extend(compute_crc32(&self.key), &self.value);
        buf.extend_from_slice(&body_crc.to_le_bytes());

        Ok(buf)
    }

    /// Decodes a complete record that was stored at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptRecord`] if the data is truncated or
    /// malformed, and [`CoreError::ChecksumMismatch`] if the body checksum
    /// fails.
    pub fn decode(data: &[u8], offset: u64) -> CoreResult<Self> {
        let header = RecordHeader::decode(data, offset)?;
        Self::decode_body(header, data, offset)
    }

    pub(crate) fn decode_body(header: RecordHeader, data: &[u8], offset: u64) -> CoreResult<Self> {
        let record_len = header.record_len();
        if data.len() < record_len {
            return Err(CoreError::corrupt_record(
                offset,
                format!("truncated record: need {record_len} bytes, have {}", data.len()),
            ));
        }

        let key_start = RECORD_HEADER_SIZE;
        let value_start = key_start + header.key_len;
        let body_end = value_start + header.value_len;

        let key = &data[key_start..value_start];
        let value = &data[value_start..body_end];

        let expected = read_u32(data, body_end);
        let actual = crc32_extend(compute_crc32(key), value);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        Ok(Self {
            key: key.to_vec(),
            value: value.to_vec(),
            expiration: header.expiration,
            sequence: header.sequence,
        })
    }
}
