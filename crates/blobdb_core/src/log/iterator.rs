//! Streaming sequential reader over blob records.
//!
//! Records are read one at a time through a bounded buffer, so scanning a
//! large blob file during GC or recovery uses constant memory.

use crate::error::CoreResult;
use crate::format::{
    BlobLogFooter, BlobLogHeader, BlobRecord, RecordHeader, FOOTER_SIZE, HEADER_SIZE,
    RECORD_HEADER_SIZE,
};
use blobdb_storage::StorageBackend;

/// Read buffer size for streaming iteration.
const READ_BUFFER_SIZE: usize = 64 * 1024; // 64 KB

/// A streaming iterator over the records of one blob file.
///
/// # Error Handling
///
/// - A record cut short by the end of the file ends iteration; the offset
///   where valid data stops is available from [`BlobLogIterator::valid_end`]
/// - A checksum failure or malformed header yields one error and then ends
///
/// When the file carries a valid footer, iteration stops before it.
pub struct BlobLogIterator {
    backend: Box<dyn StorageBackend>,
    header: BlobLogHeader,
    footer: Option<BlobLogFooter>,
    /// Offset where record data ends (footer start, or file size).
    end_offset: u64,
    /// Offset of the next record.
    current_offset: u64,
    buffer: Vec<u8>,
    buffer_pos: usize,
    buffer_len: usize,
    finished: bool,
}

impl BlobLogIterator {
    /// Validates the header (and footer, if present) and positions the
    /// iterator at the first record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::CorruptHeader`] if the header is invalid,
    /// or an I/O error.
    pub fn open(backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        let size = backend.size()?;
        let header_bytes = backend.read_at(0, HEADER_SIZE.min(size as usize))?;
        let header = BlobLogHeader::decode(&header_bytes)?;

        let mut footer = None;
        let mut end_offset = size;
        if size >= (HEADER_SIZE + FOOTER_SIZE) as u64 {
            let footer_offset = size - FOOTER_SIZE as u64;
            let bytes = backend.read_at(footer_offset, FOOTER_SIZE)?;
            if let Ok(decoded) = BlobLogFooter::decode(&bytes) {
                footer = Some(decoded);
                end_offset = footer_offset;
            }
        }

        Ok(Self {
            backend,
            header,
            footer,
            end_offset,
            current_offset: HEADER_SIZE as u64,
            buffer: vec![0u8; READ_BUFFER_SIZE],
            buffer_pos: 0,
            buffer_len: 0,
            finished: false,
        })
    }

    /// Returns the file header.
    pub fn header(&self) -> &BlobLogHeader {
        &self.header
    }

    /// Returns the footer, if the file is finalized.
    pub fn footer(&self) -> Option<&BlobLogFooter> {
        self.footer.as_ref()
    }

    /// Returns the offset just past the last record returned so far.
    ///
    /// After iteration stops this is where a torn tail begins.
    pub fn valid_end(&self) -> u64 {
        self.current_offset
    }

    /// Makes at least `min_bytes` available from the current position.
    ///
    /// Returns `false` if the record region ends first.
    fn ensure_buffered(&mut self, min_bytes: usize) -> CoreResult<bool> {
        let available = self.buffer_len - self.buffer_pos;
        if available >= min_bytes {
            return Ok(true);
        }

        let unread = self.end_offset - self.current_offset;
        if unread < min_bytes as u64 {
            return Ok(false);
        }

        if self.buffer_pos > 0 && available > 0 {
            self.buffer.copy_within(self.buffer_pos..self.buffer_len, 0);
        }
        self.buffer_len = available;
        self.buffer_pos = 0;

        if min_bytes > self.buffer.len() {
            self.buffer.resize(min_bytes.next_power_of_two(), 0);
        }

        let read_offset = self.current_offset + available as u64;
        let remaining = self.end_offset - read_offset;
        let to_read = ((self.buffer.len() - self.buffer_len) as u64).min(remaining) as usize;
        if to_read > 0 {
            let data = self.backend.read_at(read_offset, to_read)?;
            self.buffer[self.buffer_len..self.buffer_len + data.len()].copy_from_slice(&data);
            self.buffer_len += data.len();
        }

        Ok(self.buffer_len - self.buffer_pos >= min_bytes)
    }

    fn read_next_record(&mut self) -> CoreResult<Option<(u64, BlobRecord)>> {
        let record_offset = self.current_offset;

        if !self.ensure_buffered(RECORD_HEADER_SIZE)? {
            return Ok(None);
        }
        let header = RecordHeader::decode(
            &self.buffer[self.buffer_pos..self.buffer_pos + RECORD_HEADER_SIZE],
            record_offset,
        )?;

        let record_len = header.record_len();
        if !self.ensure_buffered(record_len)? {
            return Ok(None);
        }
        let record = BlobRecord::decode_body(
            header,
            &self.buffer[self.buffer_pos..self.buffer_pos + record_len],
            record_offset,
        )?;

        self.buffer_pos += record_len;
        self.current_offset += record_len as u64;

        Ok(Some((record_offset, record)))
    }
}

impl Iterator for BlobLogIterator {
    type Item = CoreResult<(u64, BlobRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl std::fmt::Debug for BlobLogIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobLogIterator")
            .field("header", &self.header)
            .field("current_offset", &self.current_offset)
            .field("end_offset", &self.end_offset)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::log::BlobLogWriter;
    use crate::types::{CompressionKind, ExpirationRange, SequenceNumber, SequenceRange};
    use blobdb_storage::InMemoryBackend;
    use proptest::prelude::*;

    fn write_file(records: &[BlobRecord], with_footer: bool) -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        let handle = backend.append_handle();
        let mut writer = BlobLogWriter::new(Box::new(backend));
        writer
            .write_header(&BlobLogHeader::new(0, CompressionKind::None, false))
            .unwrap();
        let mut range = SequenceRange::empty();
        for record in records {
            writer.append_record(record).unwrap();
            range.extend(record.sequence);
        }
        if with_footer {
            let footer = BlobLogFooter {
                blob_count: records.len() as u64,
                sequence_range: range,
                expiration_range: ExpirationRange::empty(),
                compression: CompressionKind::None,
                has_ttl: false,
            };
            writer.write_footer(&footer, false).unwrap();
        }
        handle
    }

    fn records(n: u64) -> Vec<BlobRecord> {
        (0..n)
            .map(|i| {
                BlobRecord::new(
                    format!("key{i}").into_bytes(),
                    vec![i as u8; 100 + i as usize],
                    SequenceNumber::new(i + 1),
                )
            })
            .collect()
    }

    #[test]
    fn reads_all_records_in_order() {
        let input = records(5);
        let backend = write_file(&input, false);

        let iter = BlobLogIterator::open(Box::new(backend.read_handle())).unwrap();
        assert!(iter.footer().is_none());
        let output: Vec<BlobRecord> = iter.map(|r| r.unwrap().1).collect();
        assert_eq!(output, input);
    }

    #[test]
    fn stops_before_footer() {
        let input = records(3);
        let backend = write_file(&input, true);

        let mut iter = BlobLogIterator::open(Box::new(backend.read_handle())).unwrap();
        assert_eq!(iter.footer().unwrap().blob_count, 3);
        assert_eq!(iter.by_ref().count(), 3);
        assert_eq!(
            iter.valid_end(),
            backend.size().unwrap() - FOOTER_SIZE as u64
        );
    }

    #[test]
    fn torn_tail_ends_iteration() {
        let input = records(3);
        let backend = write_file(&input, false);
        let full = backend.data();
        let torn = InMemoryBackend::with_data(full[..full.len() - 10].to_vec());

        let mut iter = BlobLogIterator::open(Box::new(torn)).unwrap();
        let read: Vec<_> = iter.by_ref().collect::<CoreResult<Vec<_>>>().unwrap();
        assert_eq!(read.len(), 2);

        let third_offset = (HEADER_SIZE + input[0].encoded_size() + input[1].encoded_size()) as u64;
        assert_eq!(iter.valid_end(), third_offset);
    }

    #[test]
    fn corruption_yields_error_once() {
        let input = records(2);
        let backend = write_file(&input, false);
        backend.overwrite(HEADER_SIZE + RECORD_HEADER_SIZE + 1, b"\xFF");

        let mut iter = BlobLogIterator::open(Box::new(backend.read_handle())).unwrap();
        assert!(matches!(
            iter.next(),
            Some(Err(CoreError::ChecksumMismatch { .. }))
        ));
        assert!(iter.next().is_none());
        assert_eq!(iter.valid_end(), HEADER_SIZE as u64);
    }

    #[test]
    fn large_record_grows_buffer() {
        let big = BlobRecord::new(b"big".to_vec(), vec![7u8; READ_BUFFER_SIZE * 2], SequenceNumber::new(1));
        let backend = write_file(std::slice::from_ref(&big), false);

        let mut iter = BlobLogIterator::open(Box::new(backend.read_handle())).unwrap();
        assert_eq!(iter.next().unwrap().unwrap().1, big);
    }

    #[test]
    fn bad_header_is_rejected() {
        let backend = InMemoryBackend::with_data(vec![0u8; 64]);
        assert!(matches!(
            BlobLogIterator::open(Box::new(backend)),
            Err(CoreError::CorruptHeader { .. })
        ));
    }

    proptest! {
        #[test]
        fn written_records_are_scanned_back(
            values in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..20)
        ) {
            let input: Vec<BlobRecord> = values
                .into_iter()
                .enumerate()
                .map(|(i, v)| BlobRecord::new(format!("k{i}").into_bytes(), v, SequenceNumber::new(i as u64)))
                .collect();
            let backend = write_file(&input, true);

            let iter = BlobLogIterator::open(Box::new(backend.read_handle())).unwrap();
            let output: Vec<BlobRecord> = iter.map(|r| r.unwrap().1).collect();
            prop_assert_eq!(output, input);
        }
    }
}
