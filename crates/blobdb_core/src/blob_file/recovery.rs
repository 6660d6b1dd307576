//! Reopening blob files left by a previous run.

use super::{BlobFile, BlobFileControl, FileState};
use crate::config::BlobFileOptions;
use crate::error::{CoreError, CoreResult};
use crate::format::HEADER_SIZE;
use crate::log::{BlobLogIterator, BlobLogWriter, RandomAccessReader};
use crate::types::{ExpirationRange, FileNumber, SequenceRange};
use blobdb_storage::StorageEnv;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

impl BlobFile {
    /// Reopens a finalized blob file from its header and footer.
    ///
    /// The file comes back closed, with counters and ranges taken from the
    /// footer, and flagged as owing one reconciliation GC pass.
    ///
    /// Header fields override `options.has_ttl`, `options.compression` and
    /// `options.column_family_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptHeader`] for a bad header and
    /// [`CoreError::CorruptFooter`] if the footer is missing, invalid, or
    /// disagrees with the header. Such a file is never treated as closed;
    /// use [`BlobFile::recover_unsealed`] to re-validate it.
    pub fn open_existing(
        file_number: FileNumber,
        dir: impl AsRef<Path>,
        env: Arc<dyn StorageEnv>,
        options: BlobFileOptions,
    ) -> CoreResult<BlobFileControl> {
        let path = Self::path_for(dir.as_ref(), file_number);
        let reader = RandomAccessReader::new(file_number, env.open_readable(&path)?);

        let header = reader.read_header()?;
        let footer = reader.read_footer()?;
        if footer.has_ttl != header.has_ttl || footer.compression != header.compression {
            return Err(CoreError::corrupt_footer(format!(
                "footer (has_ttl={}, compression={}) disagrees with header (has_ttl={}, compression={})",
                footer.has_ttl, footer.compression, header.has_ttl, header.compression
            )));
        }
        let size = reader.size()?;
        drop(reader);

        let mut file = Self::new(file_number, dir.as_ref(), env, options, header, FileState::Closed);
        {
            let meta = file.meta.get_mut();
            meta.sequence_range = footer.sequence_range;
            meta.expiration_range = footer.expiration_range;
        }
        file.blob_count.store(footer.blob_count, Ordering::Relaxed);
        file.file_size.store(size, Ordering::Relaxed);
        file.last_fsync.store(size, Ordering::Relaxed);
        file.gc_once_after_open.store(true, Ordering::Relaxed);
        let _ = file.footer.set(footer);

        info!(
            file_number = file_number.as_u64(),
            blob_count = footer.blob_count,
            file_size = size,
            "reopened finalized blob file"
        );

        Ok(BlobFileControl::new(Arc::new(file)))
    }

    /// Re-validates a blob file that has no valid footer and reopens it for
    /// appending.
    ///
    /// Records are scanned from the header until the first torn or corrupt
    /// record; everything from there on is truncated. Counters and ranges
    /// are rebuilt from the surviving records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptHeader`] for a bad header,
    /// [`CoreError::InvalidState`] if the file already carries a valid
    /// footer, or an I/O error.
    pub fn recover_unsealed(
        file_number: FileNumber,
        dir: impl AsRef<Path>,
        env: Arc<dyn StorageEnv>,
        options: BlobFileOptions,
    ) -> CoreResult<BlobFileControl> {
        let path = Self::path_for(dir.as_ref(), file_number);
        let mut iter = BlobLogIterator::open(env.open_readable(&path)?)?;
        let header = *iter.header();
        if iter.footer().is_some() {
            return Err(CoreError::invalid_state(
                file_number,
                "file already has a valid footer",
            ));
        }

        let mut blob_count = 0u64;
        let mut sequence_range = SequenceRange::empty();
        let mut expiration_range = ExpirationRange::empty();
        let mut valid_end = HEADER_SIZE as u64;

        for item in iter.by_ref() {
            match item {
                Ok((offset, record)) => {
                    if record.expiration.is_some() != header.has_ttl {
                        warn!(
                            file_number = file_number.as_u64(),
                            offset,
                            "record TTL disagrees with header, truncating"
                        );
                        break;
                    }
                    blob_count += 1;
                    sequence_range.extend(record.sequence);
                    if let Some(expiration) = record.expiration {
                        expiration_range.extend(expiration);
                    }
                    valid_end = offset + record.encoded_size() as u64;
                }
                Err(e) if e.is_corruption() => {
                    warn!(
                        file_number = file_number.as_u64(),
                        error = %e,
                        "stopping blob scan at corrupt record"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        drop(iter);

        let mut writer = BlobLogWriter::new(env.open_append(&path)?);
        let on_disk = writer.size()?;
        if on_disk > valid_end {
            warn!(
                file_number = file_number.as_u64(),
                valid_end,
                dropped = on_disk - valid_end,
                "truncating torn blob file tail"
            );
            writer.truncate(valid_end)?;
        }

        let mut file = Self::new(file_number, dir.as_ref(), env, options, header, FileState::Open);
        {
            let meta = file.meta.get_mut();
            meta.sequence_range = sequence_range;
            meta.expiration_range = expiration_range;
        }
        file.blob_count.store(blob_count, Ordering::Relaxed);
        file.file_size.store(valid_end, Ordering::Relaxed);
        file.last_fsync.store(valid_end, Ordering::Relaxed);
        *file.writer.get_mut() = Some(writer);

        info!(
            file_number = file_number.as_u64(),
            blob_count,
            file_size = valid_end,
            "recovered unsealed blob file"
        );

        Ok(BlobFileControl::new(Arc::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{BlobRecord, FOOTER_SIZE};
    use crate::types::{CompressionKind, SequenceNumber};
    use blobdb_storage::MemoryEnv;

    const DIR: &str = "blobs";

    fn seq(n: u64) -> SequenceNumber {
        SequenceNumber::new(n)
    }

    fn sealed_file(env: &Arc<MemoryEnv>, number: u64) -> u64 {
        let control = BlobFile::create(
            FileNumber::new(number),
            DIR,
            env.clone(),
            BlobFileOptions::new()
                .has_ttl(true)
                .compression(CompressionKind::Zstd),
        )
        .unwrap();
        for (s, ttl) in [(5, 100), (2, 50), (9, 200)] {
            control
                .append(&BlobRecord::with_ttl(vec![s as u8], vec![1u8; 32], seq(s), ttl))
                .unwrap();
        }
        control.finalize().unwrap();
        control.file_size()
    }

    #[test]
    fn open_existing_restores_closed_state() {
        let env = Arc::new(MemoryEnv::new());
        let size = sealed_file(&env, 4);

        let control = BlobFile::open_existing(
            FileNumber::new(4),
            DIR,
            env.clone(),
            BlobFileOptions::default(),
        )
        .unwrap();

        assert_eq!(control.state(), FileState::Closed);
        assert!(control.gc_once_after_open());
        assert!(control.has_ttl());
        assert_eq!(control.compression(), CompressionKind::Zstd);
        assert_eq!(control.blob_count(), 3);
        assert_eq!(control.file_size(), size);
        assert_eq!(control.sequence_range().as_pair(), Some((seq(2), seq(9))));
        assert_eq!(control.expiration_range().as_pair(), Some((50, 200)));
        assert!(control.footer().is_some());
        assert!(size >= (HEADER_SIZE + FOOTER_SIZE) as u64);

        control.clear_gc_once_after_open();
        assert!(!control.gc_once_after_open());

        assert!(matches!(
            control.record_append(1, seq(10), Some(1)),
            Err(CoreError::InvalidState { .. })
        ));
        control.mark_obsolete(seq(10)).unwrap();
    }

    #[test]
    fn corrupt_footer_is_not_treated_as_closed() {
        let env = Arc::new(MemoryEnv::new());
        let size = sealed_file(&env, 4);
        let path = BlobFile::path_for(Path::new(DIR), FileNumber::new(4));
        assert!(env.corrupt(&path, size as usize - 10, b"\x00\x01\x02"));

        let result =
            BlobFile::open_existing(FileNumber::new(4), DIR, env.clone(), BlobFileOptions::default());
        assert!(matches!(result, Err(CoreError::CorruptFooter { .. })));
    }

    #[test]
    fn unsealed_file_reports_corrupt_footer() {
        let env = Arc::new(MemoryEnv::new());
        let control =
            BlobFile::create(FileNumber::new(2), DIR, env.clone(), BlobFileOptions::default())
                .unwrap();
        control
            .append(&BlobRecord::new(b"k".to_vec(), vec![0u8; 64], seq(1)))
            .unwrap();
        drop(control);

        let result =
            BlobFile::open_existing(FileNumber::new(2), DIR, env.clone(), BlobFileOptions::default());
        assert!(matches!(result, Err(CoreError::CorruptFooter { .. })));
    }

    #[test]
    fn missing_file_is_storage_error() {
        let env = Arc::new(MemoryEnv::new());
        let result =
            BlobFile::open_existing(FileNumber::new(9), DIR, env, BlobFileOptions::default());
        assert!(matches!(result, Err(CoreError::Storage(_))));
    }

    #[test]
    fn recover_unsealed_truncates_torn_tail() {
        let env = Arc::new(MemoryEnv::new());
        let control = BlobFile::create(
            FileNumber::new(3),
            DIR,
            env.clone(),
            BlobFileOptions::new().has_ttl(true),
        )
        .unwrap();
        for (s, ttl) in [(5, 100), (2, 50), (9, 200)] {
            control
                .append(&BlobRecord::with_ttl(vec![s as u8], vec![7u8; 40], seq(s), ttl))
                .unwrap();
        }
        let path = control.path().to_path_buf();
        drop(control);

        // Tear the last record.
        let bytes = env.contents(&path).unwrap();
        env.insert(&path, bytes[..bytes.len() - 5].to_vec());

        let recovered =
            BlobFile::recover_unsealed(FileNumber::new(3), DIR, env.clone(), BlobFileOptions::default())
                .unwrap();

        assert_eq!(recovered.state(), FileState::Open);
        assert!(!recovered.gc_once_after_open());
        assert_eq!(recovered.blob_count(), 2);
        assert_eq!(recovered.sequence_range().as_pair(), Some((seq(2), seq(5))));
        assert_eq!(recovered.expiration_range().as_pair(), Some((50, 100)));
        assert_eq!(
            env.contents(&path).unwrap().len() as u64,
            recovered.file_size()
        );

        recovered
            .append(&BlobRecord::with_ttl(b"new".to_vec(), b"v".to_vec(), seq(11), 300))
            .unwrap();
        recovered.finalize().unwrap();

        let reopened =
            BlobFile::open_existing(FileNumber::new(3), DIR, env, BlobFileOptions::default())
                .unwrap();
        assert_eq!(reopened.blob_count(), 3);
        assert_eq!(reopened.sequence_range().as_pair(), Some((seq(2), seq(11))));
    }

    #[test]
    fn recover_unsealed_refuses_sealed_file() {
        let env = Arc::new(MemoryEnv::new());
        sealed_file(&env, 5);

        let result =
            BlobFile::recover_unsealed(FileNumber::new(5), DIR, env, BlobFileOptions::default());
        assert!(matches!(result, Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn recover_unsealed_stops_at_checksum_failure() {
        let env = Arc::new(MemoryEnv::new());
        let control =
            BlobFile::create(FileNumber::new(6), DIR, env.clone(), BlobFileOptions::default())
                .unwrap();
        let first = BlobRecord::new(b"a".to_vec(), vec![1u8; 16], seq(1));
        control.append(&first).unwrap();
        let second_offset = control
            .append(&BlobRecord::new(b"b".to_vec(), vec![2u8; 16], seq(2)))
            .unwrap();
        let path = control.path().to_path_buf();
        drop(control);

        // Flip a value byte in the second record.
        assert!(env.corrupt(&path, second_offset as usize + 35, b"\xFF"));

        let recovered =
            BlobFile::recover_unsealed(FileNumber::new(6), DIR, env.clone(), BlobFileOptions::default())
                .unwrap();
        assert_eq!(recovered.blob_count(), 1);
        assert_eq!(recovered.file_size(), second_offset);
    }
}
