//! Mutating operations on a blob file, reserved for its owner.

use super::{BlobFile, FileState};
use crate::error::{CoreError, CoreResult};
use crate::format::{BlobLogFooter, BlobRecord, FOOTER_SIZE};
use crate::types::SequenceNumber;
use std::ops::Deref;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The orchestrator's handle to a blob file.
///
/// Exactly one `BlobFileControl` exists per file. It carries every mutating
/// operation (append bookkeeping, finalization, obsolescence, fsync, reader
/// cache control) and derefs to the read-only [`BlobFile`] view, which is
/// shared with readers through [`BlobFileControl::shared`].
pub struct BlobFileControl {
    file: Arc<BlobFile>,
}

impl BlobFileControl {
    pub(super) fn new(file: Arc<BlobFile>) -> Self {
        Self { file }
    }

    /// Returns the shared read-only view.
    #[must_use]
    pub fn shared(&self) -> Arc<BlobFile> {
        Arc::clone(&self.file)
    }

    fn check_append(&self, expiration: Option<u64>) -> CoreResult<()> {
        let state = self.file.state();
        if state != FileState::Open {
            return Err(CoreError::invalid_state(
                self.file.file_number,
                format!("cannot append to {state} file"),
            ));
        }
        if expiration.is_some() != self.file.has_ttl {
            return Err(CoreError::TtlMismatch {
                file: self.file.file_number,
                has_ttl: self.file.has_ttl,
            });
        }
        Ok(())
    }

    /// Records that a blob of `size` bytes with `sequence` (and `expiration`
    /// for TTL files) was appended.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] once the file is closed and
    /// [`CoreError::TtlMismatch`] if `expiration` does not match the file's
    /// TTL setting. Nothing is changed on error.
    pub fn record_append(
        &self,
        size: u64,
        sequence: SequenceNumber,
        expiration: Option<u64>,
    ) -> CoreResult<()> {
        let mut meta = self.file.meta.write();
        self.check_append(expiration)?;

        meta.sequence_range.extend(sequence);
        if let Some(expiration) = expiration {
            meta.expiration_range.extend(expiration);
        }
        self.file.blob_count.fetch_add(1, Ordering::AcqRel);
        self.file.file_size.fetch_add(size, Ordering::AcqRel);
        Ok(())
    }

    /// Writes `record` to the file and records it.
    ///
    /// Returns the record's offset.
    ///
    /// # Errors
    ///
    /// Fails like [`BlobFileControl::record_append`] before anything is
    /// written, or with an I/O error from the writer. A partially written
    /// record is cut off again so the next append starts at a clean offset.
    pub fn append(&self, record: &BlobRecord) -> CoreResult<u64> {
        let mut writer_slot = self.file.writer.lock();
        self.check_append(record.expiration)?;

        let Some(writer) = writer_slot.as_mut() else {
            return Err(CoreError::invalid_state(
                self.file.file_number,
                "no writer attached",
            ));
        };
        let record_offset = writer.size()?;
        let (offset, len) = match writer.append_record(record) {
            Ok(written) => written,
            Err(e) => {
                if let Err(truncate_err) = writer.truncate(record_offset) {
                    warn!(
                        file_number = self.file.file_number.as_u64(),
                        error = %truncate_err,
                        "could not remove partial record"
                    );
                }
                return Err(e);
            }
        };
        self.record_append(len, record.sequence, record.expiration)?;
        Ok(offset)
    }

    /// Writes the footer and makes the file immutable.
    ///
    /// On an I/O error the file stays open with its writer attached so the
    /// caller can retry; nothing is retried here.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] if the file is not open, or the
    /// I/O error from writing the footer.
    pub fn finalize(&self) -> CoreResult<()> {
        let file = &*self.file;
        let mut writer_slot = file.writer.lock();
        let meta = file.meta.write();

        let state = file.state();
        if state != FileState::Open {
            return Err(CoreError::invalid_state(
                file.file_number,
                format!("cannot finalize {state} file"),
            ));
        }
        let Some(writer) = writer_slot.as_mut() else {
            return Err(CoreError::invalid_state(
                file.file_number,
                "no writer attached",
            ));
        };

        let footer = BlobLogFooter {
            blob_count: file.blob_count(),
            sequence_range: meta.sequence_range,
            expiration_range: meta.expiration_range,
            compression: file.compression,
            has_ttl: file.has_ttl,
        };

        let footer_offset = writer.size()?;
        let sync = file.options.sync_on_finalize;
        if let Err(e) = writer.write_footer(&footer, sync) {
            if let Err(truncate_err) = writer.truncate(footer_offset) {
                warn!(
                    file_number = file.file_number.as_u64(),
                    error = %truncate_err,
                    "could not remove partial footer"
                );
            }
            return Err(e);
        }

        *writer_slot = None;
        // The footer is only ever set here, while the state is still `Open`.
        let _ = file.footer.set(footer);
        let size = file.file_size.fetch_add(FOOTER_SIZE as u64, Ordering::AcqRel)
            + FOOTER_SIZE as u64;
        if sync {
            file.last_fsync.store(size, Ordering::Relaxed);
        }
        file.state
            .transition(FileState::Open, FileState::Closed)
            .map_err(|actual| {
                CoreError::invalid_state(file.file_number, format!("state changed to {actual}"))
            })?;
        drop(meta);

        info!(
            file_number = file.file_number.as_u64(),
            blob_count = footer.blob_count,
            file_size = size,
            sequence_range = %footer.sequence_range,
            "finalized blob file"
        );
        Ok(())
    }

    /// Marks the file obsolete as of `cutoff`.
    ///
    /// Snapshots older than `cutoff` may still read the file; later ones
    /// must not.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] unless the file is closed and not
    /// yet obsolete.
    pub fn mark_obsolete(&self, cutoff: SequenceNumber) -> CoreResult<()> {
        let file = &*self.file;
        let _meta = file.meta.write();

        let state = file.state();
        if state != FileState::Closed {
            return Err(CoreError::invalid_state(
                file.file_number,
                format!("cannot mark {state} file obsolete"),
            ));
        }

        file.obsolete_sequence
            .store(cutoff.as_u64(), Ordering::Relaxed);
        file.state
            .transition(FileState::Closed, FileState::Obsolete)
            .map_err(|actual| {
                CoreError::invalid_state(file.file_number, format!("state changed to {actual}"))
            })?;

        info!(
            file_number = file.file_number.as_u64(),
            obsolete_sequence = cutoff.as_u64(),
            "marked blob file obsolete"
        );
        Ok(())
    }

    /// Syncs outstanding writes and records the synced size.
    ///
    /// A no-op once the writer has been released.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the sync.
    pub fn fsync(&self) -> CoreResult<()> {
        let mut writer_slot = self.file.writer.lock();
        if let Some(writer) = writer_slot.as_mut() {
            writer.sync()?;
            self.file
                .last_fsync
                .store(self.file.file_size(), Ordering::Relaxed);
        }
        Ok(())
    }

    /// Syncs if at least `bytes_per_sync` bytes are unsynced.
    ///
    /// Returns whether a sync happened.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the sync.
    pub fn maybe_fsync(&self) -> CoreResult<bool> {
        if !self.file.needs_fsync(false, self.file.options.bytes_per_sync) {
            return Ok(false);
        }
        self.fsync()?;
        Ok(true)
    }

    /// Drops the cached reader. Safe to call when none is cached.
    pub fn close_reader(&self) {
        if self.file.meta.write().reader.take().is_some() {
            debug!(
                file_number = self.file.file_number.as_u64(),
                "closed blob reader"
            );
        }
    }

    /// Defers GC of this file until `epoch`.
    pub fn set_gc_epoch(&self, epoch: i64) {
        self.file.gc_epoch.store(epoch, Ordering::Release);
    }

    /// Counts one blob of `size` bytes in this file as deleted elsewhere.
    pub fn record_deletion(&self, size: u64) {
        let mut meta = self.file.meta.write();
        meta.deleted_count += 1;
        meta.deleted_size += size;
    }

    /// Records the sequence at which a GC pass over this file finished.
    pub fn set_gc_finish_sequence(&self, sequence: SequenceNumber) {
        self.file.meta.write().gc_finish_sequence = Some(sequence);
    }

    /// Clears the reconciliation flag set when the file was reopened.
    pub fn clear_gc_once_after_open(&self) {
        self.file.gc_once_after_open.store(false, Ordering::Release);
    }

    /// Releases the file's handles ahead of physical deletion.
    ///
    /// Consumes the control so no further mutation is possible. Readers
    /// still holding the shared view keep working until they drop it.
    ///
    /// # Errors
    ///
    /// Hands the control back with [`CoreError::InvalidState`] unless the
    /// file is obsolete.
    pub fn retire(self) -> Result<Arc<BlobFile>, (Self, CoreError)> {
        if !self.file.is_obsolete() {
            let err = CoreError::invalid_state(
                self.file.file_number,
                format!("cannot retire {} file", self.file.state()),
            );
            return Err((self, err));
        }
        self.close_reader();
        debug!(
            file_number = self.file.file_number.as_u64(),
            "retired blob file"
        );
        Ok(self.file)
    }
}

impl Deref for BlobFileControl {
    type Target = BlobFile;

    fn deref(&self) -> &BlobFile {
        &self.file
    }
}

impl std::fmt::Debug for BlobFileControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BlobFileControl").field(&self.file).finish()
    }
}
