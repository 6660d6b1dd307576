//! Per-file state of a blob log file.
//!
//! A [`BlobFile`] tracks one blob file's identity, lifecycle phase, counters
//! and ranges while many threads read from it and one thread appends.
//!
//! ## Two zones
//!
//! - **Atomic zone**: `blob_count`, `file_size`, `gc_epoch`, the lifecycle
//!   [`FileState`], `obsolete_sequence`, `gc_once_after_open`, `last_access`
//!   and `last_fsync`. Read on every lookup without locking.
//! - **Guarded zone**: ranges, header, deleted counters and the cached reader,
//!   behind one `RwLock` because they must be observed together.
//!
//! The writer sits behind its own mutex. Lock order is writer, then guarded
//! zone.
//!
//! ## Capabilities
//!
//! [`BlobFile`] is the shared, read-only view handed to readers. Mutation
//! goes through the single [`BlobFileControl`] held by the orchestrating
//! engine.

mod control;
mod recovery;
mod state;

pub use control::BlobFileControl;
pub use state::FileState;

use crate::config::BlobFileOptions;
use crate::error::CoreResult;
use crate::format::{BlobLogFooter, BlobLogHeader, HEADER_SIZE};
use crate::log::{BlobLogIterator, BlobLogWriter, RandomAccessReader};
use crate::types::{CompressionKind, ExpirationRange, FileNumber, SequenceNumber, SequenceRange};
use blobdb_storage::StorageEnv;
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use state::AtomicFileState;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Metadata that must be read and updated as a group.
#[derive(Debug, Default)]
struct GuardedMeta {
    header: Option<BlobLogHeader>,
    sequence_range: SequenceRange,
    expiration_range: ExpirationRange,
    deleted_count: u64,
    deleted_size: u64,
    gc_finish_sequence: Option<SequenceNumber>,
    reader: Option<Arc<RandomAccessReader>>,
}

/// State of one blob file, shared between the appender, readers and GC.
pub struct BlobFile {
    file_number: FileNumber,
    path: PathBuf,
    has_ttl: bool,
    compression: CompressionKind,
    column_family_id: u32,
    options: BlobFileOptions,
    env: Arc<dyn StorageEnv>,

    state: AtomicFileState,
    blob_count: AtomicU64,
    file_size: AtomicU64,
    gc_epoch: AtomicI64,
    /// Valid once `state` is `Obsolete`.
    obsolete_sequence: AtomicU64,
    gc_once_after_open: AtomicBool,
    /// Unix millis of the last reader lookup.
    last_access: AtomicI64,
    /// `file_size` at the last fsync.
    last_fsync: AtomicU64,
    /// Set before the `Closed` transition is published.
    footer: OnceLock<BlobLogFooter>,

    meta: RwLock<GuardedMeta>,
    writer: Mutex<Option<BlobLogWriter>>,
}

impl BlobFile {
    /// Returns the path of blob file `file_number` inside `dir`.
    #[must_use]
    pub fn path_for(dir: &Path, file_number: FileNumber) -> PathBuf {
        dir.join(file_number.file_name())
    }

    fn new(
        file_number: FileNumber,
        dir: &Path,
        env: Arc<dyn StorageEnv>,
        options: BlobFileOptions,
        header: BlobLogHeader,
        state: FileState,
    ) -> Self {
        Self {
            file_number,
            path: Self::path_for(dir, file_number),
            has_ttl: header.has_ttl,
            compression: header.compression,
            column_family_id: header.column_family_id,
            options,
            env,
            state: AtomicFileState::new(state),
            blob_count: AtomicU64::new(0),
            file_size: AtomicU64::new(0),
            gc_epoch: AtomicI64::new(0),
            obsolete_sequence: AtomicU64::new(0),
            gc_once_after_open: AtomicBool::new(false),
            last_access: AtomicI64::new(0),
            last_fsync: AtomicU64::new(0),
            footer: OnceLock::new(),
            meta: RwLock::new(GuardedMeta {
                header: Some(header),
                ..GuardedMeta::default()
            }),
            writer: Mutex::new(None),
        }
    }

    /// Creates a new blob file, writes its header, and returns the control
    /// capability for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or the header cannot be
    /// written.
    pub fn create(
        file_number: FileNumber,
        dir: impl AsRef<Path>,
        env: Arc<dyn StorageEnv>,
        options: BlobFileOptions,
    ) -> CoreResult<BlobFileControl> {
        let header = BlobLogHeader::new(
            options.column_family_id,
            options.compression,
            options.has_ttl,
        );
        let mut file = Self::new(file_number, dir.as_ref(), env, options, header, FileState::Open);

        let mut writer = BlobLogWriter::new(file.env.create(&file.path)?);
        writer.write_header(&header)?;

        file.file_size.store(HEADER_SIZE as u64, Ordering::Release);
        *file.writer.get_mut() = Some(writer);

        debug!(
            file_number = file_number.as_u64(),
            path = %file.path.display(),
            has_ttl = file.has_ttl,
            compression = %file.compression,
            "created blob file"
        );

        Ok(BlobFileControl::new(Arc::new(file)))
    }

    /// Returns the file's identity.
    pub fn file_number(&self) -> FileNumber {
        self.file_number
    }

    /// Returns the file's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether every record carries an expiration.
    pub fn has_ttl(&self) -> bool {
        self.has_ttl
    }

    /// Returns the compression applied to every record.
    pub fn compression(&self) -> CompressionKind {
        self.compression
    }

    /// Returns the column family recorded in the header.
    pub fn column_family_id(&self) -> u32 {
        self.column_family_id
    }

    /// Returns the options the file was opened with.
    pub fn options(&self) -> &BlobFileOptions {
        &self.options
    }

    // Lock-free accessors.

    /// Returns the lifecycle phase.
    pub fn state(&self) -> FileState {
        self.state.load()
    }

    /// Returns whether the file no longer accepts appends.
    pub fn is_immutable(&self) -> bool {
        self.state().is_immutable()
    }

    /// Returns whether GC has relocated this file's live data.
    pub fn is_obsolete(&self) -> bool {
        self.state() == FileState::Obsolete
    }

    /// Returns the cutoff recorded by `mark_obsolete`, if the file is
    /// obsolete.
    pub fn obsolete_sequence(&self) -> Option<SequenceNumber> {
        if self.is_obsolete() {
            Some(SequenceNumber::new(
                self.obsolete_sequence.load(Ordering::Relaxed),
            ))
        } else {
            None
        }
    }

    /// Returns whether a snapshot pinned at `snapshot` may read this file.
    ///
    /// Live files are visible to every snapshot. Obsolete files are visible
    /// only to snapshots strictly older than the obsolete cutoff.
    pub fn visible_to_snapshot(&self, snapshot: SequenceNumber) -> bool {
        self.obsolete_sequence()
            .map_or(true, |cutoff| snapshot < cutoff)
    }

    /// Returns whether the file can be physically deleted given the oldest
    /// live snapshot (`None` when there are no snapshots).
    pub fn is_reclaimable(&self, oldest_snapshot: Option<SequenceNumber>) -> bool {
        match self.obsolete_sequence() {
            Some(cutoff) => oldest_snapshot.map_or(true, |snapshot| snapshot >= cutoff),
            None => false,
        }
    }

    /// Returns the number of records appended.
    pub fn blob_count(&self) -> u64 {
        self.blob_count.load(Ordering::Acquire)
    }

    /// Returns the bytes written so far.
    pub fn file_size(&self) -> u64 {
        self.file_size.load(Ordering::Acquire)
    }

    /// Returns the epoch before which GC should not consider this file.
    pub fn gc_epoch(&self) -> i64 {
        self.gc_epoch.load(Ordering::Acquire)
    }

    /// Returns whether a reconciliation GC pass is owed after reopening.
    pub fn gc_once_after_open(&self) -> bool {
        self.gc_once_after_open.load(Ordering::Acquire)
    }

    /// Returns the unix time in milliseconds of the last reader lookup.
    pub fn last_access(&self) -> i64 {
        self.last_access.load(Ordering::Relaxed)
    }

    /// Returns `file_size` as of the last fsync.
    pub fn last_fsync(&self) -> u64 {
        self.last_fsync.load(Ordering::Relaxed)
    }

    /// Returns the footer once the file is closed.
    pub fn footer(&self) -> Option<&BlobLogFooter> {
        if self.is_immutable() {
            self.footer.get()
        } else {
            None
        }
    }

    /// Returns whether enough unsynced bytes have accumulated to fsync.
    ///
    /// Always `true` when `force` is set. Racy by nature: syncing more often
    /// than needed is harmless.
    pub fn needs_fsync(&self, force: bool, byte_threshold: u64) -> bool {
        if force {
            return true;
        }
        let unsynced = self.file_size().saturating_sub(self.last_fsync());
        unsynced >= byte_threshold
    }

    // Accessors that take the shared lock.

    /// Returns the header if it has been written or validated.
    pub fn header(&self) -> Option<BlobLogHeader> {
        self.meta.read().header
    }

    /// Returns the range of sequence numbers appended so far.
    pub fn sequence_range(&self) -> SequenceRange {
        self.meta.read().sequence_range
    }

    /// Returns the range of expirations appended so far.
    pub fn expiration_range(&self) -> ExpirationRange {
        self.meta.read().expiration_range
    }

    /// Returns `(deleted_count, deleted_size)`.
    ///
    /// These are advisory statistics for GC scoring only.
    pub fn deleted_stats(&self) -> (u64, u64) {
        let meta = self.meta.read();
        (meta.deleted_count, meta.deleted_size)
    }

    /// Returns the sequence at which the last GC pass over this file ended.
    pub fn gc_finish_sequence(&self) -> Option<SequenceNumber> {
        self.meta.read().gc_finish_sequence
    }

    /// Returns the shared random-access reader, opening and caching it on
    /// first use.
    ///
    /// The flag is `true` for the one caller that actually opened the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn get_or_open_reader(&self) -> CoreResult<(Arc<RandomAccessReader>, bool)> {
        self.last_access.store(unix_millis(), Ordering::Relaxed);

        if let Some(reader) = &self.meta.read().reader {
            return Ok((Arc::clone(reader), false));
        }

        let meta = self.meta.upgradable_read();
        if let Some(reader) = &meta.reader {
            return Ok((Arc::clone(reader), false));
        }

        let backend = self.env.open_readable(&self.path)?;
        let reader = Arc::new(RandomAccessReader::new(self.file_number, backend));

        let mut meta = RwLockUpgradableReadGuard::upgrade(meta);
        meta.reader = Some(Arc::clone(&reader));

        debug!(file_number = self.file_number.as_u64(), "opened blob reader");
        Ok((reader, true))
    }

    /// Returns whether a reader is currently cached.
    pub fn has_cached_reader(&self) -> bool {
        self.meta.read().reader.is_some()
    }

    /// Opens an uncached sequential scanner over the file's records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its header is
    /// invalid.
    pub fn open_sequential_reader(&self) -> CoreResult<BlobLogIterator> {
        BlobLogIterator::open(self.env.open_readable(&self.path)?)
    }

    /// Returns a human-readable snapshot of every field.
    ///
    /// Taken under the shared lock; the format is not stable.
    pub fn dump_state(&self) -> String {
        let meta = self.meta.read();
        let mut out = String::new();

        let _ = write!(
            out,
            "path: {} fn: {} state: {} blob_count: {} file_size: {} gc_epoch: {} \
             deleted_count: {} deleted_size: {} has_ttl: {} compression: {} \
             column_family: {} sequence_range: {} expiration_range: {} \
             gc_once_after_open: {} last_fsync: {} header_valid: {} reader_cached: {}",
            self.path.display(),
            self.file_number.as_u64(),
            self.state(),
            self.blob_count(),
            self.file_size(),
            self.gc_epoch(),
            meta.deleted_count,
            meta.deleted_size,
            self.has_ttl,
            self.compression,
            self.column_family_id,
            meta.sequence_range,
            meta.expiration_range,
            self.gc_once_after_open(),
            self.last_fsync(),
            meta.header.is_some(),
            meta.reader.is_some(),
        );
        if let Some(cutoff) = self.obsolete_sequence() {
            let _ = write!(out, " obsolete_sequence: {}", cutoff.as_u64());
        }
        if let Some(seq) = meta.gc_finish_sequence {
            let _ = write!(out, " gc_finish_sequence: {}", seq.as_u64());
        }
        out
    }
}

impl std::fmt::Debug for BlobFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobFile")
            .field("file_number", &self.file_number)
            .field("state", &self.state())
            .field("blob_count", &self.blob_count())
            .field("file_size", &self.file_size())
            .finish_non_exhaustive()
    }
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
