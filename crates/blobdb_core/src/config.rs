//! Blob file configuration.

use crate::types::CompressionKind;

/// Options fixed when a blob file is created.
#[derive(Debug, Clone)]
pub struct BlobFileOptions {
    /// Whether every record carries an expiration timestamp.
    pub has_ttl: bool,

    /// Compression applied to every record.
    pub compression: CompressionKind,

    /// Column family the file belongs to.
    pub column_family_id: u32,

    /// Bytes appended since the last fsync before `maybe_fsync` syncs again.
    pub bytes_per_sync: u64,

    /// Whether finalization syncs the footer to stable storage.
    pub sync_on_finalize: bool,
}

impl Default for BlobFileOptions {
    fn default() -> Self {
        Self {
            has_ttl: false,
            compression: CompressionKind::None,
            column_family_id: 0,
            bytes_per_sync: 1024 * 1024, // 1 MB
            sync_on_finalize: true,
        }
    }
}

impl BlobFileOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether records carry expirations.
    #[must_use]
    pub const fn has_ttl(mut self, value: bool) -> Self {
        self.has_ttl = value;
        self
    }

    /// Sets the compression kind.
    #[must_use]
    pub const fn compression(mut self, value: CompressionKind) -> Self {
        self.compression = value;
        self
    }

    /// Sets the column family.
    #[must_use]
    pub const fn column_family_id(mut self, value: u32) -> Self {
        self.column_family_id = value;
        self
    }

    /// Sets the fsync byte interval.
    #[must_use]
    pub const fn bytes_per_sync(mut self, value: u64) -> Self {
        self.bytes_per_sync = value;
        self
    }

    /// Sets whether finalization syncs.
    #[must_use]
    pub const fn sync_on_finalize(mut self, value: bool) -> Self {
        self.sync_on_finalize = value;
        self
    }
}
