//! Core type definitions for BlobDB.

use std::fmt;

/// File name extension of blob log files.
pub const BLOB_FILE_EXTENSION: &str = "blob";

/// Identity of a blob file.
///
/// Assigned when the file is created and never reused while the file
/// exists. The file's path is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileNumber(pub u64);

impl FileNumber {
    /// Creates a new file number.
    #[must_use]
    pub const fn new(number: u64) -> Self {
        Self(number)
    }

    /// Returns the raw number.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the file name, e.g. `000003.blob`.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{:06}.{BLOB_FILE_EXTENSION}", self.0)
    }

    /// Parses a file name produced by [`FileNumber::file_name`].
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(BLOB_FILE_EXTENSION)?.strip_suffix('.')?;
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        stem.parse().ok().map(Self)
    }
}

impl fmt::Display for FileNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:{}", self.0)
    }
}

/// Sequence number of a write.
///
/// Sequence numbers totally order writes; snapshots are pinned to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Largest representable sequence number.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Compression applied uniformly to every record of a blob file.
///
/// Only the tag is recorded here; codecs live outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionKind {
    /// Values are stored as-is.
    #[default]
    None,
    /// Snappy block compression.
    Snappy,
    /// zlib deflate.
    Zlib,
    /// LZ4 block compression.
    Lz4,
    /// Zstandard.
    Zstd,
}

impl CompressionKind {
    /// Returns the on-disk tag.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Snappy => 1,
            Self::Zlib => 2,
            Self::Lz4 => 4,
            Self::Zstd => 7,
        }
    }

    /// Parses an on-disk tag.
    #[must_use]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::None),
            1 => Some(Self::Snappy),
            2 => Some(Self::Zlib),
            4 => Some(Self::Lz4),
            7 => Some(Self::Zstd),
            _ => None,
        }
    }

    /// Returns a lowercase name for display.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Snappy => "snappy",
            Self::Zlib => "zlib",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive `(min, max)` bounds over the values seen so far.
///
/// Starts empty. [`Bounds::extend`] only ever widens the bounds, and
/// extending with the same value twice, or in any order, gives the same
/// result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds<T> {
    inner: Option<(T, T)>,
}

/// Range of sequence numbers contained in a blob file.
pub type SequenceRange = Bounds<SequenceNumber>;

/// Range of expiration timestamps contained in a TTL blob file.
pub type ExpirationRange = Bounds<u64>;

impl<T> Default for Bounds<T> {
    fn default() -> Self {
        Self { inner: None }
    }
}

impl<T: Ord + Copy> Bounds<T> {
    /// Returns empty bounds.
    #[must_use]
    pub const fn empty() -> Self {
        Self { inner: None }
    }

    /// Returns bounds covering `min..=max`; empty if `min > max`.
    #[must_use]
    pub fn new(min: T, max: T) -> Self {
        if min > max {
            Self::empty()
        } else {
            Self {
                inner: Some((min, max)),
            }
        }
    }

    /// Widens the bounds to include `value`.
    pub fn extend(&mut self, value: T) {
        self.inner = Some(match self.inner {
            Some((min, max)) => (min.min(value), max.max(value)),
            None => (value, value),
        });
    }

    /// Returns whether no value has been added.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Returns `(min, max)`, or `None` when empty.
    #[must_use]
    pub const fn as_pair(&self) -> Option<(T, T)> {
        self.inner
    }
}

impl<T: fmt::Display> fmt::Display for Bounds<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some((min, max)) => write!(f, "[{min}, {max}]"),
            None => f.write_str("[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn file_name_is_zero_padded() {
        assert_eq!(FileNumber::new(3).file_name(), "000003.blob");
        assert_eq!(FileNumber::new(1_234_567).file_name(), "1234567.blob");
    }

    #[test]
    fn file_name_parses_back() {
        assert_eq!(
            FileNumber::from_file_name("000042.blob"),
            Some(FileNumber::new(42))
        );
        assert_eq!(FileNumber::from_file_name("000042.sst"), None);
        assert_eq!(FileNumber::from_file_name(".blob"), None);
        assert_eq!(FileNumber::from_file_name("4x.blob"), None);
    }

    #[test]
    fn compression_tags_roundtrip() {
        for kind in [
            CompressionKind::None,
            CompressionKind::Snappy,
            CompressionKind::Zlib,
            CompressionKind::Lz4,
            CompressionKind::Zstd,
        ] {
            assert_eq!(CompressionKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(CompressionKind::from_byte(0xEE), None);
    }

    #[test]
    fn bounds_start_empty() {
        let range = SequenceRange::default();
        assert!(range.is_empty());
        assert_eq!(range.as_pair(), None);
        assert_eq!(range.to_string(), "[]");
    }

    #[test]
    fn bounds_extend_widens() {
        let mut range = ExpirationRange::empty();
        range.extend(100);
        range.extend(50);
        range.extend(200);
        range.extend(150);

        assert_eq!(range.as_pair(), Some((50, 200)));
        assert_eq!(range.to_string(), "[50, 200]");
    }

    #[test]
    fn bounds_new_rejects_inverted() {
        assert!(ExpirationRange::new(10, 5).is_empty());
        assert_eq!(ExpirationRange::new(5, 5).as_pair(), Some((5, 5)));
    }

    proptest! {
        #[test]
        fn extend_tracks_exact_min_max(values in prop::collection::vec(any::<u64>(), 1..64)) {
            let mut range = ExpirationRange::empty();
            for &v in &values {
                range.extend(v);
            }
            let min = values.iter().copied().min().unwrap();
            let max = values.iter().copied().max().unwrap();
            prop_assert_eq!(range.as_pair(), Some((min, max)));
        }

        #[test]
        fn extend_is_order_independent(mut values in prop::collection::vec(any::<u64>(), 1..32)) {
            let mut forward = ExpirationRange::empty();
            values.iter().for_each(|&v| forward.extend(v));

            values.reverse();
            let mut backward = ExpirationRange::empty();
            values.iter().for_each(|&v| { backward.extend(v); backward.extend(v); });

            prop_assert_eq!(forward, backward);
        }
    }
}
