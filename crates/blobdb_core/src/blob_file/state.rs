//! Lifecycle state of a blob file.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle phase of a blob file.
///
/// Transitions are one-way: `Open → Closed → Obsolete`. An obsolete file is
/// therefore always closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum FileState {
    /// Accepting appends; no footer yet.
    Open = 0,
    /// Footer written; contents are immutable.
    Closed = 1,
    /// Live data relocated by GC; kept only for older snapshots.
    Obsolete = 2,
}

impl FileState {
    /// Returns whether `self → next` is an allowed transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Closed) | (Self::Closed, Self::Obsolete)
        )
    }

    /// Returns whether the file no longer accepts appends.
    #[must_use]
    pub const fn is_immutable(self) -> bool {
        !matches!(self, Self::Open)
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Closed,
            _ => Self::Obsolete,
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Obsolete => "obsolete",
        })
    }
}

/// A [`FileState`] readable without locks.
///
/// Transitions publish with `Release` and loads use `Acquire`, so data
/// written before a transition is visible to any thread that observes the
/// new state.
#[derive(Debug)]
pub(crate) struct AtomicFileState(AtomicU8);

impl AtomicFileState {
    pub(crate) const fn new(state: FileState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> FileState {
        FileState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves from `from` to `to`.
    ///
    /// Returns the actual current state if it was not `from` or the
    /// transition is not allowed.
    pub(crate) fn transition(&self, from: FileState, to: FileState) -> Result<(), FileState> {
        if !from.can_transition_to(to) {
            return Err(self.load());
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(FileState::from_u8)
    }
}
