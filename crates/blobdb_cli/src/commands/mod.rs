//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod verify;

use blobdb_core::FileNumber;
use serde::Serialize;
use std::path::Path;

/// Inclusive bounds as printed by the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeInfo {
    /// Smallest value.
    pub min: u64,
    /// Largest value.
    pub max: u64,
}

impl RangeInfo {
    fn from_pair(pair: Option<(u64, u64)>) -> Option<Self> {
        pair.map(|(min, max)| Self { min, max })
    }
}

/// Returns the file number encoded in a blob file's name.
fn file_number_of(path: &Path) -> Option<FileNumber> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(FileNumber::from_file_name)
}

fn format_range(range: Option<RangeInfo>) -> String {
    range.map_or_else(|| "[]".to_string(), |r| format!("[{}, {}]", r.min, r.max))
}
