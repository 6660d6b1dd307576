//! Inspect command implementation.

use super::{file_number_of, format_range, RangeInfo};
use blobdb_core::{
    BlobFile, BlobFileOptions, BlobLogIterator, CoreError, FileNumber, RandomAccessReader,
};
use blobdb_storage::{FileBackend, OsEnv};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Blob file inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// File path.
    pub path: String,
    /// File number parsed from the file name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_number: Option<u64>,
    /// File size in bytes.
    pub file_size: u64,
    /// Format version from the header.
    pub version: u16,
    /// Column family from the header.
    pub column_family_id: u32,
    /// Compression name.
    pub compression: String,
    /// Whether records carry expirations.
    pub has_ttl: bool,
    /// Whether a valid footer was found.
    pub finalized: bool,
    /// Record count (from the footer, or counted when unsealed).
    pub blob_count: u64,
    /// Sequence range of the records.
    pub sequence_range: Option<RangeInfo>,
    /// Expiration range of the records.
    pub expiration_range: Option<RangeInfo>,
    /// Bytes past the last intact record of an unsealed file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torn_tail_bytes: Option<u64>,
    /// State dump of the reopened file (finalized files only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects header, footer and derived state of the blob file at `path`.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No blob file found at {}", path.display()).into());
    }

    let file_number = file_number_of(path);
    let reader = RandomAccessReader::new(
        file_number.unwrap_or(FileNumber::new(0)),
        Box::new(FileBackend::open_read_only(path)?),
    );
    let header = reader.read_header()?;
    let file_size = reader.size()?;

    let mut result = InspectResult {
        path: path.display().to_string(),
        file_number: file_number.map(FileNumber::as_u64),
        file_size,
        version: header.version,
        column_family_id: header.column_family_id,
        compression: header.compression.to_string(),
        has_ttl: header.has_ttl,
        finalized: false,
        blob_count: 0,
        sequence_range: None,
        expiration_range: None,
        torn_tail_bytes: None,
        state: None,
    };

    match reader.read_footer() {
        Ok(footer) => {
            result.finalized = true;
            result.blob_count = footer.blob_count;
            result.sequence_range = RangeInfo::from_pair(
                footer
                    .sequence_range
                    .as_pair()
                    .map(|(min, max)| (min.as_u64(), max.as_u64())),
            );
            result.expiration_range = RangeInfo::from_pair(footer.expiration_range.as_pair());
            result.state = reopen_state(path, file_number);
        }
        Err(CoreError::CorruptFooter { message }) => {
            debug!(%message, "no valid footer, scanning records");
            scan_unsealed(path, &mut result)?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(result)
}

fn scan_unsealed(
    path: &Path,
    result: &mut InspectResult,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut iter = BlobLogIterator::open(Box::new(FileBackend::open_read_only(path)?))?;
    let mut count = 0u64;
    let mut sequences = None::<(u64, u64)>;
    let mut expirations = None::<(u64, u64)>;

    for item in iter.by_ref() {
        let (_, record) = match item {
            Ok(item) => item,
            Err(e) => {
                warn!(error = %e, "scan stopped at corrupt record");
                break;
            }
        };
        count += 1;
        let s = record.sequence.as_u64();
        sequences = Some(sequences.map_or((s, s), |(lo, hi)| (lo.min(s), hi.max(s))));
        if let Some(e) = record.expiration {
            expirations = Some(expirations.map_or((e, e), |(lo, hi)| (lo.min(e), hi.max(e))));
        }
    }

    result.blob_count = count;
    result.sequence_range = RangeInfo::from_pair(sequences);
    result.expiration_range = RangeInfo::from_pair(expirations);
    let tail = result.file_size.saturating_sub(iter.valid_end());
    if tail > 0 {
        result.torn_tail_bytes = Some(tail);
    }
    Ok(())
}

fn reopen_state(path: &Path, file_number: Option<FileNumber>) -> Option<String> {
    let dir = path.parent()?;
    let file = BlobFile::open_existing(
        file_number?,
        dir,
        Arc::new(OsEnv::new()),
        BlobFileOptions::default(),
    );
    match file {
        Ok(control) => Some(control.dump_state()),
        Err(e) => {
            warn!(error = %e, "could not reopen blob file");
            None
        }
    }
}

fn print_text_output(result: &InspectResult) {
    println!("BlobDB Blob File Inspection");
    println!("===========================");
    println!();
    println!("Path: {}", result.path);
    if let Some(number) = result.file_number {
        println!("File number: {number}");
    }
    println!("Size: {}", format_size(result.file_size));
    println!();
    println!("Header:");
    println!("  Version:       {}", result.version);
    println!("  Column family: {}", result.column_family_id);
    println!("  Compression:   {}", result.compression);
    println!("  Has TTL:       {}", result.has_ttl);
    println!();
    if result.finalized {
        println!("Footer:");
    } else {
        println!("Unsealed (no valid footer), scanned records:");
    }
    println!("  Blob count:       {}", result.blob_count);
    println!("  Sequence range:   {}", format_range(result.sequence_range));
    println!("  Expiration range: {}", format_range(result.expiration_range));
    if let Some(tail) = result.torn_tail_bytes {
        println!("  Torn tail:        {tail} bytes");
    }
    if let Some(state) = &result.state {
        println!();
        println!("State:");
        println!("  {state}");
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
