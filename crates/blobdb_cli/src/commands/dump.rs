//! Dump command implementation.

use blobdb_core::{BlobLogIterator, BlobRecord};
use blobdb_storage::FileBackend;
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Longest key prefix shown in text output.
const KEY_PREVIEW_LEN: usize = 32;

/// Blob record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset in the blob file.
    pub offset: u64,
    /// Sequence number.
    pub sequence: u64,
    /// Key, hex-encoded.
    pub key: String,
    /// Value size in bytes.
    pub value_size: usize,
    /// Expiration timestamp (TTL files only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<u64>,
}

impl RecordInfo {
    fn new(offset: u64, record: &BlobRecord) -> Self {
        Self {
            offset,
            sequence: record.sequence.as_u64(),
            key: hex(&record.key),
            value_size: record.value.len(),
            expiration: record.expiration,
        }
    }
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    start_offset: u64,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_records(path, start_offset, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Reads up to `limit` records stored at or after `start_offset`.
///
/// Listing stops quietly at the first corrupt record.
pub fn read_records(
    path: &Path,
    start_offset: u64,
    limit: Option<usize>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let iter = BlobLogIterator::open(Box::new(FileBackend::open_read_only(path)?))?;
    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();

    for item in iter {
        if records.len() >= max_records {
            break;
        }
        match item {
            Ok((offset, record)) if offset >= start_offset => {
                records.push(RecordInfo::new(offset, &record));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "stopping dump at corrupt record");
                break;
            }
        }
    }

    Ok(records)
}

fn print_text_output(records: &[RecordInfo]) {
    println!("{:>12}  {:>20}  {:>10}  {:>20}  key", "offset", "sequence", "value", "expiration");
    for record in records {
        let expiration = record
            .expiration
            .map_or_else(|| "-".to_string(), |e| e.to_string());
        let key = if record.key.len() > KEY_PREVIEW_LEN * 2 {
            format!("{}…", &record.key[..KEY_PREVIEW_LEN * 2])
        } else {
            record.key.clone()
        };
        println!(
            "{:>12}  {:>20}  {:>10}  {:>20}  {}",
            record.offset, record.sequence, record.value_size, expiration, key
        );
    }
    println!();
    println!("{} records", records.len());
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
