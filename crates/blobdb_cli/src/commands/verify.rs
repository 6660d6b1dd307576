//! Verify command implementation.

use super::{format_range, RangeInfo};
use blobdb_core::{BlobLogIterator, ExpirationRange, SequenceRange};
use blobdb_storage::{FileBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;

/// Verification result.
#[derive(Debug, Serialize)]
pub struct VerifyResult {
    /// Number of valid records.
    pub valid_records: u64,
    /// Number of corrupt records.
    pub corrupt_records: u64,
    /// Whether a valid footer was found.
    pub finalized: bool,
    /// Sequence range of the valid records.
    pub sequence_range: Option<RangeInfo>,
    /// Expiration range of the valid records.
    pub expiration_range: Option<RangeInfo>,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn new() -> Self {
        Self {
            valid_records: 0,
            corrupt_records: 0,
            finalized: false,
            sequence_range: None,
            expiration_range: None,
            errors: Vec::new(),
        }
    }

    /// Returns whether no problems were found.
    pub fn is_ok(&self) -> bool {
        self.corrupt_records == 0 && self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = verify(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Verifying blob file {}", path.display());
            println!();
            print_result(&result);
            println!();
            if result.is_ok() {
                println!("✓ Blob file verification passed");
            } else {
                println!("✗ Blob file verification failed");
            }
        }
    }

    if result.is_ok() {
        Ok(())
    } else {
        Err("Verification failed".into())
    }
}

/// Scans every record of the blob file at `path` and checks them against
/// the header and, when present, the footer.
///
/// A bad header is returned as an error; everything else is reported in
/// the result.
pub fn verify(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let backend = FileBackend::open_read_only(path)?;
    let file_size = backend.size()?;
    let mut iter = BlobLogIterator::open(Box::new(backend))?;
    let header = *iter.header();
    let footer = iter.footer().copied();

    let mut result = VerifyResult::new();
    let mut sequences = SequenceRange::empty();
    let mut expirations = ExpirationRange::empty();

    for item in iter.by_ref() {
        match item {
            Ok((offset, record)) => {
                if record.expiration.is_some() != header.has_ttl {
                    result.errors.push(format!(
                        "Record at offset {offset}: expiration presence disagrees with header (has_ttl={})",
                        header.has_ttl
                    ));
                    result.corrupt_records += 1;
                    continue;
                }
                result.valid_records += 1;
                sequences.extend(record.sequence);
                if let Some(expiration) = record.expiration {
                    expirations.extend(expiration);
                }
            }
            Err(e) => {
                result.errors.push(e.to_string());
                result.corrupt_records += 1;
            }
        }
    }

    result.sequence_range = RangeInfo::from_pair(
        sequences
            .as_pair()
            .map(|(min, max)| (min.as_u64(), max.as_u64())),
    );
    result.expiration_range = RangeInfo::from_pair(expirations.as_pair());

    match footer {
        Some(footer) => {
            result.finalized = true;
            if footer.has_ttl != header.has_ttl || footer.compression != header.compression {
                result
                    .errors
                    .push("Footer settings disagree with header".to_string());
            }
            if footer.blob_count != result.valid_records {
                result.errors.push(format!(
                    "Footer blob count {} but {} records found",
                    footer.blob_count, result.valid_records
                ));
            }
            if footer.sequence_range != sequences {
                result.errors.push(format!(
                    "Footer sequence range {} but records span {}",
                    footer.sequence_range, sequences
                ));
            }
            if footer.expiration_range != expirations {
                result.errors.push(format!(
                    "Footer expiration range {} but records span {}",
                    footer.expiration_range, expirations
                ));
            }
        }
        None => {
            let tail = file_size.saturating_sub(iter.valid_end());
            if tail > 0 && result.corrupt_records == 0 {
                result.errors.push(format!(
                    "Torn tail: {tail} bytes past offset {}",
                    iter.valid_end()
                ));
            }
        }
    }

    Ok(result)
}

fn print_result(result: &VerifyResult) {
    println!(
        "  Records valid: {}, corrupt: {}",
        result.valid_records, result.corrupt_records
    );
    println!(
        "  Footer: {}",
        if result.finalized { "present" } else { "missing" }
    );
    println!("  Sequence range:   {}", format_range(result.sequence_range));
    println!("  Expiration range: {}", format_range(result.expiration_range));
    for error in &result.errors {
        println!("    ERROR: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobdb_core::{BlobFile, BlobFileOptions, BlobRecord, FileNumber, SequenceNumber};
    use blobdb_storage::OsEnv;
    use std::io::{Seek, SeekFrom, Write};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write_file(dir: &Path, finalize: bool) -> (std::path::PathBuf, Vec<u64>) {
        let control = BlobFile::create(
            FileNumber::new(1),
            dir,
            Arc::new(OsEnv::new()),
            BlobFileOptions::default(),
        )
        .unwrap();
        let offsets = (1..=5u64)
            .map(|i| {
                control
                    .append(&BlobRecord::new(vec![i as u8], vec![7u8; 40], SequenceNumber::new(i)))
                    .unwrap()
            })
            .collect();
        if finalize {
            control.finalize().unwrap();
        } else {
            control.fsync().unwrap();
        }
        (control.path().to_path_buf(), offsets)
    }

    #[test]
    fn clean_file_passes() {
        let dir = tempdir().unwrap();
        let (path, _) = write_file(dir.path(), true);

        let result = verify(&path).unwrap();
        assert!(result.is_ok(), "{:?}", result.errors);
        assert!(result.finalized);
        assert_eq!(result.valid_records, 5);
        assert_eq!(result.sequence_range, Some(RangeInfo { min: 1, max: 5 }));
    }

    #[test]
    fn flipped_value_byte_is_reported() {
        let dir = tempdir().unwrap();
        let (path, offsets) = write_file(dir.path(), true);

        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(offsets[2] + 35)).unwrap();
        file.write_all(&[0xAA]).unwrap();
        drop(file);

        let result = verify(&path).unwrap();
        assert!(!result.is_ok());
        assert_eq!(result.corrupt_records, 1);
        assert_eq!(result.valid_records, 2);
    }

    #[test]
    fn torn_unsealed_file_is_reported() {
        let dir = tempdir().unwrap();
        let (path, _) = write_file(dir.path(), false);

        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 3).unwrap();
        drop(file);

        let result = verify(&path).unwrap();
        assert!(!result.finalized);
        assert_eq!(result.valid_records, 4);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Torn tail"));
    }
}
