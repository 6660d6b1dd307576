//! Benchmark utilities.

use blobdb_core::{BlobRecord, SequenceNumber};
use rand::Rng;

/// Generate random value bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate records with consecutive sequence numbers starting at 1.
///
/// When `ttl` is set every record gets an expiration; otherwise none do.
pub fn generate_records(count: usize, value_size: usize, ttl: bool) -> Vec<BlobRecord> {
    let mut rng = rand::thread_rng();
    (1..=count as u64)
        .map(|i| {
            let key = format!("key-{i:08}").into_bytes();
            let value = random_data(value_size);
            let sequence = SequenceNumber::new(i);
            if ttl {
                BlobRecord::with_ttl(key, value, sequence, rng.gen_range(1_000..100_000))
            } else {
                BlobRecord::new(key, value, sequence)
            }
        })
        .collect()
}
