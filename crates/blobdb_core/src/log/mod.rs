//! Sequential writer and readers for blob log files.
//!
//! - [`BlobLogWriter`] appends the header, records and footer
//! - [`BlobLogIterator`] scans records in file order (GC, recovery)
//! - [`RandomAccessReader`] fetches single records by offset (point lookups)

mod iterator;
mod random_access;
mod writer;

pub use iterator::BlobLogIterator;
pub use random_access::RandomAccessReader;
pub use writer::BlobLogWriter;
