//! # BlobLog - Append-Only Blob File Storage
//!
//! BlobLog is the value-log subsystem of an LSM key-value engine, inspired
//! by RocksDB's blob storage extensions. Large values ("blobs") are stored
//! out-of-line from the primary sorted index in append-only blob files with
//! per-record compression, an optional trained compression dictionary, and
//! ordered scan support.
//!
//! ## Architecture
//!
//! - **BlobFileBuilder**: appends records in key order, optionally training
//!   a zstd dictionary from early records before switching to streaming
//!   appends
//! - **BlobFileIterator**: replays one file in key order, with a positional
//!   seek for approximate-offset resumption
//! - **BlobFileMergeIterator**: merges many files into one globally
//!   key-ordered stream for compaction and garbage collection
//! - **BlobIndex**: the durable `(file number, offset, size)` locator the
//!   host engine's index layer stores next to each key
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use bloblog::{BlobFileBuilder, BlobFileIterator, BlobFileOptions, BlobFileWriter, BlobRecord};
//!
//! # fn main() -> Result<(), bloblog::Error> {
//! // Write a blob file.
//! let mut file = BlobFileWriter::create("000001.blob")?;
//! let mut builder = BlobFileBuilder::new(BlobFileOptions::default(), 1, &mut file)?;
//! let _indices = builder.add(&BlobRecord::new(b"key".to_vec(), b"value".to_vec()))?;
//! builder.finish()?;
//! file.sync()?;
//!
//! // Replay it in key order.
//! let mut iter = BlobFileIterator::open("000001.blob", 1)?;
//! iter.seek_to_first();
//! while iter.advance()? {
//!     println!("{:?} => {} bytes", iter.key(), iter.value().len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod blob;
pub mod comparator;
pub mod config;
pub mod error;
pub mod file;

// Re-exports
pub use blob::builder::BlobFileBuilder;
pub use blob::dict::CompressionDict;
pub use blob::format::{BlobHandle, BlobIndex, BlobRecord};
pub use blob::iterator::BlobFileIterator;
pub use blob::merge::BlobFileMergeIterator;
pub use comparator::{BytewiseComparator, KeyComparator};
pub use config::{BlobFileOptions, CompressionType};
pub use error::{Error, Result};
pub use file::BlobFileWriter;
