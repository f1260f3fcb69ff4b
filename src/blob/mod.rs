//! Blob file implementation.
//!
//! A blob file holds large values out-of-line from the host engine's sorted
//! index. Records are appended in key order and replayed in the same order,
//! so on-disk order is key order and no per-file index is needed.
//!
//! ## File Format
//!
//! ```text
//! [Header: 16B]       // magic, format version, flags
//! [Record 1]          // 13B record header + compressed-or-raw payload
//! [Record 2]
//! ...
//! [Record N]
//! [Dict Block]        // raw dictionary bytes + 5B trailer (dictionary mode only)
//! [Meta Index Block]  // name -> block handle directory + 5B trailer (dictionary mode only)
//! [Footer: 48B]       // handles to the meta blocks, magic
//! ```
//!
//! ## Record Format
//!
//! Each record is framed as:
//! - Masked CRC32 over the rest of the header and the payload (4 bytes)
//! - Compressed payload length (4 bytes)
//! - Uncompressed payload length (4 bytes)
//! - Compression type (1 byte)
//! - Payload: the length-prefixed key/value pair, possibly compressed
//!
//! The compression type is stored per record, so a file stays readable even
//! when individual records fall back to uncompressed storage.

pub mod builder;
pub mod dict;
pub mod encoder;
pub mod format;
pub mod iterator;
pub mod merge;
pub mod meta;

pub use builder::BlobFileBuilder;
pub use dict::CompressionDict;
pub use encoder::{BlobDecoder, BlobEncoder};
pub use format::{BlobFileFooter, BlobFileHeader, BlobHandle, BlobIndex, BlobRecord, BlockHandle};
pub use iterator::BlobFileIterator;
pub use merge::BlobFileMergeIterator;
pub use meta::{MetaIndexBlock, MetaIndexBuilder};

/// Magic number for blob files
pub const MAGIC_NUMBER: u64 = 0x31474f4c424f4c42; // "BLOBLOG1" in hex

/// Current blob file format version
pub const FORMAT_VERSION: u32 = 1;

/// File header size in bytes (fixed)
pub const BLOB_HEADER_SIZE: usize = 16;

/// File footer size in bytes (fixed)
pub const FOOTER_SIZE: usize = 48;

/// Per-record header size in bytes (fixed)
pub const RECORD_HEADER_SIZE: usize = 13;

/// Raw block trailer size: 1 byte compression type + 4 bytes masked CRC32
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Meta-index entry name for the uncompression dictionary block
pub const COMPRESSION_DICT_BLOCK: &str = "compression-dictionary";
