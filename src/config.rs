//! Configuration options for blob files.

use crate::comparator::{BytewiseComparator, KeyComparator};
use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Options controlling how blob files are written.
#[derive(Clone)]
pub struct BlobFileOptions {
    /// Compression applied to each record payload.
    /// Default: CompressionType::None
    pub compression: CompressionType,

    /// Compression level for zstd (1-22).
    /// Default: 3
    pub compression_level: i32,

    /// Maximum size of a trained compression dictionary, in bytes.
    /// A non-zero value enables dictionary mode: the builder buffers early
    /// records, trains a dictionary from them, and stores the dictionary in
    /// the file. Requires zstd compression.
    /// Default: 0 (dictionary mode disabled)
    pub max_dict_bytes: u64,

    /// Sample-byte budget that triggers dictionary training mid-build.
    /// Once this many encoded record bytes have been buffered, the builder
    /// trains the dictionary and stops buffering. With 0, training happens
    /// only when the file is finished.
    /// Default: 0
    pub max_train_bytes: u64,

    /// Smallest value the host engine stores out-of-line in a blob file.
    /// Values below this threshold stay inline in the sorted index; the
    /// builder itself does not filter on it.
    /// Default: 4KB
    pub min_blob_size: u64,

    /// Comparator defining the key order records must be added in.
    /// Default: bytewise
    pub comparator: Arc<dyn KeyComparator>,
}

impl Default for BlobFileOptions {
    fn default() -> Self {
        Self {
            compression: CompressionType::None,
            compression_level: 3,
            max_dict_bytes: 0,
            max_train_bytes: 0,
            min_blob_size: 4 * 1024,
            comparator: Arc::new(BytewiseComparator),
        }
    }
}

impl fmt::Debug for BlobFileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobFileOptions")
            .field("compression", &self.compression)
            .field("compression_level", &self.compression_level)
            .field("max_dict_bytes", &self.max_dict_bytes)
            .field("max_train_bytes", &self.max_train_bytes)
            .field("min_blob_size", &self.min_blob_size)
            .field("comparator", &self.comparator.name())
            .finish()
    }
}

/// Compression algorithms supported for blob records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    /// No compression.
    None = 0,

    /// Snappy compression (fast, moderate compression ratio).
    Snappy = 1,

    /// Zstd compression (higher ratio, supports trained dictionaries).
    Zstd = 2,
}

impl CompressionType {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Snappy),
            2 => Some(CompressionType::Zstd),
            _ => None,
        }
    }
}

impl Default for CompressionType {
    fn default() -> Self {
        CompressionType::None
    }
}

impl BlobFileOptions {
    /// Creates a new BlobFileOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression algorithm.
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the zstd compression level.
    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Sets the maximum dictionary size; non-zero enables dictionary mode.
    pub fn max_dict_bytes(mut self, bytes: u64) -> Self {
        self.max_dict_bytes = bytes;
        self
    }

    /// Sets the sample-byte budget that triggers dictionary training.
    pub fn max_train_bytes(mut self, bytes: u64) -> Self {
        self.max_train_bytes = bytes;
        self
    }

    /// Sets the minimum out-of-line value size.
    pub fn min_blob_size(mut self, bytes: u64) -> Self {
        self.min_blob_size = bytes;
        self
    }

    /// Sets the key comparator.
    pub fn comparator(mut self, comparator: Arc<dyn KeyComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    /// Whether dictionary mode is enabled for files built with these options.
    pub fn dictionary_enabled(&self) -> bool {
        self.max_dict_bytes > 0
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_dict_bytes > 0 && self.compression != CompressionType::Zstd {
            return Err(Error::invalid_argument("dictionary compression requires zstd"));
        }
        if self.compression == CompressionType::Zstd
            && !(1..=22).contains(&self.compression_level)
        {
            return Err(Error::invalid_argument("zstd compression level must be between 1 and 22"));
        }
        Ok(())
    }
}
