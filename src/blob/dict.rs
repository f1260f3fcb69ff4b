//! Compression dictionary training.
//!
//! Many small, similar values compress poorly on their own; a dictionary
//! trained on early records lets zstd share context across them. One
//! dictionary is trained per file, written once, and never mutated.

use crate::config::CompressionType;
use crate::error::{Error, Result};

/// A trained compression dictionary, fixed for the lifetime of one blob file.
///
/// Owned exclusively by the builder on the write side; the read side loads
/// the raw bytes back from the file's dictionary block.
#[derive(Debug, Clone)]
pub struct CompressionDict {
    raw: Vec<u8>,
    compression: CompressionType,
    level: i32,
}

impl CompressionDict {
    /// Create a dictionary from raw trained bytes.
    pub fn new(raw: Vec<u8>, compression: CompressionType, level: i32) -> Self {
        Self { raw, compression, level }
    }

    /// The raw dictionary bytes as persisted in the file.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Whether training produced no usable dictionary.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Compression type the dictionary was trained for.
    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    /// Compression level to use with this dictionary.
    pub fn level(&self) -> i32 {
        self.level
    }
}

/// Train a dictionary of at most `max_dict_bytes` from `samples`, a
/// concatenation of per-record byte runs whose lengths are `sample_lens`.
///
/// An empty corpus yields an empty dictionary. Training failures (zstd
/// refuses corpora that are too small or too uniform) surface as errors so
/// the caller can decide whether to degrade.
pub fn train_dictionary(
    samples: &[u8],
    sample_lens: &[usize],
    max_dict_bytes: usize,
) -> Result<Vec<u8>> {
    if samples.is_empty() || sample_lens.is_empty() {
        return Ok(Vec::new());
    }
    zstd::dict::from_continuous(samples, sample_lens, max_dict_bytes)
        .map_err(|e| Error::internal(format!("dictionary training failed: {}", e)))
}
