//! Blob file builder.
//!
//! Builds one append-only blob file from a sequence of records with
//! non-decreasing keys.
//!
//! Usage:
//! ```no_run
//! use bloblog::{BlobFileBuilder, BlobFileOptions, BlobFileWriter, BlobRecord};
//!
//! # fn main() -> Result<(), bloblog::Error> {
//! let mut file = BlobFileWriter::create("000001.blob")?;
//! let mut builder = BlobFileBuilder::new(BlobFileOptions::default(), 1, &mut file)?;
//! builder.add(&BlobRecord::new(b"key1".to_vec(), b"value1".to_vec()))?;
//! builder.add(&BlobRecord::new(b"key2".to_vec(), b"value2".to_vec()))?;
//! builder.finish()?;
//! file.sync()?;
//! # Ok(())
//! # }
//! ```

use crate::blob::dict::{train_dictionary, CompressionDict};
use crate::blob::encoder::BlobEncoder;
use crate::blob::format::{
    mask_checksum, BlobFileFooter, BlobFileHeader, BlobHandle, BlobIndex, BlobRecord, BlockHandle,
};
use crate::blob::meta::MetaIndexBuilder;
use crate::blob::{BLOCK_TRAILER_SIZE, COMPRESSION_DICT_BLOCK};
use crate::config::{BlobFileOptions, CompressionType};
use crate::error::{Error, Result};
use crate::file::BlobFileWriter;
use std::cmp::Ordering;
use std::io::Write;

/// Phase of the builder.
///
/// A file starts `Buffered` only when dictionary mode is enabled; otherwise
/// it starts `Unbuffered` and stays there. The transition is one-way,
/// triggered by the sample-byte budget or by `finish`.
enum BuilderState {
    /// Encoded records are staged in insertion order until enough sample
    /// bytes accumulate to train the dictionary.
    Buffered {
        /// Encoded records awaiting replay.
        samples: Vec<Vec<u8>>,
        /// Total encoded bytes staged so far.
        sample_bytes: u64,
    },
    /// Every record is encoded and appended immediately.
    Unbuffered,
}

/// BlobFileBuilder writes one blob file.
///
/// The builder owns exclusive write access to its sink for its whole
/// lifetime. Any append failure latches: every later operation returns the
/// first error without touching the file again, so a partially-written file
/// cannot be mistaken for a complete one. Callers must check `finish`
/// before trusting the file.
pub struct BlobFileBuilder<'a, W: Write> {
    options: BlobFileOptions,
    file_number: u64,
    file: &'a mut BlobFileWriter<W>,
    state: BuilderState,
    encoder: BlobEncoder,
    compression_dict: Option<CompressionDict>,
    error: Option<Error>,
    finished: bool,
    num_entries: u64,
    smallest_key: Vec<u8>,
    largest_key: Vec<u8>,
    live_data_size: u64,
}

impl<'a, W: Write> BlobFileBuilder<'a, W> {
    /// Create a builder over `file`, writing the file header immediately.
    pub fn new(
        options: BlobFileOptions,
        file_number: u64,
        file: &'a mut BlobFileWriter<W>,
    ) -> Result<Self> {
        options.validate()?;

        let mut header = BlobFileHeader::default();
        if options.dictionary_enabled() {
            header.flags |= BlobFileHeader::FLAG_HAS_UNCOMPRESSION_DICT;
        }
        file.append(&header.encode())?;

        let state = if options.dictionary_enabled() {
            BuilderState::Buffered { samples: Vec::new(), sample_bytes: 0 }
        } else {
            BuilderState::Unbuffered
        };
        let encoder = BlobEncoder::new(options.compression, options.compression_level);

        Ok(Self {
            options,
            file_number,
            file,
            state,
            encoder,
            compression_dict: None,
            error: None,
            finished: false,
            num_entries: 0,
            smallest_key: Vec::new(),
            largest_key: Vec::new(),
            live_data_size: 0,
        })
    }

    /// Add a record. Keys must arrive in non-decreasing comparator order;
    /// violations are a caller bug and panic.
    ///
    /// Returns the blob indices that became durable as a result of this
    /// call: one for an immediate append, none while the builder is still
    /// sampling, or the whole staged batch (in insertion order) when this
    /// add triggers dictionary training.
    pub fn add(&mut self, record: &BlobRecord) -> Result<Vec<BlobIndex>> {
        self.status()?;
        assert!(!self.finished, "add called after finish");
        if record.key.is_empty() {
            return Err(Error::invalid_argument("Key cannot be empty"));
        }
        self.check_key_order(&record.key);

        let result = self.add_inner(record);
        self.latch(result)
    }

    fn add_inner(&mut self, record: &BlobRecord) -> Result<Vec<BlobIndex>> {
        let train_now = if let BuilderState::Buffered { samples, sample_bytes } = &mut self.state {
            let encoded = record.encode();
            *sample_bytes += encoded.len() as u64;
            samples.push(encoded);
            self.options.max_train_bytes > 0 && *sample_bytes >= self.options.max_train_bytes
        } else {
            self.encoder.encode_record(record)?;
            let handle = self.write_encoder_data()?;
            return Ok(vec![BlobIndex::new(self.file_number, handle)]);
        };

        if train_now {
            self.enter_unbuffered()
        } else {
            Ok(Vec::new())
        }
    }

    /// Train the dictionary from the staged samples, install it, flip to the
    /// unbuffered state, then replay the samples in insertion order.
    fn enter_unbuffered(&mut self) -> Result<Vec<BlobIndex>> {
        let (samples, sample_bytes) =
            match std::mem::replace(&mut self.state, BuilderState::Unbuffered) {
                BuilderState::Buffered { samples, sample_bytes } => (samples, sample_bytes),
                BuilderState::Unbuffered => return Ok(Vec::new()),
            };

        let max_train_bytes = self.options.max_train_bytes as usize;
        let mut corpus = Vec::with_capacity(sample_bytes as usize);
        let mut sample_lens = Vec::with_capacity(samples.len());
        for sample in &samples {
            let copy_len = if max_train_bytes > 0 {
                sample.len().min(max_train_bytes.saturating_sub(sample.len()))
            } else {
                sample.len()
            };
            if copy_len > 0 {
                corpus.extend_from_slice(&sample[..copy_len]);
                sample_lens.push(copy_len);
            }
        }

        let raw_dict =
            match train_dictionary(&corpus, &sample_lens, self.options.max_dict_bytes as usize) {
                Ok(dict) => dict,
                Err(e) => {
                    log::warn!(
                        "blob file {}: dictionary training failed, storing records without a dictionary: {}",
                        self.file_number,
                        e
                    );
                    Vec::new()
                }
            };
        let dict =
            CompressionDict::new(raw_dict, self.options.compression, self.options.compression_level);
        self.encoder.set_compression_dict(&dict)?;
        self.compression_dict = Some(dict);

        log::debug!(
            "blob file {}: entering unbuffered state, replaying {} sampled records ({} bytes)",
            self.file_number,
            samples.len(),
            sample_bytes
        );

        let mut indices = Vec::with_capacity(samples.len());
        for sample in &samples {
            self.encoder.encode_slice(sample)?;
            let handle = self.write_encoder_data()?;
            indices.push(BlobIndex::new(self.file_number, handle));
        }
        Ok(indices)
    }

    /// Append the encoder's current header + payload, returning the handle.
    /// `num_entries` and `live_data_size` only count records whose append
    /// succeeded.
    fn write_encoder_data(&mut self) -> Result<BlobHandle> {
        let offset = self.file.file_size();
        let size = self.encoder.encoded_size();
        self.file.append(self.encoder.header())?;
        self.file.append(self.encoder.record())?;
        self.num_entries += 1;
        self.live_data_size += size;
        Ok(BlobHandle::new(offset, size))
    }

    /// Append `block` followed by the shared checksummed block trailer:
    /// 1 byte compression placeholder + 4 bytes masked CRC32 over the block
    /// extended by that byte.
    fn write_raw_block(&mut self, block: &[u8]) -> Result<BlockHandle> {
        let offset = self.file.file_size();
        self.file.append(block)?;

        let mut trailer = [0u8; BLOCK_TRAILER_SIZE];
        // Only dictionary and meta-index blocks are written through this
        // path, so the type byte is always "no compression".
        trailer[0] = CompressionType::None as u8;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(block);
        hasher.update(&trailer[..1]);
        trailer[1..].copy_from_slice(&mask_checksum(hasher.finalize()).to_le_bytes());
        self.file.append(&trailer)?;

        Ok(BlockHandle::new(offset, (block.len() + BLOCK_TRAILER_SIZE) as u64))
    }

    /// Finish the file: flush any staged samples, write the dictionary and
    /// meta-index blocks when a dictionary was produced, then the footer.
    ///
    /// Returns the indices of records flushed by the final state transition
    /// (empty when the builder was already unbuffered). Durability is the
    /// caller's: `finish` flushes the sink but does not sync it, so syncs
    /// can be batched across files.
    pub fn finish(&mut self) -> Result<Vec<BlobIndex>> {
        self.status()?;
        assert!(!self.finished, "finish called twice");

        let result = self.finish_inner();
        let result = self.latch(result);
        if result.is_ok() {
            self.finished = true;
        }
        result
    }

    fn finish_inner(&mut self) -> Result<Vec<BlobIndex>> {
        let indices = if matches!(self.state, BuilderState::Buffered { .. }) {
            self.enter_unbuffered()?
        } else {
            Vec::new()
        };

        let mut footer = BlobFileFooter::default();
        if let Some(dict) = self.compression_dict.take() {
            let dict_handle = self.write_raw_block(dict.raw())?;
            let mut meta_index_builder = MetaIndexBuilder::new();
            meta_index_builder.add(COMPRESSION_DICT_BLOCK, dict_handle);
            let meta_index_handle = self.write_raw_block(&meta_index_builder.finish())?;
            footer.meta_index_handle = meta_index_handle;
            footer.uncompression_dict_handle = dict_handle;
        }

        self.file.append(&footer.encode())?;
        self.file.flush()?;

        log::debug!(
            "finished blob file {}: {} entries, {} live bytes",
            self.file_number,
            self.num_entries,
            self.live_data_size
        );
        Ok(indices)
    }

    /// Abandon the file without writing a footer. The partial contents
    /// carry no guarantees; the caller is expected to delete the file.
    pub fn abandon(self) {}

    /// The latched error, if any operation has failed.
    pub fn status(&self) -> Result<()> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Number of records appended to the file so far. Records still staged
    /// for dictionary training are not counted until they are replayed.
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Smallest key added so far.
    pub fn smallest_key(&self) -> &[u8] {
        &self.smallest_key
    }

    /// Largest key added so far.
    pub fn largest_key(&self) -> &[u8] {
        &self.largest_key
    }

    /// Total encoded bytes of appended records, header inclusive.
    pub fn live_data_size(&self) -> u64 {
        self.live_data_size
    }

    fn latch<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if self.error.is_none() {
                self.error = Some(e.clone());
            }
        }
        result
    }

    fn check_key_order(&mut self, key: &[u8]) {
        if self.smallest_key.is_empty() {
            self.smallest_key = key.to_vec();
        }
        if !self.largest_key.is_empty() {
            assert!(
                self.options.comparator.compare(key, &self.largest_key) != Ordering::Less,
                "keys must be added in non-decreasing order"
            );
        }
        self.largest_key.clear();
        self.largest_key.extend_from_slice(key);
    }
}
