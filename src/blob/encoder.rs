//! Record encoding and decoding with per-record compression.
//!
//! The encoder turns a record into `[13B header][payload]`; the decoder
//! inverts it exactly: parse the header, verify the checksum, decompress,
//! and recover the key/value framing.

use crate::blob::dict::CompressionDict;
use crate::blob::format::{mask_checksum, unmask_checksum, BlobRecord, RecordHeader};
use crate::blob::RECORD_HEADER_SIZE;
use crate::config::CompressionType;
use crate::error::{Error, Result};

/// Encodes records into header + payload buffers ready for appending.
///
/// The two pieces are exposed separately (`header`, `record`) so the file
/// sink can append them back to back; `encoded_size` is their combined
/// length and becomes the record's handle size.
pub struct BlobEncoder {
    compression: CompressionType,
    level: i32,
    dict_compressor: Option<zstd::bulk::Compressor<'static>>,
    header: [u8; RECORD_HEADER_SIZE],
    payload: Vec<u8>,
}

impl BlobEncoder {
    /// Create an encoder for the given compression settings.
    pub fn new(compression: CompressionType, level: i32) -> Self {
        Self {
            compression,
            level,
            dict_compressor: None,
            header: [0u8; RECORD_HEADER_SIZE],
            payload: Vec::new(),
        }
    }

    /// Install a trained dictionary. Takes effect for records encoded after
    /// this call; earlier output is untouched. An empty dictionary clears
    /// any previously installed one.
    pub fn set_compression_dict(&mut self, dict: &CompressionDict) -> Result<()> {
        self.dict_compressor = if dict.is_empty() {
            None
        } else {
            Some(zstd::bulk::Compressor::with_dictionary(dict.level(), dict.raw())?)
        };
        Ok(())
    }

    /// Encode a record.
    pub fn encode_record(&mut self, record: &BlobRecord) -> Result<()> {
        let raw = record.encode();
        self.encode_slice(&raw)
    }

    /// Encode a pre-encoded record (the builder replays buffered samples
    /// through this path).
    pub fn encode_slice(&mut self, raw: &[u8]) -> Result<()> {
        if raw.len() > u32::MAX as usize {
            return Err(Error::invalid_argument("blob record too large"));
        }
        let (payload, compression) = self.compress(raw)?;

        let mut header = RecordHeader {
            checksum: 0,
            compressed_len: payload.len() as u32,
            uncompressed_len: raw.len() as u32,
            compression,
        }
        .encode();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header[4..]);
        hasher.update(&payload);
        header[0..4].copy_from_slice(&mask_checksum(hasher.finalize()).to_le_bytes());

        self.header = header;
        self.payload = payload;
        Ok(())
    }

    fn compress(&mut self, raw: &[u8]) -> Result<(Vec<u8>, CompressionType)> {
        let compressed = match self.compression {
            CompressionType::None => return Ok((raw.to_vec(), CompressionType::None)),
            CompressionType::Snappy => snap::raw::Encoder::new()
                .compress_vec(raw)
                .map_err(|e| Error::internal(format!("Compression failed: {}", e)))?,
            CompressionType::Zstd => match self.dict_compressor.as_mut() {
                Some(compressor) => compressor.compress(raw)?,
                None => zstd::bulk::compress(raw, self.level)?,
            },
        };
        // Store uncompressed when compression does not shrink the payload;
        // the per-record type byte keeps the file self-describing.
        if compressed.len() >= raw.len() {
            Ok((raw.to_vec(), CompressionType::None))
        } else {
            Ok((compressed, self.compression))
        }
    }

    /// Header bytes of the last encoded record.
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Payload bytes of the last encoded record.
    pub fn record(&self) -> &[u8] {
        &self.payload
    }

    /// Combined length of header and payload.
    pub fn encoded_size(&self) -> u64 {
        (RECORD_HEADER_SIZE + self.payload.len()) as u64
    }
}

/// Decodes header + payload buffers back into records.
pub struct BlobDecoder {
    dict_decompressor: Option<zstd::bulk::Decompressor<'static>>,
}

impl BlobDecoder {
    /// Create a decoder for files without an uncompression dictionary.
    pub fn new() -> Self {
        Self { dict_decompressor: None }
    }

    /// Create a decoder with the file's uncompression dictionary. An empty
    /// dictionary is equivalent to none.
    pub fn with_dictionary(dict: &[u8]) -> Result<Self> {
        if dict.is_empty() {
            return Ok(Self::new());
        }
        Ok(Self { dict_decompressor: Some(zstd::bulk::Decompressor::with_dictionary(dict)?) })
    }

    /// Parse and verify a record header + payload, returning the record.
    pub fn decode_record(&mut self, header_buf: &[u8], payload: &[u8]) -> Result<BlobRecord> {
        let header = RecordHeader::decode(header_buf)?;
        if header.compressed_len as usize != payload.len() {
            return Err(Error::corruption("record payload length mismatch"));
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header_buf[4..RECORD_HEADER_SIZE]);
        hasher.update(payload);
        let actual = hasher.finalize();
        let expected = unmask_checksum(header.checksum);
        if actual != expected {
            return Err(Error::ChecksumMismatch { expected, actual });
        }

        let raw = match header.compression {
            CompressionType::None => payload.to_vec(),
            CompressionType::Snappy => snap::raw::Decoder::new()
                .decompress_vec(payload)
                .map_err(|e| Error::internal(format!("Decompression failed: {}", e)))?,
            CompressionType::Zstd => {
                let capacity = header.uncompressed_len as usize;
                match self.dict_decompressor.as_mut() {
                    Some(decompressor) => decompressor.decompress(payload, capacity)?,
                    None => zstd::bulk::decompress(payload, capacity)?,
                }
            }
        };
        if raw.len() != header.uncompressed_len as usize {
            return Err(Error::corruption("record uncompressed length mismatch"));
        }

        BlobRecord::decode(&raw)
    }
}

impl Default for BlobDecoder {
    fn default() -> Self {
        Self::new()
    }
}
