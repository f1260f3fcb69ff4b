//! Meta-index block and raw block helpers.
//!
//! Raw blocks (the compression dictionary and the meta-index itself) share
//! the checksummed trailer convention of the engine's table format:
//! `[data][compression type: 1 byte][masked crc32: 4 bytes]`, so one
//! block-reading routine serves every block kind.

use crate::blob::format::{unmask_checksum, BlockHandle};
use crate::blob::BLOCK_TRAILER_SIZE;
use crate::config::CompressionType;
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// Builds the meta-index block: a name → block handle directory.
pub struct MetaIndexBuilder {
    entries: Vec<(String, BlockHandle)>,
}

impl MetaIndexBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Register a named block.
    pub fn add(&mut self, name: &str, handle: BlockHandle) {
        self.entries.push((name.to_string(), handle));
    }

    /// Encode: `[count: u32]` then per entry `[name_len: u32][name][handle: 16B]`.
    pub fn finish(self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u32_le(self.entries.len() as u32);
        for (name, handle) in &self.entries {
            buf.put_u32_le(name.len() as u32);
            buf.put_slice(name.as_bytes());
            buf.put_slice(&handle.encode());
        }
        buf.to_vec()
    }
}

impl Default for MetaIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoded meta-index block.
#[derive(Debug)]
pub struct MetaIndexBlock {
    entries: Vec<(String, BlockHandle)>,
}

impl MetaIndexBlock {
    /// Decode a meta-index block from its encoded form.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::corruption("meta-index block too short"));
        }
        let count = data.get_u32_le() as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            if data.len() < 4 {
                return Err(Error::corruption("meta-index entry truncated"));
            }
            let name_len = data.get_u32_le() as usize;
            if data.len() < name_len + 16 {
                return Err(Error::corruption("meta-index entry truncated"));
            }
            let name = String::from_utf8(data[..name_len].to_vec())
                .map_err(|_| Error::corruption("meta-index entry name is not UTF-8"))?;
            data.advance(name_len);
            let handle = BlockHandle::decode(&data[..16])?;
            data.advance(16);
            entries.push((name, handle));
        }
        Ok(Self { entries })
    }

    /// Look up a block handle by name.
    pub fn get(&self, name: &str) -> Option<BlockHandle> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, h)| *h)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the block holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read a raw block written with the 5-byte checksummed trailer, verifying
/// the checksum and stripping the trailer. The handle's size is trailer
/// inclusive.
pub fn read_raw_block(file: &mut File, handle: &BlockHandle) -> Result<Vec<u8>> {
    let total = handle.size as usize;
    if total < BLOCK_TRAILER_SIZE {
        return Err(Error::corruption("block size too small"));
    }

    file.seek(SeekFrom::Start(handle.offset))?;
    let mut buffer = vec![0u8; total];
    file.read_exact(&mut buffer)?;

    // Layout: [data...][compression_type: 1 byte][masked crc: 4 bytes]
    let data_len = total - BLOCK_TRAILER_SIZE;
    let stored = u32::from_le_bytes(buffer[data_len + 1..].try_into().unwrap());

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&buffer[..data_len + 1]);
    let actual = hasher.finalize();
    let expected = unmask_checksum(stored);
    if actual != expected {
        return Err(Error::ChecksumMismatch { expected, actual });
    }

    // Only dictionary and meta-index blocks are stored through this path,
    // always uncompressed.
    if buffer[data_len] != CompressionType::None as u8 {
        return Err(Error::corruption("unexpected compression type on raw block"));
    }

    buffer.truncate(data_len);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::format::mask_checksum;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_meta_index_round_trip() {
        let mut builder = MetaIndexBuilder::new();
        builder.add("compression-dictionary", BlockHandle::new(1000, 128));
        builder.add("other-block", BlockHandle::new(2000, 64));

        let data = builder.finish();
        let block = MetaIndexBlock::decode(&data).unwrap();

        assert_eq!(block.len(), 2);
        assert_eq!(block.get("compression-dictionary"), Some(BlockHandle::new(1000, 128)));
        assert_eq!(block.get("other-block"), Some(BlockHandle::new(2000, 64)));
        assert_eq!(block.get("missing"), None);
    }

    #[test]
    fn test_meta_index_empty() {
        let data = MetaIndexBuilder::new().finish();
        let block = MetaIndexBlock::decode(&data).unwrap();
        assert!(block.is_empty());
    }

    #[test]
    fn test_meta_index_truncated() {
        let mut builder = MetaIndexBuilder::new();
        builder.add("name", BlockHandle::new(1, 2));
        let data = builder.finish();
        assert!(MetaIndexBlock::decode(&data[..data.len() - 4]).is_err());
    }

    fn write_raw_block_to(file: &mut std::fs::File, block: &[u8]) {
        file.write_all(block).unwrap();
        let mut trailer = [0u8; BLOCK_TRAILER_SIZE];
        trailer[0] = CompressionType::None as u8;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(block);
        hasher.update(&trailer[..1]);
        trailer[1..].copy_from_slice(&mask_checksum(hasher.finalize()).to_le_bytes());
        file.write_all(&trailer).unwrap();
    }

    #[test]
    fn test_read_raw_block() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut file = temp_file.reopen().unwrap();
        write_raw_block_to(&mut file, b"dictionary bytes");
        file.flush().unwrap();

        let mut reader = temp_file.reopen().unwrap();
        let handle = BlockHandle::new(0, 16 + BLOCK_TRAILER_SIZE as u64);
        let data = read_raw_block(&mut reader, &handle).unwrap();
        assert_eq!(data, b"dictionary bytes");
    }

    #[test]
    fn test_read_raw_block_corrupted() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut file = temp_file.reopen().unwrap();
        write_raw_block_to(&mut file, b"dictionary bytes");
        file.flush().unwrap();

        // Flip a data byte; the trailer checksum no longer matches.
        let mut file = temp_file.reopen().unwrap();
        file.seek(SeekFrom::Start(2)).unwrap();
        file.write_all(&[0xFF]).unwrap();
        file.flush().unwrap();

        let mut reader = temp_file.reopen().unwrap();
        let handle = BlockHandle::new(0, 16 + BLOCK_TRAILER_SIZE as u64);
        let result = read_raw_block(&mut reader, &handle);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }
}
