//! On-disk format structs for blob files.
//!
//! Everything here is fixed-layout little-endian. The header is written
//! first and never rewritten; the footer sits at a fixed offset from the end
//! of the file so a reader can locate file-level metadata without a separate
//! index.

use crate::blob::{BLOB_HEADER_SIZE, FOOTER_SIZE, FORMAT_VERSION, MAGIC_NUMBER, RECORD_HEADER_SIZE};
use crate::config::CompressionType;
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use std::io::{Read, Write};

const CHECKSUM_MASK_DELTA: u32 = 0xa282_ead8;

/// Mask a CRC before storing it. Checksums of checksummed data cause
/// problems, so stored CRCs are rotated and offset.
pub fn mask_checksum(crc: u32) -> u32 {
    ((crc >> 15) | (crc << 17)).wrapping_add(CHECKSUM_MASK_DELTA)
}

/// Invert [`mask_checksum`].
pub fn unmask_checksum(masked: u32) -> u32 {
    let rot = masked.wrapping_sub(CHECKSUM_MASK_DELTA);
    (rot >> 17) | (rot << 15)
}

/// A single key/value pair stored in a blob file.
///
/// Records are immutable once added. Within one file, keys must be added in
/// non-decreasing comparator order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobRecord {
    /// User key.
    pub key: Vec<u8>,
    /// Value bytes.
    pub value: Vec<u8>,
}

impl BlobRecord {
    /// Create a new record.
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    /// Encode the record: `[key_len: u32][key][value_len: u32][value]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(8 + self.key.len() + self.value.len());
        buf.put_u32_le(self.key.len() as u32);
        buf.put_slice(&self.key);
        buf.put_u32_le(self.value.len() as u32);
        buf.put_slice(&self.value);
        buf.to_vec()
    }

    /// Decode a record from its encoded form.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::corruption("blob record too short"));
        }
        let key_len = data.get_u32_le() as usize;
        if data.len() < key_len + 4 {
            return Err(Error::corruption("blob record key truncated"));
        }
        let key = data[..key_len].to_vec();
        data.advance(key_len);

        let value_len = data.get_u32_le() as usize;
        if data.len() != value_len {
            return Err(Error::corruption("blob record value length mismatch"));
        }
        let value = data.to_vec();

        Ok(Self { key, value })
    }
}

/// Fixed-size header preceding every encoded record in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Masked CRC32 over the rest of the header and the payload.
    pub checksum: u32,
    /// Length of the stored (possibly compressed) payload.
    pub compressed_len: u32,
    /// Length of the payload after decompression.
    pub uncompressed_len: u32,
    /// Compression applied to this record's payload.
    pub compression: CompressionType,
}

impl RecordHeader {
    /// Encode to the fixed 13-byte layout.
    pub fn encode(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.checksum.to_le_bytes());
        buf[4..8].copy_from_slice(&self.compressed_len.to_le_bytes());
        buf[8..12].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        buf[12] = self.compression as u8;
        buf
    }

    /// Decode the fixed 13-byte layout. Does not verify the checksum; the
    /// payload is needed for that.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < RECORD_HEADER_SIZE {
            return Err(Error::corruption("record header too short"));
        }
        let checksum = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let compressed_len = u32::from_le_bytes(data[4..8].try_into().unwrap());
        let uncompressed_len = u32::from_le_bytes(data[8..12].try_into().unwrap());
        let compression = CompressionType::from_u8(data[12])
            .ok_or_else(|| Error::corruption(format!("invalid compression type: {}", data[12])))?;

        Ok(Self { checksum, compressed_len, uncompressed_len, compression })
    }
}

/// Location of one encoded record inside its blob file.
///
/// `offset` is the position of the record header; `size` covers the header
/// and the stored payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobHandle {
    /// Offset of the record header in the file
    pub offset: u64,
    /// Encoded size of the record, header inclusive
    pub size: u64,
}

impl BlobHandle {
    /// Create a new BlobHandle
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }
}

/// The durable locator a caller stores to retrieve a blob later:
/// which file, and where in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobIndex {
    /// Number of the blob file holding the record
    pub file_number: u64,
    /// Location of the record within that file
    pub blob_handle: BlobHandle,
}

impl BlobIndex {
    /// Create a new BlobIndex
    pub fn new(file_number: u64, blob_handle: BlobHandle) -> Self {
        Self { file_number, blob_handle }
    }

    /// Encode to 24 bytes for storage in the host engine's index.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(24);
        buf.extend_from_slice(&self.file_number.to_le_bytes());
        buf.extend_from_slice(&self.blob_handle.offset.to_le_bytes());
        buf.extend_from_slice(&self.blob_handle.size.to_le_bytes());
        buf
    }

    /// Decode a BlobIndex from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 24 {
            return Err(Error::corruption("BlobIndex too short"));
        }
        let file_number = u64::from_le_bytes(data[0..8].try_into().unwrap());
        let offset = u64::from_le_bytes(data[8..16].try_into().unwrap());
        let size = u64::from_le_bytes(data[16..24].try_into().unwrap());

        Ok(Self { file_number, blob_handle: BlobHandle::new(offset, size) })
    }
}

/// BlockHandle represents a pointer to a meta block in the blob file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockHandle {
    /// Offset of the block in the file
    pub offset: u64,
    /// Size of the block in bytes, trailer inclusive
    pub size: u64,
}

impl BlockHandle {
    /// Create a new BlockHandle
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Encode the BlockHandle to bytes (16 bytes: 8 for offset + 8 for size)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf
    }

    /// Decode a BlockHandle from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 16 {
            return Err(Error::corruption("BlockHandle too short"));
        }
        let offset = u64::from_le_bytes(data[0..8].try_into().unwrap());
        let size = u64::from_le_bytes(data[8..16].try_into().unwrap());

        Ok(Self { offset, size })
    }

    /// Whether this handle is the zero sentinel (block absent).
    pub fn is_null(&self) -> bool {
        self.offset == 0 && self.size == 0
    }
}

/// Fixed 16-byte header at the start of every blob file.
///
/// Format:
/// ```text
/// [magic: 8 bytes]
/// [version: 4 bytes]
/// [flags: 4 bytes]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobFileHeader {
    /// Format version of the file
    pub version: u32,
    /// Flag bits
    pub flags: u32,
}

impl BlobFileHeader {
    /// Flag bit: the file carries an uncompression dictionary block.
    pub const FLAG_HAS_UNCOMPRESSION_DICT: u32 = 1;

    /// Whether the dictionary flag is set.
    pub fn has_uncompression_dict(&self) -> bool {
        self.flags & Self::FLAG_HAS_UNCOMPRESSION_DICT != 0
    }

    /// Encode the header to bytes (16 bytes)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(BLOB_HEADER_SIZE);
        buf.extend_from_slice(&MAGIC_NUMBER.to_le_bytes());
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.flags.to_le_bytes());
        assert_eq!(buf.len(), BLOB_HEADER_SIZE);
        buf
    }

    /// Decode a header from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != BLOB_HEADER_SIZE {
            return Err(Error::corruption(format!(
                "Header size mismatch: expected {}, got {}",
                BLOB_HEADER_SIZE,
                data.len()
            )));
        }

        let magic = u64::from_le_bytes(data[0..8].try_into().unwrap());
        if magic != MAGIC_NUMBER {
            return Err(Error::corruption(format!(
                "Invalid blob file magic number: expected {:#x}, got {:#x}",
                MAGIC_NUMBER, magic
            )));
        }

        let version = u32::from_le_bytes(data[8..12].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(Error::corruption(format!("Unsupported blob file version: {}", version)));
        }

        let flags = u32::from_le_bytes(data[12..16].try_into().unwrap());

        Ok(Self { version, flags })
    }

    /// Write the header to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// Read the header from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; BLOB_HEADER_SIZE];
        reader.read_exact(&mut buf)?;
        Self::decode(&buf)
    }
}

impl Default for BlobFileHeader {
    fn default() -> Self {
        Self { version: FORMAT_VERSION, flags: 0 }
    }
}

/// Footer is the last 48 bytes of a blob file.
///
/// Format:
/// ```text
/// [meta_index_handle: 16 bytes]
/// [uncompression_dict_handle: 16 bytes]
/// [padding: 8 bytes]
/// [magic: 8 bytes]
/// ```
///
/// Both handles are the zero sentinel when the file carries no dictionary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobFileFooter {
    /// Handle to the meta index block
    pub meta_index_handle: BlockHandle,
    /// Handle to the uncompression dictionary block
    pub uncompression_dict_handle: BlockHandle,
}

impl BlobFileFooter {
    /// Create a new footer
    pub fn new(meta_index_handle: BlockHandle, uncompression_dict_handle: BlockHandle) -> Self {
        Self { meta_index_handle, uncompression_dict_handle }
    }

    /// Encode the footer to bytes (48 bytes)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FOOTER_SIZE);
        buf.extend_from_slice(&self.meta_index_handle.encode());
        buf.extend_from_slice(&self.uncompression_dict_handle.encode());
        // Padding - reserved for future use
        buf.extend_from_slice(&[0u8; 8]);
        buf.extend_from_slice(&MAGIC_NUMBER.to_le_bytes());
        assert_eq!(buf.len(), FOOTER_SIZE);
        buf
    }

    /// Decode a footer from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != FOOTER_SIZE {
            return Err(Error::corruption(format!(
                "Footer size mismatch: expected {}, got {}",
                FOOTER_SIZE,
                data.len()
            )));
        }

        let magic = u64::from_le_bytes(data[40..48].try_into().unwrap());
        if magic != MAGIC_NUMBER {
            return Err(Error::corruption(format!(
                "Invalid blob file magic number: expected {:#x}, got {:#x}",
                MAGIC_NUMBER, magic
            )));
        }

        let meta_index_handle = BlockHandle::decode(&data[0..16])?;
        let uncompression_dict_handle = BlockHandle::decode(&data[16..32])?;

        Ok(Self { meta_index_handle, uncompression_dict_handle })
    }

    /// Write the footer to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// Read the footer from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; FOOTER_SIZE];
        reader.read_exact(&mut buf)?;
        Self::decode(&buf)
    }
}
