//! Blob file iterator.
//!
//! Replays one blob file's records in on-disk order. Records were appended
//! in non-decreasing key order, so on-disk order is key order and a plain
//! forward scan yields a sorted stream.

use crate::blob::encoder::BlobDecoder;
use crate::blob::format::{BlobFileFooter, BlobFileHeader, BlobHandle, BlobIndex, BlobRecord, RecordHeader};
use crate::blob::meta::{read_raw_block, MetaIndexBlock};
use crate::blob::{BLOB_HEADER_SIZE, COMPRESSION_DICT_BLOCK, FOOTER_SIZE, RECORD_HEADER_SIZE};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

struct CurrentRecord {
    handle: BlobHandle,
    record: BlobRecord,
}

/// Cursor over the records of one blob file.
///
/// Errors are sticky: once corruption or an I/O failure is observed the
/// iterator becomes invalid and every later call reports the same error
/// until the iterator is discarded.
pub struct BlobFileIterator {
    file: File,
    file_number: u64,
    records_end: u64,
    decoder: BlobDecoder,
    cursor: u64,
    current: Option<CurrentRecord>,
    error: Option<Error>,
}

impl BlobFileIterator {
    /// Open a blob file for iteration.
    pub fn open<P: AsRef<Path>>(path: P, file_number: u64) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(file, file_number)
    }

    /// Wrap an already-open file, reading its header, footer, and (when the
    /// footer references one) its uncompression dictionary.
    pub fn new(mut file: File, file_number: u64) -> Result<Self> {
        let file_size = file.metadata()?.len();
        if file_size < (BLOB_HEADER_SIZE + FOOTER_SIZE) as u64 {
            return Err(Error::corruption("File too small to be a valid blob file"));
        }

        file.seek(SeekFrom::Start(0))?;
        let header = BlobFileHeader::read_from(&mut file)?;

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let footer = BlobFileFooter::read_from(&mut file)?;
        let footer_offset = file_size - FOOTER_SIZE as u64;

        // The meta-index names the dictionary block; the record region ends
        // where the first meta block begins.
        let (records_end, decoder) = if footer.meta_index_handle.is_null() {
            if header.has_uncompression_dict() {
                return Err(Error::corruption(
                    "header advertises a dictionary but the footer references none",
                ));
            }
            (footer_offset, BlobDecoder::new())
        } else {
            let meta_data = read_raw_block(&mut file, &footer.meta_index_handle)?;
            let meta_index = MetaIndexBlock::decode(&meta_data)?;
            let dict_handle = meta_index.get(COMPRESSION_DICT_BLOCK).ok_or_else(|| {
                Error::corruption("meta-index block has no compression dictionary entry")
            })?;
            let dict = read_raw_block(&mut file, &dict_handle)?;
            (dict_handle.offset, BlobDecoder::with_dictionary(&dict)?)
        };

        Ok(Self {
            file,
            file_number,
            records_end,
            decoder,
            cursor: BLOB_HEADER_SIZE as u64,
            current: None,
            error: None,
        })
    }

    /// Position immediately before the first record; `advance` reads it.
    pub fn seek_to_first(&mut self) {
        self.cursor = BLOB_HEADER_SIZE as u64;
        self.current = None;
    }

    /// Decode the record at the cursor and step past it. Returns `Ok(false)`
    /// at the end of the record region.
    pub fn advance(&mut self) -> Result<bool> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        if self.cursor >= self.records_end {
            self.current = None;
            return Ok(false);
        }

        match self.read_record_at(self.cursor) {
            Ok((handle, record)) => {
                self.cursor = handle.offset + handle.size;
                self.current = Some(CurrentRecord { handle, record });
                Ok(true)
            }
            Err(e) => {
                self.current = None;
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Position the cursor so the next `advance` lands on the record whose
    /// on-disk span contains `offset`, or on the record just before it when
    /// `offset` falls between records.
    ///
    /// Records are variable length with no reverse index, so this walks the
    /// record headers forward from the start of the file and backs up one
    /// record when it overshoots.
    pub fn seek_for_prev(&mut self, offset: u64) -> Result<()> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        if offset >= self.records_end {
            let e = Error::invalid_argument("offset is past the record region");
            self.current = None;
            self.error = Some(e.clone());
            return Err(e);
        }

        match self.walk_to(offset) {
            Ok(position) => {
                self.cursor = position;
                self.current = None;
                Ok(())
            }
            Err(e) => {
                self.current = None;
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn walk_to(&mut self, offset: u64) -> Result<u64> {
        let mut cursor = BLOB_HEADER_SIZE as u64;
        let mut record_size = 0u64;
        while cursor < offset {
            let header_buf = self.read_record_header(cursor)?;
            let header = RecordHeader::decode(&header_buf)?;
            record_size = (RECORD_HEADER_SIZE as u64) + header.compressed_len as u64;
            if cursor + record_size > self.records_end {
                return Err(Error::corruption("blob record overruns the record region"));
            }
            cursor += record_size;
        }
        if cursor > offset {
            cursor -= record_size;
        }
        Ok(cursor)
    }

    fn read_record_at(&mut self, offset: u64) -> Result<(BlobHandle, BlobRecord)> {
        let header_buf = self.read_record_header(offset)?;
        let header = RecordHeader::decode(&header_buf)?;
        let size = (RECORD_HEADER_SIZE as u64) + header.compressed_len as u64;
        if offset + size > self.records_end {
            return Err(Error::corruption("blob record overruns the record region"));
        }

        // The file cursor sits right after the header.
        let mut payload = vec![0u8; header.compressed_len as usize];
        self.file.read_exact(&mut payload)?;

        let record = self.decoder.decode_record(&header_buf, &payload)?;
        Ok((BlobHandle::new(offset, size), record))
    }

    fn read_record_header(&mut self, offset: u64) -> Result<[u8; RECORD_HEADER_SIZE]> {
        if offset + RECORD_HEADER_SIZE as u64 > self.records_end {
            return Err(Error::corruption("truncated blob record header"));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Whether the cursor references a decoded record.
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// The sticky iterator status.
    pub fn status(&self) -> Result<()> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Key of the current record. Panics if the iterator is not valid.
    pub fn key(&self) -> &[u8] {
        &self.current.as_ref().unwrap().record.key
    }

    /// Value of the current record. Panics if the iterator is not valid.
    pub fn value(&self) -> &[u8] {
        &self.current.as_ref().unwrap().record.value
    }

    /// Locator for the current record. Panics if the iterator is not valid.
    pub fn blob_index(&self) -> BlobIndex {
        BlobIndex::new(self.file_number, self.current.as_ref().unwrap().handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_rejects_tiny_file() {
        let temp_file = NamedTempFile::new().unwrap();
        temp_file.as_file().write_all(b"short").unwrap();
        assert!(BlobFileIterator::open(temp_file.path(), 1).is_err());
    }

    #[test]
    fn test_open_rejects_garbage() {
        let temp_file = NamedTempFile::new().unwrap();
        temp_file.as_file().write_all(&[0xABu8; 128]).unwrap();
        let result = BlobFileIterator::open(temp_file.path(), 1);
        assert!(matches!(result, Err(Error::Corruption(_))));
    }
}
