//! Blob file sink.
//!
//! A thin appender that tracks the write cursor: the builder captures the
//! cursor before each append to produce record handles, so the sink must
//! account for every byte it accepts.

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Append-only sink for one blob file.
///
/// One builder owns exclusive write access to one sink for its lifetime.
/// `finish` only flushes; durability syncs are left to the caller so they
/// can be batched across files.
pub struct BlobFileWriter<W: Write> {
    inner: W,
    offset: u64,
}

impl BlobFileWriter<BufWriter<File>> {
    /// Create (truncating) a blob file at `path` with a buffered sink.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }

    /// Flush buffered bytes and fsync the file.
    pub fn sync(&mut self) -> Result<()> {
        self.inner.flush()?;
        self.inner.get_ref().sync_all()?;
        Ok(())
    }
}

impl<W: Write> BlobFileWriter<W> {
    /// Wrap an arbitrary sink, starting the write cursor at zero.
    pub fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    /// Append bytes, advancing the write cursor.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        self.offset += data.len() as u64;
        Ok(())
    }

    /// Flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Bytes appended so far; the offset the next append lands at.
    pub fn file_size(&self) -> u64 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_append_tracks_offset() {
        let mut writer = BlobFileWriter::new(Vec::new());
        assert_eq!(writer.file_size(), 0);

        writer.append(b"hello").unwrap();
        assert_eq!(writer.file_size(), 5);

        writer.append(b" world").unwrap();
        assert_eq!(writer.file_size(), 11);
    }

    #[test]
    fn test_create_and_sync() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut writer = BlobFileWriter::create(temp_file.path()).unwrap();

        writer.append(b"data").unwrap();
        writer.sync().unwrap();

        assert_eq!(std::fs::read(temp_file.path()).unwrap(), b"data");
    }

    #[test]
    fn test_flush_pushes_to_inner() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut writer = BlobFileWriter::create(temp_file.path()).unwrap();

        writer.append(b"abc").unwrap();
        writer.flush().unwrap();

        assert_eq!(std::fs::read(temp_file.path()).unwrap().len(), 3);
    }
}
