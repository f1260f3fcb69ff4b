//! Ordered merge across multiple blob files.
//!
//! Compaction and garbage collection replay key ranges that span several
//! blob files; each file is internally key-sorted, so a k-way merge over the
//! per-file iterators yields one globally ordered stream.

use crate::blob::format::BlobIndex;
use crate::blob::iterator::BlobFileIterator;
use crate::comparator::KeyComparator;
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::sync::Arc;

/// Merges several key-sorted blob file iterators into one ordered stream.
///
/// Equal keys across files break toward the lowest child index, so child
/// order is significant to callers. Children are advanced lazily: only the
/// source of the current record moves on `advance`, and exhausted children
/// drop out of selection for good.
///
/// Linear minimum selection per step; compaction fan-in is small enough that
/// a heap would not pay for itself.
pub struct BlobFileMergeIterator {
    children: Vec<BlobFileIterator>,
    comparator: Arc<dyn KeyComparator>,
    current: Option<usize>,
    error: Option<Error>,
}

impl BlobFileMergeIterator {
    /// Create a merge iterator over `children`.
    pub fn new(children: Vec<BlobFileIterator>, comparator: Arc<dyn KeyComparator>) -> Self {
        Self { children, comparator, current: None, error: None }
    }

    /// Seek every child to its first record, then select the smallest key.
    pub fn seek_to_first(&mut self) -> Result<()> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        for child in &mut self.children {
            child.seek_to_first();
            if let Err(e) = child.advance() {
                self.current = None;
                self.error = Some(e.clone());
                return Err(e);
            }
        }
        self.select_smallest();
        Ok(())
    }

    /// Advance the child that produced the current record, then re-select
    /// the smallest key among the children that still have records.
    pub fn advance(&mut self) -> Result<bool> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        let Some(active) = self.current else {
            return Ok(false);
        };
        if let Err(e) = self.children[active].advance() {
            self.current = None;
            self.error = Some(e.clone());
            return Err(e);
        }
        self.select_smallest();
        Ok(self.current.is_some())
    }

    fn select_smallest(&mut self) {
        let mut smallest: Option<usize> = None;
        for (idx, child) in self.children.iter().enumerate() {
            if !child.valid() {
                continue;
            }
            smallest = match smallest {
                None => Some(idx),
                Some(best) => {
                    // Strictly-less keeps the lowest index on ties.
                    if self.comparator.compare(child.key(), self.children[best].key())
                        == Ordering::Less
                    {
                        Some(idx)
                    } else {
                        Some(best)
                    }
                }
            };
        }
        self.current = smallest;
    }

    /// Whether a current record is selected.
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// The first error observed on this iterator or any child, sticky.
    pub fn status(&self) -> Result<()> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        for child in &self.children {
            child.status()?;
        }
        Ok(())
    }

    /// Key of the current record. Panics if the iterator is not valid.
    pub fn key(&self) -> &[u8] {
        self.children[self.current.unwrap()].key()
    }

    /// Value of the current record. Panics if the iterator is not valid.
    pub fn value(&self) -> &[u8] {
        self.children[self.current.unwrap()].value()
    }

    /// Locator of the current record. Panics if the iterator is not valid.
    pub fn blob_index(&self) -> BlobIndex {
        self.children[self.current.unwrap()].blob_index()
    }
}
