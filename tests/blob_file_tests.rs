// Integration tests for the blob file write, read, and merge paths.

use bloblog::blob::format::BlobFileFooter;
use bloblog::blob::meta::{read_raw_block, MetaIndexBlock};
use bloblog::blob::{COMPRESSION_DICT_BLOCK, FOOTER_SIZE, RECORD_HEADER_SIZE};
use bloblog::{
    BlobFileBuilder, BlobFileIterator, BlobFileMergeIterator, BlobFileOptions, BlobFileWriter,
    BlobIndex, BlobRecord, BytewiseComparator, CompressionType,
};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const MIN_BLOB_SIZE: usize = 64;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn gen_key(i: u64) -> Vec<u8> {
    format!("k-{:08}", i).into_bytes()
}

// Values alternate around the out-of-line threshold, like the host engine
// produces at the min-blob-size boundary.
fn gen_value(i: u64) -> Vec<u8> {
    if i % 2 == 0 {
        vec![b'v'; MIN_BLOB_SIZE - 1]
    } else {
        vec![b'v'; MIN_BLOB_SIZE + 1]
    }
}

fn test_options() -> BlobFileOptions {
    BlobFileOptions::default().min_blob_size(MIN_BLOB_SIZE as u64)
}

fn build_blob_file(
    dir: &TempDir,
    file_number: u64,
    options: BlobFileOptions,
    keys: impl Iterator<Item = u64>,
) -> (PathBuf, Vec<BlobIndex>) {
    let path = dir.path().join(format!("{:06}.blob", file_number));
    let mut file = BlobFileWriter::create(&path).unwrap();
    let mut builder = BlobFileBuilder::new(options, file_number, &mut file).unwrap();

    let mut indices = Vec::new();
    for i in keys {
        let record = BlobRecord::new(gen_key(i), gen_value(i));
        indices.extend(builder.add(&record).unwrap());
    }
    indices.extend(builder.finish().unwrap());
    file.sync().unwrap();

    (path, indices)
}

#[test]
fn test_sequential_scan_round_trip() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let n = 1000u64;
    let (path, indices) = build_blob_file(&dir, 1, test_options(), 0..n);
    assert_eq!(indices.len() as u64, n);

    let mut iter = BlobFileIterator::open(&path, 1).unwrap();
    iter.seek_to_first();
    for i in 0..n {
        assert!(iter.advance().unwrap());
        assert!(iter.valid());
        assert_eq!(iter.key(), gen_key(i).as_slice());
        assert_eq!(iter.value(), gen_value(i).as_slice());
        // Each replayed handle matches the one reported at write time.
        assert_eq!(iter.blob_index(), indices[i as usize]);
    }
    assert!(!iter.advance().unwrap());
    assert!(!iter.valid());
    iter.status().unwrap();
}

#[test]
fn test_round_trip_with_zstd_compression() {
    let dir = TempDir::new().unwrap();
    let options = test_options().compression(CompressionType::Zstd);
    let (path, indices) = build_blob_file(&dir, 3, options, 0..200);

    let mut iter = BlobFileIterator::open(&path, 3).unwrap();
    iter.seek_to_first();
    for i in 0..200u64 {
        assert!(iter.advance().unwrap());
        assert_eq!(iter.key(), gen_key(i).as_slice());
        assert_eq!(iter.value(), gen_value(i).as_slice());
        assert_eq!(iter.blob_index(), indices[i as usize]);
    }
    assert!(!iter.advance().unwrap());
}

#[test]
fn test_round_trip_with_snappy_compression() {
    let dir = TempDir::new().unwrap();
    let options = test_options().compression(CompressionType::Snappy);
    let (path, _) = build_blob_file(&dir, 4, options, 0..100);

    let mut iter = BlobFileIterator::open(&path, 4).unwrap();
    iter.seek_to_first();
    let mut count = 0;
    while iter.advance().unwrap() {
        count += 1;
    }
    assert_eq!(count, 100);
}

#[test]
fn test_dictionary_mode_round_trip() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let n = 300u64;
    // A small training budget so the buffered -> unbuffered transition
    // happens mid-stream: records added before and after it must both be
    // retrievable identically.
    let options = test_options()
        .compression(CompressionType::Zstd)
        .max_dict_bytes(16 * 1024)
        .max_train_bytes(2 * 1024);
    let (path, indices) = build_blob_file(&dir, 9, options, 0..n);

    assert_eq!(indices.len() as u64, n);
    for pair in indices.windows(2) {
        assert!(pair[0].blob_handle.offset < pair[1].blob_handle.offset);
    }

    let mut iter = BlobFileIterator::open(&path, 9).unwrap();
    iter.seek_to_first();
    for i in 0..n {
        assert!(iter.advance().unwrap());
        assert_eq!(iter.key(), gen_key(i).as_slice());
        assert_eq!(iter.value(), gen_value(i).as_slice());
        assert_eq!(iter.blob_index(), indices[i as usize]);
    }
    assert!(!iter.advance().unwrap());
}

#[test]
fn test_dictionary_block_referenced_by_footer_and_meta_index() {
    let dir = TempDir::new().unwrap();
    let options = test_options()
        .compression(CompressionType::Zstd)
        .max_dict_bytes(16 * 1024)
        .max_train_bytes(2 * 1024);
    let (path, _) = build_blob_file(&dir, 5, options, 0..300);

    let mut file = std::fs::File::open(&path).unwrap();
    let file_size = file.metadata().unwrap().len();
    file.seek(SeekFrom::Start(file_size - FOOTER_SIZE as u64)).unwrap();
    let footer = BlobFileFooter::read_from(&mut file).unwrap();

    assert!(!footer.meta_index_handle.is_null());
    assert!(!footer.uncompression_dict_handle.is_null());

    // The meta-index maps the dictionary block name to the same handle the
    // footer carries, and the dictionary block itself reads back cleanly.
    let meta_data = read_raw_block(&mut file, &footer.meta_index_handle).unwrap();
    let meta_index = MetaIndexBlock::decode(&meta_data).unwrap();
    assert_eq!(meta_index.len(), 1);
    assert_eq!(
        meta_index.get(COMPRESSION_DICT_BLOCK),
        Some(footer.uncompression_dict_handle)
    );
    read_raw_block(&mut file, &footer.uncompression_dict_handle).unwrap();
}

#[test]
fn test_file_without_dictionary_has_null_footer_handles() {
    let dir = TempDir::new().unwrap();
    let (path, _) = build_blob_file(&dir, 6, test_options(), 0..10);

    let mut file = std::fs::File::open(&path).unwrap();
    let file_size = file.metadata().unwrap().len();
    file.seek(SeekFrom::Start(file_size - FOOTER_SIZE as u64)).unwrap();
    let footer = BlobFileFooter::read_from(&mut file).unwrap();

    assert!(footer.meta_index_handle.is_null());
    assert!(footer.uncompression_dict_handle.is_null());
}

#[test]
fn test_seek_for_prev() {
    use rand::Rng;
    let dir = TempDir::new().unwrap();
    let n = 1000u64;
    let (path, indices) = build_blob_file(&dir, 2, test_options(), 0..n);
    let mut iter = BlobFileIterator::open(&path, 2).unwrap();

    // Resume from the middle record's exact offset and drain to the end.
    let mid = (n / 2) as usize;
    iter.seek_for_prev(indices[mid].blob_handle.offset).unwrap();
    for i in mid..n as usize {
        assert!(iter.advance().unwrap());
        assert!(iter.valid());
        assert_eq!(iter.blob_index(), indices[i]);
        assert_eq!(iter.key(), gen_key(i as u64).as_slice());
        assert_eq!(iter.value(), gen_value(i as u64).as_slice());
    }
    assert!(!iter.advance().unwrap());

    let mut rng = rand::rng();

    // An offset at a record's start lands on that record.
    let idx = rng.random_range(0..n) as usize;
    iter.seek_for_prev(indices[idx].blob_handle.offset).unwrap();
    assert!(iter.advance().unwrap());
    assert_eq!(iter.blob_index(), indices[idx]);

    // An offset one byte into a record still lands on that record.
    let idx = rng.random_range(0..n) as usize;
    iter.seek_for_prev(indices[idx].blob_handle.offset + 1).unwrap();
    assert!(iter.advance().unwrap());
    assert_eq!(iter.blob_index(), indices[idx]);

    // An offset inside the previous record's payload lands on that previous
    // record.
    let idx = rng.random_range(1..n) as usize;
    iter.seek_for_prev(indices[idx].blob_handle.offset - RECORD_HEADER_SIZE as u64 - 1)
        .unwrap();
    assert!(iter.advance().unwrap());
    assert_eq!(iter.blob_index(), indices[idx - 1]);
}

#[test]
fn test_seek_for_prev_out_of_bounds() {
    let dir = TempDir::new().unwrap();
    let (path, indices) = build_blob_file(&dir, 2, test_options(), 0..10);
    let mut iter = BlobFileIterator::open(&path, 2).unwrap();

    let last = indices.last().unwrap().blob_handle;
    let result = iter.seek_for_prev(last.offset + last.size);
    assert!(matches!(result, Err(bloblog::Error::InvalidArgument(_))));
    assert!(!iter.valid());
    assert!(iter.status().is_err());
}

#[test]
fn test_merge_partitioned_files() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let n = 1000u64;
    let files = 10u64;

    // Round-robin partition: each file is internally sorted, the union is
    // the full key set.
    let mut iters = Vec::new();
    let mut index_of_key = vec![BlobIndex::default(); n as usize];
    for f in 0..files {
        let keys: Vec<u64> = (0..n).filter(|i| i % files == f).collect();
        let (path, indices) = build_blob_file(&dir, f + 1, test_options(), keys.iter().copied());
        for (key, index) in keys.iter().zip(indices) {
            index_of_key[*key as usize] = index;
        }
        iters.push(BlobFileIterator::open(&path, f + 1).unwrap());
    }

    let mut merge = BlobFileMergeIterator::new(iters, Arc::new(BytewiseComparator));
    merge.seek_to_first().unwrap();
    let mut i = 0u64;
    while merge.valid() {
        merge.status().unwrap();
        assert_eq!(merge.key(), gen_key(i).as_slice());
        assert_eq!(merge.value(), gen_value(i).as_slice());
        assert_eq!(merge.blob_index(), index_of_key[i as usize]);
        merge.advance().unwrap();
        i += 1;
    }
    // No duplicates, no omissions.
    assert_eq!(i, n);
}

#[test]
fn test_corruption_in_payload_detected() {
    let dir = TempDir::new().unwrap();
    let (path, indices) = build_blob_file(&dir, 8, test_options(), 0..10);

    // Flip one byte inside the sixth record's payload.
    let target = indices[5].blob_handle.offset + RECORD_HEADER_SIZE as u64 + 2;
    corrupt_byte(&path, target);

    let mut iter = BlobFileIterator::open(&path, 8).unwrap();
    iter.seek_to_first();
    for i in 0..5u64 {
        assert!(iter.advance().unwrap());
        assert_eq!(iter.key(), gen_key(i).as_slice());
    }

    let err = iter.advance().unwrap_err();
    assert!(matches!(err, bloblog::Error::ChecksumMismatch { .. }));
    assert!(!iter.valid());
    assert!(iter.status().is_err());

    // The error is sticky.
    assert!(iter.advance().is_err());
    assert!(iter.status().is_err());
}

#[test]
fn test_corruption_in_record_header_detected() {
    let dir = TempDir::new().unwrap();
    let (path, indices) = build_blob_file(&dir, 8, test_options(), 0..10);

    // Corrupt the length field of the fourth record's header.
    corrupt_byte(&path, indices[3].blob_handle.offset + 5);

    let mut iter = BlobFileIterator::open(&path, 8).unwrap();
    iter.seek_to_first();
    for _ in 0..3 {
        assert!(iter.advance().unwrap());
    }
    assert!(iter.advance().is_err());
    assert!(!iter.valid());
}

fn corrupt_byte(path: &PathBuf, offset: u64) {
    let mut file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&[0xFF]).unwrap();
}

#[test]
fn test_empty_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let (path, indices) = build_blob_file(&dir, 11, test_options(), std::iter::empty());
    assert!(indices.is_empty());

    let mut iter = BlobFileIterator::open(&path, 11).unwrap();
    iter.seek_to_first();
    assert!(!iter.advance().unwrap());
    assert!(!iter.valid());
    iter.status().unwrap();
}

#[test]
fn test_empty_file_with_dictionary_mode() {
    // Finishing a dictionary-mode file with no records still produces a
    // consistent (empty) dictionary block and meta-index.
    let dir = TempDir::new().unwrap();
    let options = test_options().compression(CompressionType::Zstd).max_dict_bytes(4096);
    let (path, indices) = build_blob_file(&dir, 12, options, std::iter::empty());
    assert!(indices.is_empty());

    let mut iter = BlobFileIterator::open(&path, 12).unwrap();
    iter.seek_to_first();
    assert!(!iter.advance().unwrap());
    iter.status().unwrap();
}

#[test]
fn test_abandoned_file_is_not_readable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("000013.blob");
    let mut file = BlobFileWriter::create(&path).unwrap();
    let mut builder = BlobFileBuilder::new(test_options(), 13, &mut file).unwrap();
    builder.add(&BlobRecord::new(gen_key(0), gen_value(0))).unwrap();
    builder.abandon();
    file.flush().unwrap();

    // No footer was written; the file must not open as a blob file.
    assert!(BlobFileIterator::open(&path, 13).is_err());
}
