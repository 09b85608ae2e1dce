use std::{io, num::NonZeroUsize};

use comms::{CheckpointSink, DirCheckpoint, MemoryCheckpoint};
use data_reader::{DataReader, InMemoryDataset, ReaderConfig, ReaderErr, ReaderRole};
use ndarray::Array2;

const NAME: &str = "train_reader";

fn reader(seed: u64) -> DataReader {
    let samples = Array2::from_shape_fn((37, 3), |(i, j)| (i + j) as f64);
    let mut config = ReaderConfig::new(NonZeroUsize::new(4).unwrap());
    config.seed = seed;
    config.set_validation_percent(0.2).unwrap();

    let source = Box::new(InMemoryDataset::new(samples));
    let mut reader = DataReader::new(config, ReaderRole::Train, source).unwrap();
    reader.load().unwrap();
    reader.setup(1, 8, 2, 0).unwrap();
    reader.plan_epoch();
    reader
}

fn assert_same_state(a: &DataReader, b: &DataReader) {
    assert_eq!(a.indices(), b.indices());
    assert_eq!(a.unused_indices(), b.unused_indices());
    assert_eq!(a.cursor(), b.cursor());
    assert_eq!(a.epoch(), b.epoch());
}

#[test]
fn restored_reader_resumes_exactly() {
    let mut original = reader(11);
    for _ in 0..6 {
        original.update();
    }

    let mut ckpt = MemoryCheckpoint::new();
    let written = original.save_checkpoint(&mut ckpt, NAME).unwrap();

    let mut restored = reader(99);
    let read = restored.load_checkpoint(&ckpt, NAME).unwrap();

    assert_eq!(written, read);
    assert_same_state(&original, &restored);

    // Future epochs must reshuffle the same way.
    for _ in 0..20 {
        assert_eq!(original.update(), restored.update());
        assert_eq!(original.mini_batch_indices(), restored.mini_batch_indices());
    }

    assert!(original.epoch() > 1);
    assert_same_state(&original, &restored);
}

#[test]
fn round_trip_through_a_directory() {
    let dir = std::env::temp_dir().join(format!("data-reader-ckpt-{}", std::process::id()));
    let mut ckpt = DirCheckpoint::create(&dir).unwrap();

    let mut original = reader(5);
    original.update();
    original.save_checkpoint(&mut ckpt, NAME).unwrap();

    let mut restored = reader(5);
    restored.load_checkpoint(&ckpt, NAME).unwrap();
    assert_same_state(&original, &restored);

    std::fs::remove_dir_all(dir).unwrap();
}

fn saved() -> (MemoryCheckpoint, DataReader) {
    let mut original = reader(3);
    original.update();

    let mut ckpt = MemoryCheckpoint::new();
    original.save_checkpoint(&mut ckpt, NAME).unwrap();
    (ckpt, original)
}

fn assert_corrupt(ckpt: &MemoryCheckpoint) {
    let mut target = reader(8);
    let before = target.cursor().clone();

    assert!(matches!(
        target.load_checkpoint(ckpt, NAME),
        Err(ReaderErr::CorruptState(_))
    ));
    assert_eq!(target.cursor(), &before);
}

#[test]
fn truncated_blob_is_corrupt() {
    let (mut ckpt, _) = saved();
    let blob = ckpt.blob_mut(NAME).unwrap();
    blob.truncate(blob.len() - 3);

    assert_corrupt(&ckpt);
}

#[test]
fn trailing_bytes_are_corrupt() {
    let (mut ckpt, _) = saved();
    ckpt.blob_mut(NAME).unwrap().push(0);

    assert_corrupt(&ckpt);
}

#[test]
fn inconsistent_index_count_is_corrupt() {
    let (mut ckpt, original) = saved();

    // magic, epoch, seed and the thirteen cursor fields precede the working set length.
    let at = 4 + 15 * 8;
    let len = (original.num_data() as u64 + 1).to_ne_bytes();
    ckpt.blob_mut(NAME).unwrap()[at..at + 8].copy_from_slice(&len);

    assert_corrupt(&ckpt);
}

#[test]
fn duplicated_index_is_corrupt() {
    let (mut ckpt, original) = saved();

    let first = 4 + 16 * 8;
    let blob = ckpt.blob_mut(NAME).unwrap();
    let dup = blob[first..first + 8].to_vec();
    blob[first + 8..first + 16].copy_from_slice(&dup);
    assert!(original.num_data() > 1);

    assert_corrupt(&ckpt);
}

#[test]
fn garbage_is_corrupt() {
    let mut ckpt = MemoryCheckpoint::new();
    ckpt.write_blob(NAME, b"definitely not a reader").unwrap();

    assert_corrupt(&ckpt);
}

#[test]
fn missing_blob_is_an_io_error() {
    let ckpt = MemoryCheckpoint::new();
    let mut target = reader(1);

    match target.load_checkpoint(&ckpt, NAME) {
        Err(ReaderErr::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
        other => panic!("expected a not found error, got {:?}", other.map(|_| ())),
    }
}
