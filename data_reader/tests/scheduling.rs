use std::{collections::HashSet, num::NonZeroUsize};

use data_reader::{
    CursorState, DataReader, InMemoryDataset, ReaderConfig, ReaderErr, ReaderPartition,
    ReaderRole, StrideParams,
};
use ndarray::Array2;

fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn dataset(n: usize) -> Box<InMemoryDataset> {
    let samples = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
    Box::new(InMemoryDataset::new(samples))
}

fn loaded(n: usize, config: ReaderConfig) -> DataReader {
    let mut reader = DataReader::new(config, ReaderRole::Train, dataset(n)).unwrap();
    reader.load().unwrap();
    reader
}

fn assert_partition(reader: &DataReader, total: usize) {
    let used: HashSet<_> = reader.indices().iter().copied().collect();
    let unused: HashSet<_> = reader.unused_indices().iter().copied().collect();

    assert!(used.is_disjoint(&unused));
    assert_eq!(used.len(), reader.num_data());
    assert_eq!(unused.len(), reader.num_unused_data());
    assert_eq!(used.len() + unused.len(), total);
}

#[test]
fn subset_selection_keeps_a_partition() {
    let cases = [
        (None, None, None),
        (Some(0.5), None, None),
        (Some(0.33), Some(0.1), None),
        (None, Some(1.0), None),
        (None, Some(0.0), Some(37)),
        (Some(1.0), Some(0.25), None),
        (None, None, Some(100)),
    ];

    for (use_percent, validation_percent, max_count) in cases {
        let mut config = ReaderConfig::new(nz(8));
        config.use_percent = use_percent;
        config.validation_percent = validation_percent;
        config.max_sample_count = max_count;

        let mut reader = loaded(100, config);
        assert_partition(&reader, 100);

        reader.use_unused_index_set();
        let remaining = reader.num_data();
        assert_partition(&reader, remaining);
        assert_eq!(reader.num_unused_data(), 0);
    }
}

#[test]
fn subset_selection_is_deterministic() {
    let mut config = ReaderConfig::new(nz(8));
    config.seed = 7;
    config.set_use_percent(0.6).unwrap();
    config.set_validation_percent(0.2).unwrap();

    let a = loaded(50, config.clone());
    let b = loaded(50, config);

    assert_eq!(a.indices(), b.indices());
    assert_eq!(a.unused_indices(), b.unused_indices());
    assert_eq!((a.num_data(), a.num_unused_data()), (24, 26));
}

#[test]
fn invalid_subset_configurations_are_rejected() {
    let mut config = ReaderConfig::new(nz(8));
    assert!(matches!(config.set_use_percent(1.5), Err(ReaderErr::Configuration(_))));
    assert!(matches!(config.set_validation_percent(-0.1), Err(ReaderErr::Configuration(_))));
    assert!(config.set_use_percent(f64::NAN).is_err());

    config.set_max_sample_count(11);
    let mut reader = DataReader::new(config, ReaderRole::Train, dataset(10)).unwrap();
    assert!(matches!(reader.load(), Err(ReaderErr::Configuration(_))));

    let config: ReaderConfig = serde_json::from_str(r#"{ "batch_size": 4, "use_percent": 2.0 }"#).unwrap();
    assert!(DataReader::new(config, ReaderRole::Train, dataset(10)).is_err());
}

#[test]
fn failed_load_leaves_the_reader_untouched() {
    let mut config = ReaderConfig::new(nz(4));
    config.set_max_sample_count(20);
    let mut reader = DataReader::new(config, ReaderRole::Train, dataset(10)).unwrap();

    assert!(matches!(reader.load(), Err(ReaderErr::Configuration(_))));
    assert_eq!((reader.num_data(), reader.num_unused_data()), (0, 0));
    assert_eq!(reader.epoch(), 0);
    assert_eq!(reader.position(), 0);
}

#[test]
fn unused_set_is_walked_whole_after_a_planned_epoch() {
    let mut config = ReaderConfig::new(nz(2));
    config.set_max_sample_count(3);
    let mut reader = loaded(13, config);
    reader.setup_default().unwrap();
    reader.plan_epoch();

    let mut expected = reader.unused_indices().to_vec();
    expected.sort_unstable();

    reader.use_unused_index_set();
    assert_eq!(reader.num_iterations_per_epoch(), 5);
    assert_eq!(reader.cursor().last_mini_batch_threshold(), 8);

    let mut seen = reader.mini_batch_indices();
    while !reader.update() {
        seen.extend(reader.mini_batch_indices());
    }

    seen.sort_unstable();
    assert_eq!(seen, expected);
}

#[test]
fn offset_past_a_small_working_set_is_already_at_the_epoch_end() {
    let mut reader = loaded(4, ReaderConfig::new(nz(2)));
    reader.setup(6, 8, 1, 0).unwrap();

    assert_eq!(reader.position(), 4);
    assert_eq!(reader.state(), CursorState::EpochEnd);
    assert!(reader.mini_batch_indices().is_empty());

    assert!(reader.update());
    assert!(reader.position() <= reader.num_data());
}

#[test]
fn update_is_monotonic_within_an_epoch() {
    let mut reader = loaded(23, ReaderConfig::new(nz(4)));
    reader.setup_default().unwrap();
    assert!(reader.at_new_epoch());

    let mut last = reader.position();
    let mut steps = 1;

    while !reader.update() {
        assert!(reader.position() > last);
        assert!(reader.position_valid());
        assert!(!reader.at_new_epoch());
        last = reader.position();
        steps += 1;
    }

    assert_eq!(steps, 6);
    assert_eq!(reader.position(), 0);
    assert!(reader.at_new_epoch());
    assert_eq!(reader.epoch(), 1);
}

#[test]
fn last_mini_batch_uses_its_own_stride() {
    let mut config = ReaderConfig::new(nz(10));
    config.shuffle = false;
    let mut reader = loaded(105, config);
    reader.setup(0, 10, 1, 0).unwrap();
    reader.set_last_mini_batch_threshold(100);
    reader.set_last_mini_batch_size(5);
    reader.set_last_mini_batch_stride(5).unwrap();

    for _ in 0..10 {
        assert_eq!(reader.state(), CursorState::Ready);
        assert_eq!(reader.current_mini_batch_size(), 10);
        assert!(!reader.update());
    }

    assert_eq!(reader.position(), 100);
    assert_eq!(reader.cursor().current_mini_batch_idx(), 10);
    assert_eq!(reader.state(), CursorState::LastBatch);
    assert_eq!(reader.current_mini_batch_size(), 5);
    assert_eq!(reader.next_position(), 105);
    assert_eq!(reader.mini_batch_indices(), [100, 101, 102, 103, 104]);

    assert!(reader.update());
    assert_eq!(reader.position(), 0);
    assert_eq!(reader.state(), CursorState::Ready);
}

#[test]
fn planned_epoch_matches_the_configured_iteration_count() {
    let mut reader = loaded(105, ReaderConfig::new(nz(10)));
    reader.setup_default().unwrap();

    let plan = reader.plan_epoch();
    assert_eq!(plan.last_mini_batch_threshold, 100);
    assert_eq!(plan.last_mini_batch_size, 5);

    assert!(reader.set_num_iterations_per_epoch(11).is_ok());
    assert!(matches!(
        reader.set_num_iterations_per_epoch(10),
        Err(ReaderErr::Configuration(_))
    ));
    assert_eq!(reader.num_iterations_per_epoch(), 11);
}

#[test]
fn zero_strides_fail_fast() {
    let mut reader = loaded(10, ReaderConfig::new(nz(2)));

    assert!(matches!(reader.setup(0, 0, 1, 0), Err(ReaderErr::Configuration(_))));
    assert!(matches!(reader.setup(0, 2, 0, 0), Err(ReaderErr::Configuration(_))));
}

fn epoch_of(partition: ReaderPartition, layout: fn(ReaderPartition, usize) -> StrideParams) -> Vec<usize> {
    const N: usize = 50;
    const BATCH_SIZE: usize = 4;

    let mut config = ReaderConfig::new(nz(BATCH_SIZE));
    config.seed = 3;
    let mut reader = loaded(N, config);
    reader.setup_partition(layout(partition, BATCH_SIZE)).unwrap();
    reader.plan_epoch();

    let mut seen = reader.mini_batch_indices();
    while !reader.update() {
        seen.extend(reader.mini_batch_indices());
    }

    seen
}

fn assert_readers_cover(layout: fn(ReaderPartition, usize) -> StrideParams) {
    let (num_readers, num_models) = (nz(3), nz(2));
    let mut all = Vec::new();

    for model_id in 0..num_models.get() {
        for reader_id in 0..num_readers.get() {
            let partition = ReaderPartition::new(reader_id, num_readers, model_id, num_models).unwrap();
            all.extend(epoch_of(partition, layout));
        }
    }

    let unique: HashSet<_> = all.iter().copied().collect();
    assert_eq!(unique.len(), all.len(), "a sample was read twice");
    assert_eq!(unique, (0..50).collect());
}

#[test]
fn blocked_readers_are_disjoint_and_cover_the_epoch() {
    assert_readers_cover(ReaderPartition::blocked);
}

#[test]
fn interleaved_readers_are_disjoint_and_cover_the_epoch() {
    assert_readers_cover(ReaderPartition::interleaved);
}
