use std::{io, num::NonZeroUsize, thread};

use comms::{
    CheckpointSink, CheckpointSource, Communicator, Deserialize, LocalGroup, MemoryCheckpoint,
    SelfComm, Serialize,
    persist::{BlobReader, write_u64, write_u64_slice},
};

#[derive(Debug, PartialEq)]
struct Progress {
    step: u64,
    seen: Vec<u64>,
}

impl Serialize for Progress {
    fn serialize(&self, buf: &mut Vec<u8>) {
        write_u64(buf, self.step);
        write_u64_slice(buf, &self.seen);
    }
}

impl Deserialize for Progress {
    fn deserialize(buf: &[u8]) -> io::Result<Self> {
        let mut reader = BlobReader::new(buf);
        let step = reader.read_u64()?;
        let seen = reader.read_u64_slice()?;
        reader.finish()?;
        Ok(Self { step, seen })
    }
}

#[test]
fn serialize_through_a_checkpoint() {
    let progress = Progress {
        step: 12,
        seen: vec![3, 1, 4, 1, 5],
    };

    let mut buf = Vec::new();
    progress.serialize(&mut buf);

    let mut ckpt = MemoryCheckpoint::new();
    assert_eq!(ckpt.write_blob("progress", &buf).unwrap(), buf.len());

    let read = ckpt.read_blob("progress").unwrap();
    assert_eq!(Progress::deserialize(&read).unwrap(), progress);

    let err = Progress::deserialize(&read[..read.len() - 1]).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

/// Sums the ranks of the group through the trait object, as collaborators see it.
fn rank_sum(comm: &dyn Communicator) -> f64 {
    comm.all_reduce_scalar(comm.rank() as f64)
}

#[test]
fn communicators_are_interchangeable() {
    assert_eq!(rank_sum(&SelfComm), 0.);

    let comms = LocalGroup::new(NonZeroUsize::new(5).unwrap());
    let sums: Vec<f64> = thread::scope(|s| {
        let handles: Vec<_> = comms
            .iter()
            .map(|comm| s.spawn(move || rank_sum(comm)))
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sums, [10.; 5]);
}
