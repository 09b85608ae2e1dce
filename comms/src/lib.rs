pub mod collective;
mod deserialize;
pub mod persist;
mod serialize;

pub use collective::{Communicator, LocalGroup, SelfComm, ThreadComm};
pub use deserialize::Deserialize;
pub use persist::{CheckpointSink, CheckpointSource, DirCheckpoint, MemoryCheckpoint};
pub use serialize::Serialize;

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();
