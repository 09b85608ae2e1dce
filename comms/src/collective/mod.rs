mod communicator;
mod self_comm;
mod thread_comm;

pub use communicator::Communicator;
pub use self_comm::SelfComm;
pub use thread_comm::{LocalGroup, ThreadComm};
