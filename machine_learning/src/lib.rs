//! Distributed models and a finite difference gradient verifier.
//!
//! Weights are `DistMatrix`es spread element-cyclically over the participants of a
//! `comms::Communicator`, every pass over a model is a lock-step collective computation.

pub mod arch;
pub mod dist;
pub mod driver;
mod error;
pub mod gradient_check;
pub mod optimization;
pub mod weights;

pub use arch::ExecutionMode;
pub use dist::DistMatrix;
pub use error::{MlErr, Result};
pub use weights::Weights;
