mod dense;
mod input;
mod layer;

pub use dense::Dense;
pub use input::InputLayer;
pub use layer::{Layer, LayerRole};
