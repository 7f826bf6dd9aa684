mod dense;
mod layer;

pub use dense::{Dense, DenseCache};
pub use layer::Layer;
