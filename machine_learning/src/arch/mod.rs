pub mod activations;
mod features;
mod model;

pub use features::{DEFAULT_RANGE, RandomFeatureMap};
pub use model::Model;
