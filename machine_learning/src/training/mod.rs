mod elm;
mod oselm;
mod stats;

pub use elm::Elm;
pub use oselm::{Oselm, UNREGULARIZED};
pub use stats::{Confusion, Statistics, argmax};
