pub mod arch;
pub mod error;
pub mod snapshot;
pub mod solver;
pub mod training;

pub use error::{MlErr, Result};
pub use training::{Elm, Oselm, Statistics};
