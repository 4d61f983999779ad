mod error;
pub mod idx;
mod labelled;
mod one_hot;

pub use error::{DataErr, Result};
pub use labelled::Dataset;
pub use one_hot::one_hot;
