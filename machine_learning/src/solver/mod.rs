mod cholesky;

pub use cholesky::{Cholesky, solve};
