use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Uninitialized,
    SingularMatrix {
        dim: usize,
        pivot: usize,
    },
    TrainingFailed {
        dim: usize,
        pivot: usize,
    },
    UpdateFailed {
        batch_size: usize,
        pivot: usize,
    },
    InsufficientSamples {
        got: usize,
        expected: usize,
    },
    DegenerateEvaluation {
        statistic: &'static str,
    },
    CorruptSnapshot {
        field: &'static str,
        reason: String,
    },
    InvalidParameter {
        what: &'static str,
        value: f64,
    },
    FrozenParameter {
        what: &'static str,
    },
    Io(io::Error),
}

impl MlErr {
    /// Shorthand for building a `CorruptSnapshot` error.
    pub(crate) fn corrupt(field: &'static str, reason: impl Into<String>) -> Self {
        Self::CorruptSnapshot {
            field,
            reason: reason.into(),
        }
    }
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::Uninitialized => {
                write!(f, "The model has not been trained yet, its dimensions are unknown")
            }
            MlErr::SingularMatrix { dim, pivot } => write!(
                f,
                "The {dim}x{dim} system is not positive definite, the decomposition broke down at pivot {pivot}"
            ),
            MlErr::TrainingFailed { dim, pivot } => write!(
                f,
                "Training failed, the {dim}x{dim} regularized gram matrix is not positive definite (pivot {pivot}), try a larger regularization constant"
            ),
            MlErr::UpdateFailed { batch_size, pivot } => write!(
                f,
                "Sequential update failed, the {batch_size}x{batch_size} innovation matrix is not positive definite (pivot {pivot})"
            ),
            MlErr::InsufficientSamples { got, expected } => write!(
                f,
                "An unregularized initial batch needs at least {expected} samples (one per hidden unit), got {got}"
            ),
            MlErr::DegenerateEvaluation { statistic } => write!(
                f,
                "Cannot compute the {statistic}, its denominator is zero"
            ),
            MlErr::CorruptSnapshot { field, reason } => {
                write!(f, "Corrupt snapshot at field `{field}`: {reason}")
            }
            MlErr::InvalidParameter { what, value } => {
                write!(f, "Invalid value {value} for {what}")
            }
            MlErr::FrozenParameter { what } => write!(
                f,
                "The {what} can only be changed before the model is trained"
            ),
            MlErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
