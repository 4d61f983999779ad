use std::{error::Error, fmt, io};

/// The dataset module's result type.
pub type Result<T> = std::result::Result<T, DataErr>;

/// Failures while reading or preparing a dataset.
#[derive(Debug)]
pub enum DataErr {
    Io(io::Error),
    BadMagic {
        expected: u32,
        got: u32,
    },
    Truncated {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    CountMismatch {
        images: usize,
        labels: usize,
    },
    LabelOutOfRange {
        label: u8,
        num_classes: usize,
    },
    EmptyClassSet,
}

impl fmt::Display for DataErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataErr::Io(e) => write!(f, "io error: {e}"),
            DataErr::BadMagic { expected, got } => {
                write!(f, "bad magic number: got {got}, expected {expected}")
            }
            DataErr::Truncated {
                what,
                got,
                expected,
            } => write!(f, "truncated {what}: got {got} bytes, expected {expected}"),
            DataErr::CountMismatch { images, labels } => {
                write!(f, "there are {images} images but {labels} labels")
            }
            DataErr::LabelOutOfRange { label, num_classes } => {
                write!(f, "label {label} is out of range for {num_classes} classes")
            }
            DataErr::EmptyClassSet => write!(f, "the class set is empty"),
        }
    }
}

impl Error for DataErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DataErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DataErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
