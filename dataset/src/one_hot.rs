use ndarray::Array2;

use crate::{DataErr, Result};

/// Expands class ids into a `labels.len() x num_classes` target matrix with `+1` at the class
/// and `-1` everywhere else.
pub fn one_hot(labels: &[u8], num_classes: usize) -> Result<Array2<f64>> {
    if num_classes == 0 {
        return Err(DataErr::EmptyClassSet);
    }

    let mut y = Array2::from_elem((labels.len(), num_classes), -1.);
    for (i, &label) in labels.iter().enumerate() {
        if label as usize >= num_classes {
            return Err(DataErr::LabelOutOfRange { label, num_classes });
        }
        y[[i, label as usize]] = 1.;
    }

    Ok(y)
}
