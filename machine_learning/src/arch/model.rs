use ndarray::{Array2, ArrayView2};

use crate::{error::Result, training::Statistics};

/// A batch trainable scorer.
///
/// Any type that can fit its parameters to a whole batch of samples and then score new samples
/// gets `evaluate` for free.
pub trait Model {
    /// Fits the model to the given batch, replacing whatever was learned before.
    ///
    /// # Arguments
    /// * `x` - The inputs, one sample per row.
    /// * `y` - The targets, one sample per row.
    fn train(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()>;

    /// Computes the model output for every row of `x`.
    ///
    /// # Returns
    /// An owned `x.nrows() x num_classes` score matrix.
    fn score(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Scores `x` and compares the result against the ground truth `y`.
    ///
    /// # Arguments
    /// * `x` - The inputs, one sample per row.
    /// * `y` - The expected outputs, `+1` marks the positive class.
    /// * `threshold` - The decision threshold for single output models.
    ///
    /// # Returns
    /// Accuracy, detection and false alarm rates for single output models, accuracy alone
    /// otherwise.
    fn evaluate(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
        threshold: f64,
    ) -> Result<Statistics> {
        let scores = self.score(x)?;
        Statistics::compute(scores.view(), y, threshold)
    }
}
