use ndarray::{ArrayView1, ArrayView2};

use crate::{MlErr, Result};

/// How close a target must be to `1` to count as a positive sample.
const POSITIVE_TOLERANCE: f64 = 1e-7;

/// Confusion counts of a single output classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub true_pos: usize,
    pub false_pos: usize,
    pub false_neg: usize,
    pub true_neg: usize,
}

impl Confusion {
    /// Tallies the predictions in `scores` against the targets in `y`.
    ///
    /// A row is predicted positive iff its score is strictly above `threshold` and it is
    /// positive iff its target is `1`.
    pub fn tally(scores: ArrayView1<f64>, y: ArrayView1<f64>, threshold: f64) -> Self {
        let mut confusion = Self::default();

        for (&score, &target) in scores.iter().zip(y.iter()) {
            let predicted = score > threshold;
            let actual = (target - 1.).abs() < POSITIVE_TOLERANCE;

            match (predicted, actual) {
                (true, true) => confusion.true_pos += 1,
                (true, false) => confusion.false_pos += 1,
                (false, true) => confusion.false_neg += 1,
                (false, false) => confusion.true_neg += 1,
            }
        }

        confusion
    }

    pub fn total(&self) -> usize {
        self.true_pos + self.false_pos + self.false_neg + self.true_neg
    }
}

/// The result of evaluating a model against labeled data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistics {
    Binary {
        accuracy: f64,
        detection_rate: f64,
        false_alarm_rate: f64,
    },
    Multiclass {
        accuracy: f64,
    },
}

impl Statistics {
    /// Compares `scores` against the ground truth `y`.
    ///
    /// Single column inputs are treated as a binary problem, anything wider as one-hot
    /// multiclass where the predicted and true classes are the row argmax.
    ///
    /// # Returns
    /// The statistics, a `SizeMismatch` if the shapes differ, or `DegenerateEvaluation` if any
    /// rate would divide by zero.
    pub fn compute(scores: ArrayView2<f64>, y: ArrayView2<f64>, threshold: f64) -> Result<Self> {
        if scores.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "evaluation samples",
                got: y.nrows(),
                expected: scores.nrows(),
            });
        }
        if scores.ncols() != y.ncols() {
            return Err(MlErr::SizeMismatch {
                what: "evaluation outputs",
                got: y.ncols(),
                expected: scores.ncols(),
            });
        }
        if y.nrows() == 0 {
            return Err(MlErr::DegenerateEvaluation {
                statistic: "accuracy",
            });
        }

        if y.ncols() == 1 {
            let confusion = Confusion::tally(scores.column(0), y.column(0), threshold);
            return Self::binary(confusion);
        }

        let hits = scores
            .rows()
            .into_iter()
            .zip(y.rows())
            .filter(|(score, target)| argmax(*score) == argmax(*target))
            .count();

        Ok(Self::Multiclass {
            accuracy: hits as f64 / y.nrows() as f64,
        })
    }

    /// Derives the binary rates from the confusion counts.
    pub fn binary(confusion: Confusion) -> Result<Self> {
        let Confusion {
            true_pos,
            false_pos,
            false_neg,
            true_neg,
        } = confusion;

        let ratio = |num: usize, den: usize, statistic| {
            if den == 0 {
                return Err(MlErr::DegenerateEvaluation { statistic });
            }
            Ok(num as f64 / den as f64)
        };

        Ok(Self::Binary {
            accuracy: ratio(true_pos + true_neg, confusion.total(), "accuracy")?,
            detection_rate: ratio(true_pos, true_pos + false_neg, "detection rate")?,
            false_alarm_rate: ratio(false_pos, false_pos + true_neg, "false alarm rate")?,
        })
    }

    pub fn accuracy(&self) -> f64 {
        match *self {
            Self::Binary { accuracy, .. } | Self::Multiclass { accuracy } => accuracy,
        }
    }

    /// Flattens the statistics: `[accuracy, detection_rate, false_alarm_rate]` for binary
    /// problems, `[accuracy]` otherwise.
    pub fn to_vec(&self) -> Vec<f64> {
        match *self {
            Self::Binary {
                accuracy,
                detection_rate,
                false_alarm_rate,
            } => vec![accuracy, detection_rate, false_alarm_rate],
            Self::Multiclass { accuracy } => vec![accuracy],
        }
    }
}

/// Returns the index of the largest value, ties go to the lowest index.
pub fn argmax(row: ArrayView1<f64>) -> usize {
    let mut best = 0;

    for (i, &v) in row.iter().enumerate().skip(1) {
        if v > row[best] {
            best = i;
        }
    }

    best
}
