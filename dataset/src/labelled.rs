use std::{ops::Range, path::Path};

use log::info;
use ndarray::{Array2, ArrayView2, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{DataErr, Result, idx, one_hot};

/// Inputs paired with one-hot targets, one sample per row.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Array2<f64>,
    y: Array2<f64>,
}

impl Dataset {
    /// Pairs `images` with the one-hot expansion of `labels`.
    pub fn new(images: Array2<f64>, labels: &[u8], num_classes: usize) -> Result<Self> {
        if images.nrows() != labels.len() {
            return Err(DataErr::CountMismatch {
                images: images.nrows(),
                labels: labels.len(),
            });
        }

        Ok(Self {
            x: images,
            y: one_hot(labels, num_classes)?,
        })
    }

    /// Reads an IDX image file and its label file.
    pub fn load<P: AsRef<Path>>(images: P, labels: P, num_classes: usize) -> Result<Self> {
        let dataset = Self::new(
            idx::load_images(images.as_ref())?,
            &idx::load_labels(labels.as_ref())?,
            num_classes,
        )?;

        info!(
            "loaded {} samples of {} features from {}",
            dataset.len(),
            dataset.x.ncols(),
            images.as_ref().display()
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn x(&self) -> ArrayView2<'_, f64> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f64> {
        self.y.view()
    }

    /// Borrows the samples in `range`, clamped to the dataset length.
    pub fn rows(&self, range: Range<usize>) -> (ArrayView2<'_, f64>, ArrayView2<'_, f64>) {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        (
            self.x.slice(s![start..end, ..]),
            self.y.slice(s![start..end, ..]),
        )
    }

    /// Permutes the samples, keeping every input next to its target.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        self.x = self.x.select(Axis(0), &order);
        self.y = self.y.select(Axis(0), &order);
    }
}
