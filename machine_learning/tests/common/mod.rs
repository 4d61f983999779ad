#![allow(dead_code)]

use ndarray::{Array2, ArrayView1, s};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Draws `n` separable binary samples in `[-1, 1]^features`, `+1/-1` labels.
pub fn separable(n: usize, features: usize, seed: u64) -> (Array2<f64>, Array2<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal: Vec<f64> = (0..features).map(|i| 1. / (i + 1) as f64).collect();

    let mut x = Array2::zeros((n, features));
    let mut y = Array2::zeros((n, 1));

    let mut i = 0;
    while i < n {
        let row: Vec<f64> = (0..features).map(|_| rng.random_range(-1.0..=1.0)).collect();
        let margin = ArrayView1::from(&row).dot(&ArrayView1::from(&normal));
        if margin.abs() < 0.1 {
            continue;
        }

        x.row_mut(i).assign(&ArrayView1::from(&row));
        y[[i, 0]] = margin.signum();
        i += 1;
    }

    (x, y)
}

/// Splits the rows of `x` and `y` in consecutive batches of `size`.
pub fn batches<'a>(
    x: &'a Array2<f64>,
    y: &'a Array2<f64>,
    size: usize,
) -> impl Iterator<Item = (ndarray::ArrayView2<'a, f64>, ndarray::ArrayView2<'a, f64>)> {
    (0..x.nrows()).step_by(size).map(move |start| {
        let end = (start + size).min(x.nrows());
        (x.slice(s![start..end, ..]), y.slice(s![start..end, ..]))
    })
}

pub fn max_abs_diff(a: ndarray::ArrayView2<f64>, b: ndarray::ArrayView2<f64>) -> f64 {
    assert_eq!(a.dim(), b.dim());
    a.iter()
        .zip(b.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0., f64::max)
}
