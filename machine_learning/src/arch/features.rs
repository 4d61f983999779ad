use log::debug;
use ndarray::{Array2, ArrayView2};
use ndarray_rand::RandomExt;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::Uniform;

use super::activations::ActFn;
use crate::{MlErr, Result};

/// The half width of the default initialization interval.
pub const DEFAULT_RANGE: f64 = 0.5;

/// The random hidden layer of an extreme learning machine.
///
/// Owns the generator used to draw the hidden weights so each model instance is reproducible on
/// its own, together with the initialization range and the activation applied after projecting.
#[derive(Debug, Clone)]
pub struct RandomFeatureMap {
    rng: StdRng,
    range: f64,
    act_fn: ActFn,
}

impl RandomFeatureMap {
    /// Creates a new `RandomFeatureMap` seeded from the thread local generator.
    ///
    /// # Returns
    /// A feature map with the default range and a `tanh` activation.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
            range: DEFAULT_RANGE,
            act_fn: ActFn::default(),
        }
    }

    /// Creates a new `RandomFeatureMap` with a fixed seed.
    ///
    /// # Arguments
    /// * `seed` - The seed for the weight generator.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new()
        }
    }

    /// Reseeds the weight generator, the next `initialize` becomes deterministic.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    /// Sets the half width of the interval the weights are drawn from.
    ///
    /// # Returns
    /// An error if `range` is negative or not finite.
    pub fn set_range(&mut self, range: f64) -> Result<()> {
        if !range.is_finite() || range < 0. {
            return Err(MlErr::InvalidParameter {
                what: "random init range",
                value: range,
            });
        }

        self.range = range;
        Ok(())
    }

    pub fn act_fn(&self) -> &ActFn {
        &self.act_fn
    }

    pub fn set_act_fn(&mut self, act_fn: ActFn) {
        self.act_fn = act_fn;
    }

    /// Draws a fresh weight matrix, every entry uniform in `[-range, range]`.
    ///
    /// # Arguments
    /// * `hidden` - The amount of hidden units (rows).
    /// * `features` - The input dimension (columns).
    ///
    /// # Returns
    /// A `hidden x features` matrix.
    pub fn initialize(&mut self, hidden: usize, features: usize) -> Result<Array2<f64>> {
        let dist = Uniform::new_inclusive(-self.range, self.range).map_err(|_| {
            MlErr::InvalidParameter {
                what: "random init range",
                value: self.range,
            }
        })?;

        let range = self.range;
        debug!("drawing {hidden}x{features} hidden weights in [-{range}, {range}]");
        Ok(Array2::random_using((hidden, features), dist, &mut self.rng))
    }

    /// Projects `x` onto the hidden layer: `act_fn(x · weightᵀ)`.
    ///
    /// # Arguments
    /// * `x` - The input, one sample per row.
    /// * `weight` - The hidden weights, one hidden unit per row.
    ///
    /// # Returns
    /// The `x.nrows() x weight.nrows()` hidden layer matrix, or an error if the column count of
    /// `x` differs from the one of `weight`.
    pub fn project(&self, x: ArrayView2<f64>, weight: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != weight.ncols() {
            return Err(MlErr::SizeMismatch {
                what: "input features",
                got: x.ncols(),
                expected: weight.ncols(),
            });
        }

        let mut h = x.dot(&weight.t());
        h.mapv_inplace(|z| self.act_fn.f(z));
        Ok(h)
    }
}

impl Default for RandomFeatureMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn weights_stay_in_range() {
        let mut features = RandomFeatureMap::seeded(7);
        features.set_range(0.25).unwrap();

        let weight = features.initialize(30, 6).unwrap();
        assert_eq!(weight.dim(), (30, 6));
        assert!(weight.iter().all(|w| w.abs() <= 0.25));
    }

    #[test]
    fn reseeding_reproduces_weights() {
        let mut features = RandomFeatureMap::new();

        features.set_seed(42);
        let a = features.initialize(5, 3).unwrap();
        features.set_seed(42);
        let b = features.initialize(5, 3).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn zero_range_yields_zero_weights() {
        let mut features = RandomFeatureMap::seeded(1);
        features.set_range(0.).unwrap();

        let weight = features.initialize(4, 2).unwrap();
        assert!(weight.iter().all(|&w| w == 0.));
    }

    #[test]
    fn rejects_negative_range() {
        let mut features = RandomFeatureMap::new();
        assert!(matches!(
            features.set_range(-1.),
            Err(MlErr::InvalidParameter { .. })
        ));
        assert_eq!(features.range(), DEFAULT_RANGE);
    }

    #[test]
    fn project_applies_activation_after_product() {
        let mut features = RandomFeatureMap::new();
        features.set_act_fn(ActFn::Identity);

        let x = array![[1., 2.], [0., -1.]];
        let weight = array![[1., 0.], [1., 1.], [0.5, -0.5]];
        let h = features.project(x.view(), weight.view()).unwrap();
        assert_eq!(h, array![[1., 3., -0.5], [0., -1., 0.5]]);

        features.set_act_fn(ActFn::Tanh);
        let h = features.project(x.view(), weight.view()).unwrap();
        assert!((h[[0, 1]] - 3_f64.tanh()).abs() < 1e-15);
    }

    #[test]
    fn project_rejects_wrong_feature_count() {
        let features = RandomFeatureMap::new();
        let x = Array2::<f64>::zeros((2, 3));
        let weight = Array2::<f64>::zeros((4, 2));

        assert!(matches!(
            features.project(x.view(), weight.view()),
            Err(MlErr::SizeMismatch { got: 3, expected: 2, .. })
        ));
    }
}
