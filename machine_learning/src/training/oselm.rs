use std::{path::Path, time::Instant};

use log::{debug, info};
use ndarray::{Array2, ArrayView2};

use super::{
    Statistics,
    elm::{Elm, Params, as_matrix},
};
use crate::{
    MlErr, Result,
    arch::{Model, RandomFeatureMap, activations::ActFn},
    snapshot::{self, SnapshotReader, SnapshotWriter},
    solver,
};

const AUX_MATRIX: &str = "auxMatrix";

/// Below this magnitude the regularization constant counts as zero.
pub const UNREGULARIZED: f64 = 1e-7;

/// An online sequential extreme learning machine.
///
/// After an initial batch fit it keeps `P`, the inverse of the regularized gram matrix of every
/// sample seen so far, and folds new batches into the output coefficients without revisiting old
/// samples. The hidden weights never change after `init_train`.
#[derive(Debug, Clone)]
pub struct Oselm {
    elm: Elm,
    p: Array2<f64>,
}

impl Oselm {
    /// Creates a new untrained `Oselm`, see `Elm::new`.
    pub fn new(num_neurons: usize, reg_const: f64) -> Result<Self> {
        Self::with_features(num_neurons, reg_const, RandomFeatureMap::new())
    }

    /// Creates a new untrained `Oselm` drawing its hidden weights from `features`.
    pub fn with_features(
        num_neurons: usize,
        reg_const: f64,
        features: RandomFeatureMap,
    ) -> Result<Self> {
        Ok(Self {
            elm: Elm::with_features(num_neurons, reg_const, features)?,
            p: Array2::zeros((0, 0)),
        })
    }

    /// The underlying batch model.
    pub fn elm(&self) -> &Elm {
        &self.elm
    }

    pub fn num_neurons(&self) -> usize {
        self.elm.num_neurons()
    }

    pub fn feature_length(&self) -> usize {
        self.elm.feature_length()
    }

    pub fn num_classes(&self) -> usize {
        self.elm.num_classes()
    }

    pub fn reg_const(&self) -> f64 {
        self.elm.reg_const()
    }

    pub fn random_init_range(&self) -> f64 {
        self.elm.random_init_range()
    }

    pub fn beta(&self) -> ArrayView2<'_, f64> {
        self.elm.beta()
    }

    /// The running inverse gram matrix `P`, `num_neurons x num_neurons` once trained.
    pub fn aux_matrix(&self) -> ArrayView2<'_, f64> {
        self.p.view()
    }

    pub fn is_trained(&self) -> bool {
        self.elm.is_trained()
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.elm.set_seed(seed);
    }

    pub fn set_act_fn(&mut self, act_fn: ActFn) {
        self.elm.set_act_fn(act_fn);
    }

    pub fn set_random_init_range(&mut self, range: f64) -> Result<()> {
        self.elm.set_random_init_range(range)
    }

    pub fn set_reg_const(&mut self, reg_const: f64) -> Result<()> {
        self.elm.set_reg_const(reg_const)
    }

    pub fn set_feature_length(&mut self, feature_length: usize) -> Result<()> {
        self.elm.set_feature_length(feature_length)
    }

    pub fn set_num_classes(&mut self, num_classes: usize) -> Result<()> {
        self.elm.set_num_classes(num_classes)
    }

    /// Fits the model to an initial batch and sets up `P` for the sequential updates.
    ///
    /// Calling it again starts over with freshly drawn hidden weights.
    ///
    /// # Arguments
    /// * `x` - The inputs, one sample per row.
    /// * `y` - The targets, one sample per row.
    ///
    /// # Returns
    /// `InsufficientSamples` if the model is unregularized and the batch has fewer rows than
    /// hidden units, since the gram matrix cannot be full rank then.
    pub fn init_train(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        let num_neurons = self.elm.num_neurons();
        if self.elm.reg_const().abs() < UNREGULARIZED && x.nrows() < num_neurons {
            return Err(MlErr::InsufficientSamples {
                got: x.nrows(),
                expected: num_neurons,
            });
        }

        info!(
            "initial training begins: samples={} neurons={num_neurons} reg_const={}",
            x.nrows(),
            self.elm.reg_const()
        );
        let start = Instant::now();

        let fit = self.elm.fit(x, y)?;
        let p = fit.gram.solve(Array2::eye(num_neurons).view())?;

        self.elm.commit(fit);
        self.p = p;

        info!("initial training finished in {:?}", start.elapsed());
        Ok(())
    }

    /// Folds a new batch into the output coefficients.
    ///
    /// The batch goes through the Woodbury identity, so only a `batch x batch` system is
    /// solved. Either every parameter moves or none does.
    pub fn update(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        if !self.is_trained() {
            return Err(MlErr::Uninitialized);
        }
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "update targets",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }
        if y.ncols() != self.num_classes() {
            return Err(MlErr::SizeMismatch {
                what: "output classes",
                got: y.ncols(),
                expected: self.num_classes(),
            });
        }

        let batch_size = x.nrows();
        let start = Instant::now();

        let h = self.elm.hidden(x)?;
        let rhs = h.dot(&self.p);
        let mut lhs = rhs.dot(&h.t());
        for d in lhs.diag_mut() {
            *d += 1.;
        }

        let sol = solver::solve(lhs.view(), rhs.view()).map_err(|e| match e {
            MlErr::SingularMatrix { pivot, .. } => MlErr::UpdateFailed { batch_size, pivot },
            e => e,
        })?;

        let p = &self.p - &rhs.t().dot(&sol);
        let residual = &y - &h.dot(&self.elm.beta);
        let beta = &self.elm.beta + &p.dot(&h.t().dot(&residual));

        self.p = p;
        self.elm.beta = beta;

        debug!("folded a batch of {batch_size} in {:?}", start.elapsed());
        Ok(())
    }

    /// Folds a row-major raw batch of `batch_size` samples into the model.
    pub fn update_from_slices(&mut self, x: &[f64], y: &[f64], batch_size: usize) -> Result<()> {
        let x = as_matrix(x, batch_size, self.feature_length(), "input buffer")?;
        let y = as_matrix(y, batch_size, self.num_classes(), "target buffer")?;
        self.update(x, y)
    }

    /// Initial training from row-major raw buffers, see `Elm::train_from_slices`.
    pub fn train_from_slices(
        &mut self,
        x: &[f64],
        x_rows: usize,
        x_cols: usize,
        y: &[f64],
        y_rows: usize,
        y_cols: usize,
    ) -> Result<()> {
        let x = as_matrix(x, x_rows, x_cols, "input buffer")?;
        let y = as_matrix(y, y_rows, y_cols, "target buffer")?;
        self.init_train(x, y)
    }

    pub fn score_from_slice(&self, x: &[f64], rows: usize) -> Result<Array2<f64>> {
        self.elm.score_from_slice(x, rows)
    }

    /// Serializes the full parameter set, `P` included.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = SnapshotWriter::new();
        self.elm.write_fields(&mut writer)?;
        writer.field(AUX_MATRIX, &self.p)?;
        Ok(writer.into_bytes())
    }

    /// Builds a fresh model from serialized parameters, see `Elm::from_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (params, p) = Self::read_fields(bytes)?;
        let mut oselm = Self::new(params.num_neurons, params.reg_const)?;
        oselm.elm.install(params)?;
        oselm.p = p;
        Ok(oselm)
    }

    /// Replaces the parameters of this model with serialized ones, see `Elm::restore`.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<()> {
        let (params, p) = Self::read_fields(bytes)?;
        self.elm.check_same_neurons(&params)?;
        self.elm.install(params)?;
        self.p = p;
        Ok(())
    }

    pub fn snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        snapshot::write_file(path, &self.to_bytes()?)
    }

    pub fn load_snapshot<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.restore(&snapshot::read_file(path)?)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&snapshot::read_file(path)?)
    }

    fn read_fields(bytes: &[u8]) -> Result<(Params, Array2<f64>)> {
        let mut reader = SnapshotReader::new(bytes);
        let params = Elm::read_fields(&mut reader)?;
        let p: Array2<f64> = reader.field(AUX_MATRIX)?;
        if reader.remaining() != 0 {
            return Err(MlErr::corrupt(
                AUX_MATRIX,
                format!("{} trailing bytes after the last field", reader.remaining()),
            ));
        }

        let expected = if params.weight.is_empty() {
            (0, 0)
        } else {
            (params.num_neurons, params.num_neurons)
        };
        if p.dim() != expected {
            return Err(MlErr::corrupt(
                AUX_MATRIX,
                format!("shape {:?} does not match {expected:?}", p.dim()),
            ));
        }

        Ok((params, p))
    }
}

impl Model for Oselm {
    fn train(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        self.init_train(x, y)
    }

    fn score(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.elm.score(x)
    }

    fn evaluate(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
        threshold: f64,
    ) -> Result<Statistics> {
        self.elm.evaluate(x, y, threshold)
    }
}
