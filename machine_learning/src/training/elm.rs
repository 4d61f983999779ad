use std::{path::Path, time::Instant};

use log::{debug, info, warn};
use ndarray::{Array2, ArrayView2};

use crate::{
    MlErr, Result,
    arch::{Model, RandomFeatureMap, activations::ActFn},
    snapshot::{self, SnapshotReader, SnapshotWriter},
    solver::Cholesky,
};

const WEIGHT: &str = "weight";
const OUTPUT_COEFF: &str = "outputCoeff";
const HIDDEN_UNITS: &str = "hiddenUnits";
const FEATURE_LENGTH: &str = "featureLength";
const REG_CONST: &str = "regConst";
const RANGE: &str = "range";
const NUM_CLASSES: &str = "numClasses";

/// An extreme learning machine: a fixed random hidden layer followed by a linear output layer
/// fitted in closed form with ridge regularization.
///
/// The input and output dimensions are unknown until the first call to `train`, from then on
/// every batch has to match them.
#[derive(Debug, Clone)]
pub struct Elm {
    features: RandomFeatureMap,
    pub(super) weight: Array2<f64>,
    pub(super) beta: Array2<f64>,
    num_neurons: usize,
    feature_length: usize,
    num_classes: usize,
    reg_const: f64,
}

/// A fitted parameter set that has not been committed to the model yet.
pub(super) struct Fit {
    pub weight: Array2<f64>,
    pub beta: Array2<f64>,
    pub gram: Cholesky,
    pub feature_length: usize,
    pub num_classes: usize,
}

/// A parameter set read from a snapshot, already checked for consistency.
pub(super) struct Params {
    pub weight: Array2<f64>,
    pub beta: Array2<f64>,
    pub num_neurons: usize,
    pub feature_length: usize,
    pub num_classes: usize,
    pub reg_const: f64,
    pub range: f64,
}

impl Elm {
    /// Creates a new untrained `Elm`.
    ///
    /// # Arguments
    /// * `num_neurons` - The amount of hidden units.
    /// * `reg_const` - The ridge penalty added to the gram matrix diagonal.
    ///
    /// # Returns
    /// An error if there are no hidden units or the penalty is negative or not finite.
    pub fn new(num_neurons: usize, reg_const: f64) -> Result<Self> {
        Self::with_features(num_neurons, reg_const, RandomFeatureMap::new())
    }

    /// Creates a new untrained `Elm` drawing its hidden weights from `features`.
    pub fn with_features(
        num_neurons: usize,
        reg_const: f64,
        features: RandomFeatureMap,
    ) -> Result<Self> {
        if num_neurons == 0 {
            return Err(MlErr::InvalidParameter {
                what: "hidden unit count",
                value: 0.,
            });
        }
        check_reg_const(reg_const)?;

        Ok(Self {
            features,
            weight: Array2::zeros((0, 0)),
            beta: Array2::zeros((0, 0)),
            num_neurons,
            feature_length: 0,
            num_classes: 0,
            reg_const,
        })
    }

    pub fn num_neurons(&self) -> usize {
        self.num_neurons
    }

    pub fn feature_length(&self) -> usize {
        self.feature_length
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn reg_const(&self) -> f64 {
        self.reg_const
    }

    pub fn random_init_range(&self) -> f64 {
        self.features.range()
    }

    pub fn act_fn(&self) -> &ActFn {
        self.features.act_fn()
    }

    /// The hidden weights, `num_neurons x feature_length` once trained.
    pub fn weight(&self) -> ArrayView2<'_, f64> {
        self.weight.view()
    }

    /// The output coefficients, `num_neurons x num_classes` once trained.
    pub fn beta(&self) -> ArrayView2<'_, f64> {
        self.beta.view()
    }

    /// Whether the dimensions are pinned and the parameters populated.
    pub fn is_trained(&self) -> bool {
        self.feature_length != 0
            && self.num_classes != 0
            && self.weight.nrows() == self.num_neurons
    }

    /// Reseeds the generator the hidden weights are drawn from.
    pub fn set_seed(&mut self, seed: u64) {
        self.features.set_seed(seed);
    }

    /// Replaces the activation, it applies to every projection from now on.
    pub fn set_act_fn(&mut self, act_fn: ActFn) {
        self.features.set_act_fn(act_fn);
    }

    pub fn set_random_init_range(&mut self, range: f64) -> Result<()> {
        self.ensure_untrained("random init range")?;
        self.features.set_range(range)
    }

    pub fn set_reg_const(&mut self, reg_const: f64) -> Result<()> {
        self.ensure_untrained("regularization constant")?;
        check_reg_const(reg_const)?;
        self.reg_const = reg_const;
        Ok(())
    }

    /// Pins the input dimension ahead of training.
    pub fn set_feature_length(&mut self, feature_length: usize) -> Result<()> {
        self.ensure_untrained("feature length")?;
        self.feature_length = feature_length;
        Ok(())
    }

    /// Pins the output dimension ahead of training.
    pub fn set_num_classes(&mut self, num_classes: usize) -> Result<()> {
        self.ensure_untrained("class count")?;
        self.num_classes = num_classes;
        Ok(())
    }

    /// Trains from row-major raw buffers.
    ///
    /// # Arguments
    /// * `x` - `x_rows * x_cols` inputs.
    /// * `y` - `y_rows * y_cols` targets.
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
        self.train(x, y)
    }

    /// Scores a row-major raw buffer of `rows * feature_length` inputs.
    pub fn score_from_slice(&self, x: &[f64], rows: usize) -> Result<Array2<f64>> {
        let x = as_matrix(x, rows, self.feature_length, "input buffer")?;
        self.score(x)
    }

    /// Projects `x` onto the trained hidden layer.
    ///
    /// # Returns
    /// The `x.nrows() x num_neurons` hidden layer matrix.
    pub(super) fn hidden(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if !self.is_trained() {
            return Err(MlErr::Uninitialized);
        }

        self.features.project(x, self.weight.view())
    }

    /// Draws new hidden weights and solves the regularized least squares problem for `x` and
    /// `y` without touching the model parameters.
    ///
    /// # Returns
    /// The fitted parameters together with the factored gram matrix, so callers can solve more
    /// systems against it before committing.
    pub(super) fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Fit> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "training targets",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }
        check_width("input features", x.ncols(), self.feature_length)?;
        check_width("output classes", y.ncols(), self.num_classes)?;

        let weight = self.features.initialize(self.num_neurons, x.ncols())?;
        let h = self.features.project(x, weight.view())?;
        debug!("hidden layer matrix is {}x{}", h.nrows(), h.ncols());

        let mut lhs = h.t().dot(&h);
        for d in lhs.diag_mut() {
            *d += self.reg_const;
        }

        let gram = Cholesky::factor(lhs.view()).map_err(|e| match e {
            MlErr::SingularMatrix { dim, pivot } => MlErr::TrainingFailed { dim, pivot },
            e => e,
        })?;
        let beta = gram.solve(h.t().dot(&y).view())?;

        Ok(Fit {
            weight,
            beta,
            gram,
            feature_length: x.ncols(),
            num_classes: y.ncols(),
        })
    }

    /// Replaces the model parameters with a successful fit.
    pub(super) fn commit(&mut self, fit: Fit) {
        self.weight = fit.weight;
        self.beta = fit.beta;
        self.feature_length = fit.feature_length;
        self.num_classes = fit.num_classes;
    }

    /// Serializes the full parameter set.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = SnapshotWriter::new();
        self.write_fields(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Builds a fresh model from serialized parameters.
    ///
    /// The activation is not part of the snapshot, the restored model uses `tanh` until
    /// `set_act_fn` says otherwise.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let params = Self::read_fields(&mut SnapshotReader::new(bytes))?;
        let mut elm = Self::new(params.num_neurons, params.reg_const)?;
        elm.install(params)?;
        Ok(elm)
    }

    /// Replaces the parameters of this model with serialized ones.
    ///
    /// # Returns
    /// An error, leaving the model untouched, if the bytes are corrupt or were written by a
    /// model with a different amount of hidden units.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<()> {
        let params = Self::read_fields(&mut SnapshotReader::new(bytes))?;
        self.check_same_neurons(&params)?;
        self.install(params)
    }

    /// Writes the parameter set to `path`, truncating any previous file.
    pub fn snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        snapshot::write_file(path, &self.to_bytes()?)
    }

    /// Restores the parameter set from `path`, see `restore`.
    pub fn load_snapshot<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.restore(&snapshot::read_file(path)?)
    }

    /// Builds a fresh model from the snapshot at `path`, see `from_bytes`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&snapshot::read_file(path)?)
    }

    pub(super) fn write_fields(&self, writer: &mut SnapshotWriter) -> Result<()> {
        writer.field(WEIGHT, &self.weight)?;
        writer.field(OUTPUT_COEFF, &self.beta)?;
        writer.field(HIDDEN_UNITS, &to_i32(HIDDEN_UNITS, self.num_neurons)?)?;
        writer.field(FEATURE_LENGTH, &to_i32(FEATURE_LENGTH, self.feature_length)?)?;
        writer.field(REG_CONST, &self.reg_const)?;
        writer.field(RANGE, &self.features.range())?;
        writer.field(NUM_CLASSES, &to_i32(NUM_CLASSES, self.num_classes)?)?;
        Ok(())
    }

    pub(super) fn read_fields(reader: &mut SnapshotReader<'_>) -> Result<Params> {
        let weight: Array2<f64> = reader.field(WEIGHT)?;
        let beta: Array2<f64> = reader.field(OUTPUT_COEFF)?;
        let num_neurons = to_usize(HIDDEN_UNITS, reader.field(HIDDEN_UNITS)?)?;
        let feature_length = to_usize(FEATURE_LENGTH, reader.field(FEATURE_LENGTH)?)?;
        let reg_const: f64 = reader.field(REG_CONST)?;
        let range: f64 = reader.field(RANGE)?;
        let num_classes = to_usize(NUM_CLASSES, reader.field(NUM_CLASSES)?)?;

        if num_neurons == 0 {
            return Err(MlErr::corrupt(HIDDEN_UNITS, "zero hidden units"));
        }
        if !reg_const.is_finite() || reg_const < 0. {
            return Err(MlErr::corrupt(REG_CONST, format!("invalid value {reg_const}")));
        }
        if !range.is_finite() || range < 0. {
            return Err(MlErr::corrupt(RANGE, format!("invalid value {range}")));
        }

        if weight.is_empty() {
            if !beta.is_empty() {
                return Err(MlErr::corrupt(
                    OUTPUT_COEFF,
                    "untrained snapshot carries output coefficients",
                ));
            }
        } else {
            if weight.dim() != (num_neurons, feature_length) {
                return Err(MlErr::corrupt(
                    WEIGHT,
                    format!(
                        "shape {:?} does not match {num_neurons}x{feature_length}",
                        weight.dim()
                    ),
                ));
            }
            if num_classes == 0 || beta.dim() != (num_neurons, num_classes) {
                return Err(MlErr::corrupt(
                    OUTPUT_COEFF,
                    format!(
                        "shape {:?} does not match {num_neurons}x{num_classes}",
                        beta.dim()
                    ),
                ));
            }
        }

        Ok(Params {
            weight,
            beta,
            num_neurons,
            feature_length,
            num_classes,
            reg_const,
            range,
        })
    }

    pub(super) fn check_same_neurons(&self, params: &Params) -> Result<()> {
        if params.num_neurons != self.num_neurons {
            return Err(MlErr::SizeMismatch {
                what: "snapshot hidden units",
                got: params.num_neurons,
                expected: self.num_neurons,
            });
        }
        Ok(())
    }

    /// Takes over a validated parameter set.
    pub(super) fn install(&mut self, params: Params) -> Result<()> {
        self.features.set_range(params.range)?;
        self.weight = params.weight;
        self.beta = params.beta;
        self.num_neurons = params.num_neurons;
        self.feature_length = params.feature_length;
        self.num_classes = params.num_classes;
        self.reg_const = params.reg_const;

        if !self.is_trained() {
            warn!("restored a snapshot of an untrained model");
        }
        Ok(())
    }

    fn ensure_untrained(&self, what: &'static str) -> Result<()> {
        if self.is_trained() {
            return Err(MlErr::FrozenParameter { what });
        }
        Ok(())
    }
}

impl Model for Elm {
    fn train(&mut self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<()> {
        info!(
            "training begins: samples={} neurons={} reg_const={}",
            x.nrows(),
            self.num_neurons,
            self.reg_const
        );
        let start = Instant::now();

        let fit = self.fit(x, y)?;
        self.commit(fit);

        info!("training finished in {:?}", start.elapsed());
        Ok(())
    }

    fn score(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(self.hidden(x)?.dot(&self.beta))
    }

    fn evaluate(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
        threshold: f64,
    ) -> Result<super::Statistics> {
        let start = Instant::now();
        let stats = super::Statistics::compute(self.score(x)?.view(), y, threshold)?;
        info!("evaluated {} samples in {:?}: {stats:?}", x.nrows(), start.elapsed());
        Ok(stats)
    }
}

/// Wraps a row-major buffer as a `rows x cols` matrix.
///
/// # Returns
/// A `SizeMismatch` if the buffer does not hold exactly `rows * cols` values.
pub(super) fn as_matrix<'a>(
    data: &'a [f64],
    rows: usize,
    cols: usize,
    what: &'static str,
) -> Result<ArrayView2<'a, f64>> {
    let expected = rows.checked_mul(cols).ok_or(MlErr::SizeMismatch {
        what,
        got: data.len(),
        expected: usize::MAX,
    })?;

    // from_shape accepts longer buffers and views their prefix
    if data.len() != expected {
        return Err(MlErr::SizeMismatch {
            what,
            got: data.len(),
            expected,
        });
    }

    ArrayView2::from_shape((rows, cols), data).map_err(|_| MlErr::SizeMismatch {
        what,
        got: data.len(),
        expected,
    })
}

/// Checks a batch dimension against a pinned one, zero meaning not pinned yet.
fn check_width(what: &'static str, got: usize, pinned: usize) -> Result<()> {
    if got == 0 || (pinned != 0 && got != pinned) {
        return Err(MlErr::SizeMismatch {
            what,
            got,
            expected: pinned.max(1),
        });
    }
    Ok(())
}

fn check_reg_const(reg_const: f64) -> Result<()> {
    if !reg_const.is_finite() || reg_const < 0. {
        return Err(MlErr::InvalidParameter {
            what: "regularization constant",
            value: reg_const,
        });
    }
    Ok(())
}

fn to_i32(field: &'static str, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| MlErr::InvalidParameter {
        what: field,
        value: value as f64,
    })
}

fn to_usize(field: &'static str, value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| MlErr::corrupt(field, format!("negative value {value}")))
}
