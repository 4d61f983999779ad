use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use machine_learning::arch::DEFAULT_RANGE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// One batch fit on the training samples.
    Elm,
    /// An initial fit followed by sequential updates.
    Oselm,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub train_images: PathBuf,
    pub train_labels: PathBuf,
    pub test_images: PathBuf,
    pub test_labels: PathBuf,
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
}

/// A full experiment description.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub mode: Mode,
    pub hidden_units: usize,
    #[serde(default)]
    pub reg_const: f64,
    #[serde(default = "default_range")]
    pub range: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    pub dataset: DatasetConfig,
    /// Samples used for the (initial) batch fit.
    pub num_train: usize,
    pub num_test: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub epochs: usize,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

fn default_num_classes() -> usize {
    10
}

fn default_range() -> f64 {
    DEFAULT_RANGE
}

fn default_batch_size() -> usize {
    100
}

impl RunConfig {
    /// Reads and validates the configuration at `path`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read '{}'", path.display()))?;
        Self::from_json(&content).with_context(|| format!("invalid config '{}'", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.hidden_units > 0, "hidden_units must be positive");
        ensure!(
            self.reg_const.is_finite() && self.reg_const >= 0.,
            "reg_const must be a non negative number, got {}",
            self.reg_const
        );
        ensure!(
            self.range.is_finite() && self.range >= 0.,
            "range must be a non negative number, got {}",
            self.range
        );
        ensure!(self.num_train > 0, "num_train must be positive");
        ensure!(self.num_test > 0, "num_test must be positive");
        ensure!(
            self.dataset.num_classes > 0,
            "dataset.num_classes must be positive"
        );

        if self.mode == Mode::Oselm {
            ensure!(self.batch_size > 0, "batch_size must be positive");
            ensure!(
                self.reg_const >= machine_learning::training::UNREGULARIZED
                    || self.num_train >= self.hidden_units,
                "an unregularized initial fit needs num_train ({}) >= hidden_units ({})",
                self.num_train,
                self.hidden_units
            );
        }
        Ok(())
    }

    /// The amount of training samples the run consumes.
    pub fn train_samples(&self) -> usize {
        match self.mode {
            Mode::Elm => self.num_train,
            Mode::Oselm => self.num_train + self.epochs * self.batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = r#""dataset": {
        "train_images": "train-images.idx3-ubyte",
        "train_labels": "train-labels.idx1-ubyte",
        "test_images": "t10k-images.idx3-ubyte",
        "test_labels": "t10k-labels.idx1-ubyte"
    }"#;

    fn parse(fields: &str) -> Result<RunConfig> {
        RunConfig::from_json(&format!("{{ {fields}, {DATASET} }}"))
    }

    #[test]
    fn defaults_are_filled_in() {
        let config = parse(r#""mode": "elm", "hidden_units": 500, "num_train": 2000, "num_test": 1000"#)
            .unwrap();

        assert_eq!(config.mode, Mode::Elm);
        assert_eq!(config.reg_const, 0.);
        assert_eq!(config.range, DEFAULT_RANGE);
        assert_eq!(config.seed, None);
        assert_eq!(config.dataset.num_classes, 10);
        assert_eq!(config.batch_size, 100);
        assert!(!config.shuffle);
        assert!(config.snapshot.is_none());
        assert_eq!(config.train_samples(), 2000);
    }

    #[test]
    fn oselm_run_consumes_every_batch() {
        let config = parse(
            r#""mode": "oselm", "hidden_units": 500, "reg_const": 0.1, "num_train": 2000,
            "num_test": 1000, "batch_size": 100, "epochs": 20, "seed": 7"#,
        )
        .unwrap();

        assert_eq!(config.seed, Some(7));
        assert_eq!(config.train_samples(), 4000);
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            r#""mode": "elm", "hidden_units": 0, "num_train": 10, "num_test": 10"#,
            r#""mode": "elm", "hidden_units": 5, "reg_const": -1, "num_train": 10, "num_test": 10"#,
            r#""mode": "elm", "hidden_units": 5, "range": -0.5, "num_train": 10, "num_test": 10"#,
            r#""mode": "elm", "hidden_units": 5, "num_train": 0, "num_test": 10"#,
            r#""mode": "oselm", "hidden_units": 50, "num_train": 10, "num_test": 10"#,
            r#""mode": "oselm", "hidden_units": 5, "reg_const": 1, "batch_size": 0, "num_train": 10, "num_test": 10"#,
            r#""mode": "batch", "hidden_units": 5, "num_train": 10, "num_test": 10"#,
            r#""mode": "elm", "hidden_units": 5, "num_train": 10, "num_test": 10, "typo": 1"#,
        ];

        for case in cases {
            assert!(parse(case).is_err(), "accepted {case}");
        }
    }
}
