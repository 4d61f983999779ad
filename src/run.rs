use std::time::Instant;

use anyhow::{Context, Result, ensure};
use dataset::Dataset;
use log::info;
use machine_learning::{
    Elm, Oselm,
    arch::{Model, RandomFeatureMap},
};
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;

use crate::config::{Mode, RunConfig};

/// What a run measured, printed as JSON at the end.
#[derive(Debug, Serialize)]
pub struct Report {
    pub mode: Mode,
    /// Statistics on the samples of the (initial) fit.
    pub train: Vec<f64>,
    /// Statistics on the test set right after the (initial) fit.
    pub test: Vec<f64>,
    /// Test set accuracy after each sequential update.
    pub updates: Vec<f64>,
}

pub fn run(config: &RunConfig) -> Result<Report> {
    let paths = &config.dataset;
    let mut train = Dataset::load(&paths.train_images, &paths.train_labels, paths.num_classes)
        .context("cannot load the training set")?;
    let test = Dataset::load(&paths.test_images, &paths.test_labels, paths.num_classes)
        .context("cannot load the test set")?;

    ensure!(
        train.len() >= config.train_samples(),
        "the run needs {} training samples but there are only {}",
        config.train_samples(),
        train.len()
    );
    ensure!(
        test.len() >= config.num_test,
        "the run needs {} test samples but there are only {}",
        config.num_test,
        test.len()
    );

    if config.shuffle {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        train.shuffle(&mut rng);
    }

    match config.mode {
        Mode::Elm => run_elm(config, &train, &test),
        Mode::Oselm => run_oselm(config, &train, &test),
    }
}

fn features(config: &RunConfig) -> Result<RandomFeatureMap> {
    let mut features = match config.seed {
        Some(seed) => RandomFeatureMap::seeded(seed),
        None => RandomFeatureMap::new(),
    };
    features.set_range(config.range)?;
    Ok(features)
}

fn run_elm(config: &RunConfig, train: &Dataset, test: &Dataset) -> Result<Report> {
    let mut elm = Elm::with_features(config.hidden_units, config.reg_const, features(config)?)?;

    let (x, y) = train.rows(0..config.num_train);
    elm.train(x, y)?;

    let (test_x, test_y) = test.rows(0..config.num_test);
    let train_stats = elm.evaluate(x, y, config.threshold)?;
    let test_stats = elm.evaluate(test_x, test_y, config.threshold)?;
    info!("train {train_stats:?}, test {test_stats:?}");

    if let Some(path) = &config.snapshot {
        elm.snapshot(path)
            .with_context(|| format!("cannot write snapshot '{}'", path.display()))?;
    }

    Ok(Report {
        mode: Mode::Elm,
        train: train_stats.to_vec(),
        test: test_stats.to_vec(),
        updates: Vec::new(),
    })
}

fn run_oselm(config: &RunConfig, train: &Dataset, test: &Dataset) -> Result<Report> {
    let mut oselm =
        Oselm::with_features(config.hidden_units, config.reg_const, features(config)?)?;

    let (x, y) = train.rows(0..config.num_train);
    oselm.init_train(x, y)?;

    let (test_x, test_y) = test.rows(0..config.num_test);
    let train_stats = oselm.evaluate(x, y, config.threshold)?;
    let test_stats = oselm.evaluate(test_x, test_y, config.threshold)?;
    info!("initial train {train_stats:?}, test {test_stats:?}");

    let start = Instant::now();
    let mut updates = Vec::with_capacity(config.epochs);
    for epoch in 0..config.epochs {
        let from = config.num_train + epoch * config.batch_size;
        let (bx, by) = train.rows(from..from + config.batch_size);
        oselm
            .update(bx, by)
            .with_context(|| format!("update {epoch} failed"))?;

        let accuracy = oselm.evaluate(test_x, test_y, config.threshold)?.accuracy();
        info!(
            epoch = epoch,
            accuracy = accuracy;
            "folded samples {from}..{}",
            from + config.batch_size
        );
        updates.push(accuracy);
    }
    info!("{} updates took {:?}", config.epochs, start.elapsed());

    if let Some(path) = &config.snapshot {
        oselm
            .snapshot(path)
            .with_context(|| format!("cannot write snapshot '{}'", path.display()))?;
    }

    Ok(Report {
        mode: Mode::Oselm,
        train: train_stats.to_vec(),
        test: test_stats.to_vec(),
        updates,
    })
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use super::*;
    use crate::config::DatasetConfig;

    /// Writes a tiny two class IDX dataset: dark images are class 0, bright ones class 1.
    fn write_dataset(tag: &str, count: usize) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir();
        let images = dir.join(format!("oselm_run_{tag}_{}_images.idx", std::process::id()));
        let labels = dir.join(format!("oselm_run_{tag}_{}_labels.idx", std::process::id()));

        let mut image_bytes = Vec::new();
        for word in [2051_u32, count as u32, 2, 2] {
            image_bytes.extend_from_slice(&word.to_be_bytes());
        }
        let mut label_bytes = Vec::new();
        for word in [2049_u32, count as u32] {
            label_bytes.extend_from_slice(&word.to_be_bytes());
        }

        for i in 0..count {
            let class = (i % 2) as u8;
            let base = if class == 0 { 10 } else { 200 };
            image_bytes.extend((0..4).map(|p| base + ((i * 7 + p * 13) % 40) as u8));
            label_bytes.push(class);
        }

        fs::write(&images, image_bytes).unwrap();
        fs::write(&labels, label_bytes).unwrap();
        (images, labels)
    }

    fn config(mode: Mode, tag: &str) -> RunConfig {
        let (train_images, train_labels) = write_dataset(&format!("{tag}_train"), 120);
        let (test_images, test_labels) = write_dataset(&format!("{tag}_test"), 40);

        RunConfig {
            mode,
            hidden_units: 20,
            reg_const: 0.01,
            range: 0.5,
            seed: Some(3),
            dataset: DatasetConfig {
                train_images,
                train_labels,
                test_images,
                test_labels,
                num_classes: 2,
            },
            num_train: 60,
            num_test: 40,
            batch_size: 10,
            epochs: 6,
            shuffle: true,
            threshold: 0.,
            snapshot: None,
        }
    }

    fn cleanup(config: &RunConfig) {
        let paths = &config.dataset;
        for path in [
            &paths.train_images,
            &paths.train_labels,
            &paths.test_images,
            &paths.test_labels,
        ] {
            let _ = fs::remove_file(path);
        }
    }

    #[test]
    fn elm_run_reports_train_and_test() {
        let config = config(Mode::Elm, "elm");
        let report = run(&config).unwrap();
        cleanup(&config);

        assert_eq!(report.mode, Mode::Elm);
        assert_eq!(report.train.len(), 1);
        assert_eq!(report.test.len(), 1);
        assert!(report.updates.is_empty());
    }

    #[test]
    fn oselm_run_reports_every_update() {
        let mut config = config(Mode::Oselm, "oselm");
        let snapshot = std::env::temp_dir().join(format!("oselm_run_{}.bin", std::process::id()));
        config.snapshot = Some(snapshot.clone());

        let report = run(&config).unwrap();
        cleanup(&config);

        assert_eq!(report.updates.len(), 6);
        assert!(report.updates.iter().all(|a| (0. ..=1.).contains(a)));

        let restored = Oselm::open(&snapshot).unwrap();
        assert_eq!(restored.feature_length(), 4);
        assert_eq!(restored.num_classes(), 2);
        fs::remove_file(snapshot).unwrap();
    }

    #[test]
    fn too_few_samples_is_an_error() {
        let mut config = config(Mode::Oselm, "short");
        config.epochs = 10;

        let err = run(&config).unwrap_err();
        cleanup(&config);
        assert!(err.to_string().contains("training samples"), "{err}");
    }
}
