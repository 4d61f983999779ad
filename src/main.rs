use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use log::info;

use config::RunConfig;

mod config;
mod run;

const CONFIG_ENV: &str = "OSELM_CONFIG";

fn main() -> Result<()> {
    env_logger::init();

    let path: PathBuf = env::args_os()
        .nth(1)
        .or_else(|| env::var_os(CONFIG_ENV))
        .map(PathBuf::from)
        .with_context(|| format!("usage: oselm <config.json>, or set {CONFIG_ENV}"))?;

    let config = RunConfig::from_path(&path)?;
    info!(
        "running {:?} with {} hidden units from {}",
        config.mode,
        config.hidden_units,
        path.display()
    );

    let report = run::run(&config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
