// Subcommand implementations for deepmdpctl

use std::path::Path;

use anyhow::{bail, Context, Result};
use deepmdp_config::{EpsilonBounds, Experiment, LoadError};
use tracing::debug;

fn load(file: &Path) -> Result<Experiment> {
    Experiment::from_path(file).with_context(|| format!("failed to load {}", file.display()))
}

pub fn validate(file: &Path) -> Result<()> {
    match Experiment::from_path(file) {
        Ok(experiment) => {
            let config = experiment.config();
            println!("ok");
            println!(
                "   {}: {} epochs x {} steps, snapshot {}, {} parameters",
                config.env().name(),
                config.n_epochs(),
                config.steps_per_epoch(),
                experiment.snapshot().mode(),
                experiment.layers().parameter_count(None),
            );
            Ok(())
        }
        Err(LoadError::Invalid(err)) => {
            for violation in err.violations() {
                println!("{violation}");
            }
            bail!("{} has {} problem(s)", file.display(), err.len());
        }
        Err(other) => Err(other).with_context(|| format!("failed to load {}", file.display())),
    }
}

pub fn layers(file: &Path, actions: Option<usize>) -> Result<()> {
    let experiment = load(file)?;
    let plan = experiment.layers();

    println!("input {}", plan.input_shape());
    for layer in plan.layers() {
        println!("  {layer}");
    }
    if let Some(actions) = actions {
        println!("  {}", plan.output_layer(actions));
    }
    println!("encoder features: {}", plan.encoder_features());
    println!("parameters: {}", plan.parameter_count(actions));
    Ok(())
}

pub fn snapshots(file: &Path, epochs: Option<usize>) -> Result<()> {
    let experiment = load(file)?;
    let total = epochs.unwrap_or_else(|| experiment.config().n_epochs());
    debug!(total, "listing snapshot epochs");

    let epochs = experiment
        .snapshot()
        .snapshot_epochs(total)
        .context("cannot list snapshots")?;
    for epoch in epochs {
        println!("{epoch}");
    }
    Ok(())
}

pub fn epsilon(file: &Path, initial: Option<f64>, floor: Option<f64>, count: usize) -> Result<()> {
    let experiment = load(file)?;
    let supplied = initial
        .map(|initial| EpsilonBounds::new(initial, floor.unwrap_or(0.0)))
        .transpose()
        .context("invalid epsilon bounds")?;
    let decay = experiment
        .epsilon_decay(supplied)
        .context("cannot resolve epsilon decay")?;

    for index in 0..count {
        println!("{index}\t{:.6}", decay.epsilon(index));
    }
    Ok(())
}

pub fn dump(file: &Path) -> Result<()> {
    let experiment = load(file)?;
    println!("{}", experiment.to_json_pretty()?);
    Ok(())
}
