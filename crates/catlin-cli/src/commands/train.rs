//! Train Command Implementation
//!
//! Trains a model from its instance log and persisted cardinalities, in
//! process or through an external liblinear `train` executable.

use anyhow::{Context, Result};
use catlin_data::InstanceLog;
use catlin_training::{TrainerBackend, TrainingSet, Verbosity};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use super::{parse_verbosity, ModelArgs, SolverArgs};

/// Train a model from its instance log
///
/// Reads `<model><method>.ins` and `<model><method>.car` from the model
/// directory and writes `<model><method>.mod`.
///
/// # Example
///
/// ```bash
/// catlin train --dir /var/lib/parser --model odm0. --options "-s 4 -c 0.1"
/// ```
#[derive(Args, Debug, Clone)]
pub struct TrainCommand {
    #[command(flatten)]
    pub artifacts: ModelArgs,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Keep the instance log and exchange file after training
    #[arg(long)]
    pub keep_instances: bool,

    /// External liblinear `train` executable
    #[arg(long, env = "CATLIN_TRAINER")]
    pub trainer: Option<PathBuf>,

    /// Output of the external trainer to forward (silent, error, all)
    #[arg(long, value_parser = parse_verbosity)]
    pub verbosity: Option<Verbosity>,
}

impl TrainCommand {
    /// Execute the train command
    pub fn run(&self) -> Result<()> {
        let mut config = self.solver.learner_config()?;
        if let Some(trainer) = &self.trainer {
            config.external_trainer = Some(trainer.clone());
        }
        if let Some(verbosity) = self.verbosity {
            config.verbosity = verbosity;
        }
        config.save_instance_files |= self.keep_instances;
        config.validate().context("Invalid learner configuration")?;

        let files = self.artifacts.files();
        let cardinalities = self.artifacts.cardinalities()?;
        let mut log = InstanceLog::open_read(files.instance_log());
        if !log.path().exists() {
            anyhow::bail!("Instance log {} does not exist", log.path().display());
        }
        let instances = log.count()?;

        let backend = TrainerBackend::from_config(&config);
        let model = backend
            .train(
                TrainingSet {
                    log: &mut log,
                    cardinalities: &cardinalities,
                    files: &files,
                },
                &config.solver,
            )
            .with_context(|| format!("Failed to train {}", files.model().display()))?;
        info!(
            model = %files.model().display(),
            instances,
            classes = model.nr_class(),
            features = model.nr_feature(),
            "Model trained"
        );

        if !config.save_instance_files {
            log.delete()?;
            let exchange = files.exchange();
            if exchange.exists() {
                std::fs::remove_file(&exchange)
                    .with_context(|| format!("Failed to remove {}", exchange.display()))?;
            }
        }
        Ok(())
    }
}
