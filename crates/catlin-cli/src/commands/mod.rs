//! CLI Command Implementations
//!
//! - [`convert`]: Instance log to exchange format
//! - [`train`]: Train a model from its instance log
//! - [`cross_validate`]: Estimate accuracy by k-fold cross validation
//! - [`count`]: Tally feature values in a log
//! - [`partition`]: Split a log by a feature's value
//! - [`predict`]: Rank classes for one feature vector

mod convert;
mod count;
mod cross_validate;
mod partition;
mod predict;
mod train;

use std::path::PathBuf;

use anyhow::{Context, Result};
use catlin_core::Cardinalities;
use catlin_data::ModelFiles;
use catlin_training::{LearnerConfig, Verbosity};
use clap::Args;

pub use convert::ConvertCommand;
pub use count::CountCommand;
pub use cross_validate::CrossValidateCommand;
pub use partition::PartitionCommand;
pub use predict::{parse_codes, PredictCommand};
pub use train::TrainCommand;

/// Locates the artifacts of one model.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Directory holding the model artifacts
    #[arg(long, short = 'd', env = "CATLIN_MODEL_DIR")]
    pub dir: PathBuf,

    /// Model name (prefix of every artifact file, e.g. "odm0.")
    #[arg(long, short = 'm')]
    pub model: String,

    /// Learning method name (infix of every artifact file)
    #[arg(long, default_value = catlin_data::files::DEFAULT_METHOD)]
    pub method: String,
}

impl ModelArgs {
    /// Resolves the artifact paths.
    pub fn files(&self) -> ModelFiles {
        ModelFiles::new(&self.dir, &self.model).with_method(&self.method)
    }

    /// Loads the persisted cardinalities, which must exist.
    pub fn cardinalities(&self) -> Result<Cardinalities> {
        let path = self.files().cardinalities();
        Cardinalities::load(&path)?
            .with_context(|| format!("No cardinalities at {}", path.display()))
    }
}

/// Solver and learner settings.
#[derive(Args, Debug, Clone, Default)]
pub struct SolverArgs {
    /// Learner configuration file (JSON)
    #[arg(long, short = 'c', env = "CATLIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// liblinear option string, applied over the configuration file
    #[arg(long, short = 'o', env = "CATLIN_SOLVER_OPTIONS", allow_hyphen_values = true)]
    pub options: Option<String>,
}

impl SolverArgs {
    /// Builds the learner configuration: file first, then options.
    pub fn learner_config(&self) -> Result<LearnerConfig> {
        let mut config = match &self.config {
            Some(path) => LearnerConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => LearnerConfig::default(),
        };
        if let Some(options) = &self.options {
            config
                .solver
                .apply_options(options)
                .with_context(|| format!("Invalid solver options '{}'", options))?;
        }
        Ok(config)
    }
}

/// Parses a verbosity name for clap.
pub(crate) fn parse_verbosity(s: &str) -> Result<Verbosity, String> {
    s.parse::<Verbosity>().map_err(|e| e.to_string())
}
