//! Cross-Validate Command Implementation

use anyhow::{Context, Result};
use catlin_data::{InstanceLog, ProblemBuilder};
use catlin_training::{cross_validate, InProcessSolver};
use clap::Args;
use tracing::info;

use super::{ModelArgs, SolverArgs};

/// Estimate accuracy by k-fold cross validation
///
/// Prints the accuracy in percent. The instance log is never deleted.
///
/// # Example
///
/// ```bash
/// catlin cross-validate --dir /var/lib/parser --model odm0. --folds 5
/// ```
#[derive(Args, Debug, Clone)]
pub struct CrossValidateCommand {
    #[command(flatten)]
    pub artifacts: ModelArgs,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Number of folds
    #[arg(long, short = 'v', default_value = "5")]
    pub folds: usize,

    /// Seed of the solver's random permutations
    #[arg(long, default_value = "1")]
    pub seed: u64,
}

impl CrossValidateCommand {
    /// Execute the cross-validate command
    pub fn run(&self) -> Result<f64> {
        let config = self.solver.learner_config()?;
        config.solver.validate()?;
        let files = self.artifacts.files();
        let cardinalities = self.artifacts.cardinalities()?;
        let mut log = InstanceLog::open_read(files.instance_log());
        let problem = ProblemBuilder::new(&cardinalities, config.solver.bias)?
            .build(&mut log)
            .with_context(|| format!("Failed to read {}", log.path().display()))?;
        info!(
            instances = problem.len(),
            folds = self.folds,
            solver = %config.solver,
            "Cross validation"
        );
        let solver = InProcessSolver::with_seed(self.seed);
        let accuracy = cross_validate(&solver, &problem, &config.solver, self.folds)?;
        println!("Cross Validation Accuracy = {}%", accuracy);
        Ok(accuracy)
    }
}
