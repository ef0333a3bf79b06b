//! Catlin CLI Library
//!
//! Command-line access to the categorical instance-log pipeline:
//!
//! - **Convert**: Instance log to the liblinear exchange format
//! - **Train**: Train a model from its instance log
//! - **Cross-validate**: Estimate accuracy by k-fold cross validation
//! - **Count** / **Partition**: Inspect and split logs by feature value
//! - **Predict**: Rank classes for one feature vector
//!
//! # Example
//!
//! ```bash
//! # Train a model with the default solver options
//! catlin train --dir /var/lib/parser --model odm0.
//!
//! # Delegate training to liblinear's own executable
//! CATLIN_TRAINER=/opt/liblinear/train catlin train --dir /var/lib/parser --model odm0.
//!
//! # Rank the classes for one feature vector
//! catlin predict --dir /var/lib/parser --model odm0. --codes "1,2|3,-" --k 3
//! ```

pub mod commands;

use clap::{Parser, Subcommand};

pub use commands::{
    ConvertCommand, CountCommand, CrossValidateCommand, ModelArgs, PartitionCommand,
    PredictCommand, SolverArgs, TrainCommand,
};

/// Catlin - categorical features for linear classifiers
///
/// Converts, trains, partitions and applies the instance logs of
/// liblinear-style models.
#[derive(Parser, Debug)]
#[command(name = "catlin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert an instance log to the exchange format
    Convert(ConvertCommand),

    /// Train a model from its instance log
    Train(TrainCommand),

    /// Estimate accuracy by k-fold cross validation
    CrossValidate(CrossValidateCommand),

    /// Tally the values of feature columns
    Count(CountCommand),

    /// Split an instance log by the value of one feature
    Partition(PartitionCommand),

    /// Rank classes for one feature vector
    Predict(PredictCommand),
}

impl Commands {
    /// Runs the selected subcommand.
    pub fn run(&self) -> CliResult<()> {
        match self {
            Commands::Convert(cmd) => cmd.run(),
            Commands::Train(cmd) => cmd.run(),
            Commands::CrossValidate(cmd) => cmd.run().map(|_| ()),
            Commands::Count(cmd) => cmd.run().map(|_| ()),
            Commands::Partition(cmd) => cmd.run(),
            Commands::Predict(cmd) => cmd.run().map(|_| ()),
        }
    }
}

/// Result type alias for CLI operations
pub type CliResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train_options() {
        let cli = Cli::parse_from([
            "catlin",
            "train",
            "--dir",
            "/tmp/m",
            "--model",
            "odm0.",
            "--options",
            "-s 3 -c 1",
            "--keep-instances",
        ]);
        match cli.command {
            Commands::Train(cmd) => {
                assert_eq!(cmd.solver.options.as_deref(), Some("-s 3 -c 1"));
                assert!(cmd.keep_instances);
                assert_eq!(cmd.artifacts.method, "liblinear");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
