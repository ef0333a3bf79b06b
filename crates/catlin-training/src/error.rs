//! Errors raised while configuring, training and applying linear models.

use std::path::PathBuf;

use catlin_core::error::CatlinError;
use thiserror::Error;

use crate::config::SolverType;

/// Errors that can occur in the training layer.
#[derive(Debug, Error)]
pub enum TrainError {
    /// An error from the encoding core or the instance log.
    #[error(transparent)]
    Catlin(#[from] CatlinError),

    /// A model artifact could not be read.
    #[error("Invalid model file {path}:{line}: {reason}")]
    ModelFormat {
        /// The model file.
        path: PathBuf,
        /// The 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },

    /// The solver variant has no in-process implementation.
    #[error("Solver {0} is not available in-process; configure an external trainer")]
    UnsupportedSolver(SolverType),

    /// Training was requested on a problem without examples.
    #[error("Cannot train on an empty problem")]
    EmptyProblem,

    /// A prediction was requested before a model was trained or loaded.
    #[error("No model is loaded")]
    ModelNotLoaded,
}

impl TrainError {
    /// Creates a model format error.
    pub fn model_format(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::ModelFormat {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}

/// Result type for training operations.
pub type TrainResult<T> = Result<T, TrainError>;
