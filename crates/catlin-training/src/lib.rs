//! Training and applying linear classifiers over categorical instance logs.
//!
//! This crate turns the instance logs of `catlin-data` into trained
//! models and trained models into ranked predictions:
//!
//! - **Solver options**: [`SolverConfig`] parses and validates the
//!   liblinear option string (`-s 4 -c 0.1 -e 0.1 -B 1`)
//! - **Backends**: [`TrainerBackend`] trains in process or through an
//!   external liblinear `train` executable
//! - **Models**: [`LinearModel`] in the liblinear text format
//! - **Ranking**: [`rank_top_k`] orders classes by decision score
//! - **Facade**: [`LinearLearner`] runs the whole pipeline for one model
//!
//! # Architecture
//!
//! ```text
//!  add_instance()         train()                 predict()
//!       │                    │                        │
//!       ▼                    ▼                        ▼
//! ┌─────────────┐   ┌────────────────┐   ┌────────────────────────┐
//! │ InstanceLog │──▶│ TrainerBackend │──▶│ LinearModel + .car     │
//! │   (.ins)    │   │ InProcess/Ext. │   │ SparseEncoder, ranking │
//! └─────────────┘   └────────────────┘   └────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use catlin_training::{SolverConfig, SolverType};
//!
//! let config = SolverConfig::parse_options("-s 3 -c 1").unwrap();
//! assert_eq!(config.solver, SolverType::L2rL1lossSvcDual);
//! assert_eq!(config.to_string(), "-s 3 -c 1 -e 0.1 -B 1");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod error;
pub mod learner;
pub mod model;
pub mod rank;
pub mod solver;

pub use backend::{TrainerBackend, TrainingSet};
pub use config::{LearnerConfig, SolverConfig, SolverType, Verbosity};
pub use error::{TrainError, TrainResult};
pub use learner::LinearLearner;
pub use model::LinearModel;
pub use rank::{rank_into, rank_top_k, RankedEntry, RankedPrediction, TopK};
pub use solver::{cross_validate, InProcessSolver, LinearSolver};
