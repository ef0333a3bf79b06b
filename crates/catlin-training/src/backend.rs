//! Where models get trained: in this process or by an external executable.
//!
//! Both backends take the same [`TrainingSet`] and return the trained
//! [`LinearModel`], which has also been written to the model path of the
//! set's [`ModelFiles`]. The external backend converts the instance log to
//! the exchange format, runs a liblinear-compatible `train` program and
//! loads the model file it writes.

use std::path::{Path, PathBuf};
use std::process::Command;

use catlin_core::cardinality::Cardinalities;
use catlin_core::error::CatlinError;
use catlin_data::convert::convert_log_file;
use catlin_data::files::ModelFiles;
use catlin_data::problem::ProblemBuilder;
use catlin_data::store::InstanceLog;

use crate::config::{LearnerConfig, SolverConfig, Verbosity};
use crate::error::TrainResult;
use crate::model::LinearModel;
use crate::solver::{InProcessSolver, LinearSolver};

/// Placeholder expanded to the solver options.
pub const OPTIONS_PLACEHOLDER: &str = "{options}";
/// Placeholder expanded to the exchange file path.
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Placeholder expanded to the model file path.
pub const MODEL_PLACEHOLDER: &str = "{model}";

const STDERR_TAIL_LINES: usize = 20;

/// Everything a backend needs to train one model.
#[derive(Debug)]
pub struct TrainingSet<'a> {
    /// The instance log; its writer should be closed.
    pub log: &'a mut InstanceLog,
    /// Cardinalities defining the index space.
    pub cardinalities: &'a Cardinalities,
    /// Artifact paths of the model.
    pub files: &'a ModelFiles,
}

/// A training backend.
#[derive(Debug, Clone)]
pub enum TrainerBackend {
    /// Train with the solvers of this crate.
    InProcess(InProcessSolver),
    /// Delegate to a liblinear-compatible `train` executable.
    ExternalExecutable {
        /// The executable.
        program: PathBuf,
        /// Argument template; see [`TrainerBackend::expand_args`].
        args: Vec<String>,
        /// Which output streams are forwarded to the log.
        verbosity: Verbosity,
    },
}

impl TrainerBackend {
    /// Selects the backend configured in `config`.
    pub fn from_config(config: &LearnerConfig) -> Self {
        match &config.external_trainer {
            Some(program) => TrainerBackend::ExternalExecutable {
                program: program.clone(),
                args: config.external_args.clone(),
                verbosity: config.verbosity,
            },
            None => TrainerBackend::InProcess(InProcessSolver::default()),
        }
    }

    /// Returns true for the external backend.
    pub fn is_external(&self) -> bool {
        matches!(self, TrainerBackend::ExternalExecutable { .. })
    }

    /// Trains a model and writes it to `set.files.model()`.
    pub fn train(&self, set: TrainingSet<'_>, solver: &SolverConfig) -> TrainResult<LinearModel> {
        let model_path = set.files.model();
        match self {
            TrainerBackend::InProcess(engine) => {
                tracing::info!(model = %model_path.display(), "Creating model");
                let problem = ProblemBuilder::new(set.cardinalities, solver.bias)?
                    .build(set.log)?;
                let model = engine.train(&problem, solver)?;
                model.save(&model_path)?;
                Ok(model)
            }
            TrainerBackend::ExternalExecutable {
                program,
                args,
                verbosity,
            } => {
                let exchange = set.files.exchange();
                convert_log_file(set.log.path(), &exchange, set.cardinalities)?;
                tracing::info!(
                    model = %model_path.display(),
                    program = %program.display(),
                    "Creating model (external)"
                );
                let argv = Self::expand_args(args, solver, &exchange, &model_path);
                run_external(program, &argv, *verbosity)?;
                LinearModel::load(&model_path)
            }
        }
    }

    /// Expands an argument template.
    ///
    /// An argument equal to `{options}` is replaced by the solver options
    /// (`-s 4 -c 0.1 ...`); `{input}` and `{model}` inside any argument are
    /// replaced by the exchange and model paths. An empty template means
    /// `{options} {input} {model}`, the calling convention of liblinear's
    /// `train`.
    pub fn expand_args(
        template: &[String],
        solver: &SolverConfig,
        input: &Path,
        model: &Path,
    ) -> Vec<String> {
        let default_template = [OPTIONS_PLACEHOLDER, INPUT_PLACEHOLDER, MODEL_PLACEHOLDER];
        let template: Vec<&str> = if template.is_empty() {
            default_template.to_vec()
        } else {
            template.iter().map(String::as_str).collect()
        };
        let input = input.to_string_lossy();
        let model = model.to_string_lossy();
        let mut argv = Vec::new();
        for arg in template {
            if arg == OPTIONS_PLACEHOLDER {
                argv.extend(solver.to_args());
            } else {
                argv.push(
                    arg.replace(INPUT_PLACEHOLDER, &input)
                        .replace(MODEL_PLACEHOLDER, &model),
                );
            }
        }
        argv
    }
}

fn run_external(program: &Path, argv: &[String], verbosity: Verbosity) -> TrainResult<()> {
    let output = Command::new(program)
        .args(argv)
        .output()
        .map_err(|e| CatlinError::io(program, e))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if verbosity == Verbosity::All {
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!(program = %program.display(), "{}", line);
        }
    }
    if verbosity != Verbosity::Silent {
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            tracing::warn!(program = %program.display(), "{}", line);
        }
    }
    if !output.status.success() {
        tracing::error!(
            program = %program.display(),
            status = %output.status,
            "External trainer failed"
        );
        return Err(CatlinError::ExternalProcessFailure {
            program: program.to_path_buf(),
            status: output.status.to_string(),
            stderr: tail(&stderr, STDERR_TAIL_LINES),
        }
        .into());
    }
    Ok(())
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
