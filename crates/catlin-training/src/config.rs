//! Solver and learner configuration.
//!
//! [`SolverConfig`] mirrors the option string of liblinear's `train`
//! command (`-s 4 -c 0.1 -e 0.1 -B 1`) and is validated eagerly, before any
//! instance log is touched. [`LearnerConfig`] adds the settings of the
//! surrounding pipeline and can be loaded from a JSON file.
//!
//! # Example
//!
//! ```
//! use catlin_training::config::{SolverConfig, SolverType};
//!
//! let config = SolverConfig::parse_options("-s_1_-c_0.5").unwrap();
//! assert_eq!(config.solver, SolverType::L2rL2lossSvcDual);
//! assert_eq!(config.cost, 0.5);
//! assert_eq!(config.to_args(), vec!["-s", "1", "-c", "0.5", "-e", "0.1", "-B", "1"]);
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use catlin_core::error::CatlinError;
use serde::{Deserialize, Serialize};

use crate::error::TrainResult;

/// The liblinear solver variants, by their numeric selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverType {
    /// L2-regularised logistic regression (primal).
    L2rLr,
    /// L2-regularised L2-loss support vector classification (dual).
    L2rL2lossSvcDual,
    /// L2-regularised L2-loss support vector classification (primal).
    L2rL2lossSvc,
    /// L2-regularised L1-loss support vector classification (dual).
    L2rL1lossSvcDual,
    /// Multi-class support vector classification by Crammer and Singer.
    McsvmCs,
    /// L1-regularised L2-loss support vector classification.
    L1rL2lossSvc,
    /// L1-regularised logistic regression.
    L1rLr,
}

impl SolverType {
    /// All variants in selector order.
    pub const ALL: [SolverType; 7] = [
        SolverType::L2rLr,
        SolverType::L2rL2lossSvcDual,
        SolverType::L2rL2lossSvc,
        SolverType::L2rL1lossSvcDual,
        SolverType::McsvmCs,
        SolverType::L1rL2lossSvc,
        SolverType::L1rLr,
    ];

    /// The numeric `-s` selector.
    pub fn code(self) -> u8 {
        match self {
            SolverType::L2rLr => 0,
            SolverType::L2rL2lossSvcDual => 1,
            SolverType::L2rL2lossSvc => 2,
            SolverType::L2rL1lossSvcDual => 3,
            SolverType::McsvmCs => 4,
            SolverType::L1rL2lossSvc => 5,
            SolverType::L1rLr => 6,
        }
    }

    /// Looks a variant up by its `-s` selector.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// The name used in model files.
    pub fn name(self) -> &'static str {
        match self {
            SolverType::L2rLr => "L2R_LR",
            SolverType::L2rL2lossSvcDual => "L2R_L2LOSS_SVC_DUAL",
            SolverType::L2rL2lossSvc => "L2R_L2LOSS_SVC",
            SolverType::L2rL1lossSvcDual => "L2R_L1LOSS_SVC_DUAL",
            SolverType::McsvmCs => "MCSVM_CS",
            SolverType::L1rL2lossSvc => "L1R_L2LOSS_SVC",
            SolverType::L1rLr => "L1R_LR",
        }
    }

    /// Looks a variant up by its model file name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for SolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options handed to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Solver variant (`-s`).
    pub solver: SolverType,
    /// Regularisation cost (`-c`).
    pub cost: f64,
    /// Stopping tolerance (`-e`).
    pub epsilon: f64,
    /// Bias value (`-B`); negative disables the bias term.
    pub bias: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver: SolverType::McsvmCs,
            cost: 0.1,
            epsilon: 0.1,
            bias: 1.0,
        }
    }
}

impl SolverConfig {
    /// Parses a liblinear option string over the defaults.
    pub fn parse_options(options: &str) -> Result<Self, CatlinError> {
        let mut config = Self::default();
        config.apply_options(options)?;
        Ok(config)
    }

    /// Applies a liblinear option string on top of this configuration.
    ///
    /// Tokens are separated by whitespace or `_`. Allowed flags are `-s`,
    /// `-c`, `-e` and `-B`. Nothing is modified if the string is invalid.
    pub fn apply_options(&mut self, options: &str) -> Result<(), CatlinError> {
        let tokens: Vec<&str> = options
            .split(|c: char| c == '_' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();
        let mut next = *self;
        for pair in tokens.chunks(2) {
            let flag = pair[0];
            let Some(name) = flag.strip_prefix('-') else {
                return Err(CatlinError::invalid(format!(
                    "option flag '{}' does not start with '-'",
                    flag
                )));
            };
            let Some(&value) = pair.get(1) else {
                return Err(CatlinError::invalid(format!(
                    "option '{}' has no value",
                    flag
                )));
            };
            match name {
                "s" => {
                    next.solver = value
                        .parse::<u8>()
                        .ok()
                        .and_then(SolverType::from_code)
                        .ok_or_else(|| {
                            CatlinError::invalid(format!(
                                "solver type (-s) '{}' is not an integer between 0 and 6",
                                value
                            ))
                        })?;
                }
                "c" => next.cost = parse_number(flag, value)?,
                "e" => next.epsilon = parse_number(flag, value)?,
                "B" => next.bias = parse_number(flag, value)?,
                _ => {
                    return Err(CatlinError::invalid(format!(
                        "unknown option '{}' with value '{}'",
                        flag, value
                    )))
                }
            }
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), CatlinError> {
        if !(self.cost > 0.0 && self.cost.is_finite()) {
            return Err(CatlinError::invalid(format!(
                "cost (-c) must be positive, got {}",
                self.cost
            )));
        }
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(CatlinError::invalid(format!(
                "epsilon (-e) must be positive, got {}",
                self.epsilon
            )));
        }
        if !self.bias.is_finite() {
            return Err(CatlinError::invalid("bias (-B) must be finite"));
        }
        Ok(())
    }

    /// Returns true if a bias term is used.
    pub fn has_bias(&self) -> bool {
        self.bias >= 0.0
    }

    /// Renders the options as command line arguments, in the order
    /// `-s -c -e -B`.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "-s".to_string(),
            self.solver.code().to_string(),
            "-c".to_string(),
            self.cost.to_string(),
            "-e".to_string(),
            self.epsilon.to_string(),
            "-B".to_string(),
            self.bias.to_string(),
        ]
    }
}

impl fmt::Display for SolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_args().join(" "))
    }
}

fn parse_number(flag: &str, value: &str) -> Result<f64, CatlinError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            CatlinError::invalid(format!(
                "option '{}' value '{}' is not numeric",
                flag, value
            ))
        })
}

/// Which output streams of an external trainer are forwarded to the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Forward nothing.
    #[default]
    Silent,
    /// Forward standard error only.
    Error,
    /// Forward standard output and standard error.
    All,
}

impl FromStr for Verbosity {
    type Err = CatlinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" => Ok(Verbosity::Silent),
            "error" => Ok(Verbosity::Error),
            "all" => Ok(Verbosity::All),
            other => Err(CatlinError::invalid(format!("unknown verbosity '{}'", other))),
        }
    }
}

/// Configuration of one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Solver options.
    pub solver: SolverConfig,
    /// Log null feature values as absent.
    pub exclude_nulls: bool,
    /// Keep the instance log (and exchange file) after training.
    pub save_instance_files: bool,
    /// Path of an external liblinear `train` executable.
    pub external_trainer: Option<PathBuf>,
    /// Argument template for the external trainer. Empty means
    /// `{options} {input} {model}`.
    pub external_args: Vec<String>,
    /// Output forwarding of the external trainer.
    pub verbosity: Verbosity,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            exclude_nulls: false,
            save_instance_files: false,
            external_trainer: None,
            external_args: Vec::new(),
            verbosity: Verbosity::Silent,
        }
    }
}

impl LearnerConfig {
    /// Loads a configuration from a JSON file. Missing fields take their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> TrainResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| CatlinError::io(path, e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            CatlinError::invalid(format!("cannot parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Sets the solver options.
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Sets whether null values are logged as absent.
    pub fn with_exclude_nulls(mut self, exclude_nulls: bool) -> Self {
        self.exclude_nulls = exclude_nulls;
        self
    }

    /// Sets whether instance files are kept after training.
    pub fn with_save_instance_files(mut self, save: bool) -> Self {
        self.save_instance_files = save;
        self
    }

    /// Delegates training to an external executable.
    pub fn with_external_trainer(mut self, program: impl Into<PathBuf>) -> Self {
        self.external_trainer = Some(program.into());
        self
    }

    /// Sets the argument template of the external trainer.
    pub fn with_external_args(mut self, args: Vec<String>) -> Self {
        self.external_args = args;
        self
    }

    /// Sets the output forwarding of the external trainer.
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Validates the solver options and the external trainer path.
    ///
    /// The trainer must exist, must not be a directory and its file name
    /// must end in `train` or `train.exe`.
    pub fn validate(&self) -> Result<(), CatlinError> {
        self.solver.validate()?;
        if let Some(program) = &self.external_trainer {
            let shown = program.display();
            if !program.exists() {
                return Err(CatlinError::invalid(format!(
                    "external trainer {} does not exist",
                    shown
                )));
            }
            if program.is_dir() {
                return Err(CatlinError::invalid(format!(
                    "external trainer {} is a directory; point it at the 'train' executable",
                    shown
                )));
            }
            let name = program
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !(name.ends_with("train") || name.ends_with("train.exe")) {
                return Err(CatlinError::invalid(format!(
                    "external trainer {} is not a 'train' or 'train.exe' executable",
                    shown
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SolverConfig::default();
        assert_eq!(config.solver, SolverType::McsvmCs);
        assert_eq!(config.to_string(), "-s 4 -c 0.1 -e 0.1 -B 1");
        assert!(config.has_bias());
    }

    #[test]
    fn test_parse_options_separators() {
        let config = SolverConfig::parse_options("-s 3  -c\t2.5_-B -1").unwrap();
        assert_eq!(config.solver, SolverType::L2rL1lossSvcDual);
        assert_eq!(config.cost, 2.5);
        assert_eq!(config.epsilon, 0.1);
        assert_eq!(config.bias, -1.0);
        assert!(!config.has_bias());
        assert_eq!(SolverConfig::parse_options("").unwrap(), SolverConfig::default());
    }

    #[test]
    fn test_parse_options_errors() {
        for options in [
            "s 4",
            "-s",
            "-x 1",
            "-s 7",
            "-s one",
            "-c abc",
            "-c 0",
            "-e -0.5",
            "-B nan",
        ] {
            let err = SolverConfig::parse_options(options).unwrap_err();
            assert!(
                matches!(err, CatlinError::InvalidParameter(_)),
                "{options}: {err}"
            );
        }
    }

    #[test]
    fn test_apply_options_is_atomic() {
        let mut config = SolverConfig::default();
        assert!(config.apply_options("-c 3 -s 9").is_err());
        assert_eq!(config, SolverConfig::default());
    }

    #[test]
    fn test_solver_type_names_and_codes() {
        for solver in SolverType::ALL {
            assert_eq!(SolverType::from_code(solver.code()), Some(solver));
            assert_eq!(SolverType::from_name(solver.name()), Some(solver));
        }
        assert_eq!(SolverType::from_code(7), None);
        assert_eq!(
            serde_json::to_string(&SolverType::L2rL2lossSvcDual).unwrap(),
            "\"L2R_L2LOSS_SVC_DUAL\""
        );
    }

    #[test]
    fn test_learner_config_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learner.json");
        fs::write(
            &path,
            r#"{"solver": {"solver": "L2R_L1LOSS_SVC_DUAL", "cost": 1.0}, "exclude_nulls": true, "verbosity": "error"}"#,
        )
        .unwrap();
        let config = LearnerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.solver.solver, SolverType::L2rL1lossSvcDual);
        assert_eq!(config.solver.epsilon, 0.1);
        assert!(config.exclude_nulls);
        assert_eq!(config.verbosity, Verbosity::Error);
        assert!(config.external_trainer.is_none());

        fs::write(&path, "{not json").unwrap();
        assert!(LearnerConfig::from_json_file(&path).is_err());
    }

    #[test]
    fn test_external_trainer_validation() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train");
        fs::write(&train, "").unwrap();
        let other = dir.path().join("svm-learn");
        fs::write(&other, "").unwrap();

        assert!(LearnerConfig::default()
            .with_external_trainer(&train)
            .validate()
            .is_ok());
        for bad in [dir.path().join("missing-train"), dir.path().to_path_buf(), other] {
            assert!(LearnerConfig::default()
                .with_external_trainer(bad)
                .validate()
                .is_err());
        }
    }

    #[test]
    fn test_verbosity_from_str() {
        assert_eq!("ALL".parse::<Verbosity>().unwrap(), Verbosity::All);
        assert!("loud".parse::<Verbosity>().is_err());
    }
}
