//! The per-model facade tying accumulation, training and prediction
//! together.
//!
//! A [`LinearLearner`] owns the instance log of one model. In batch mode it
//! accumulates labeled feature vectors, then trains through its
//! [`TrainerBackend`] and persists the model with the cardinalities it was
//! trained under. In classify mode it lazily loads both and ranks classes
//! for new feature vectors.
//!
//! ```no_run
//! use catlin_core::feature::{FeatureCode, FeatureVector};
//! use catlin_data::files::ModelFiles;
//! use catlin_training::{LearnerConfig, LinearLearner, TopK};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let files = ModelFiles::new("/tmp/models", "odm0.");
//! let fv = FeatureVector::new()
//!     .with_slot("POS", FeatureCode::Single(1), 3)
//!     .with_slot("LEMMA", FeatureCode::Single(0), 2);
//!
//! let mut learner = LinearLearner::batch(files.clone(), LearnerConfig::default())?;
//! learner.add_instance(1, &fv)?;
//! learner.no_more_instances()?;
//! learner.train(&fv)?;
//!
//! let mut classifier = LinearLearner::classify(files, LearnerConfig::default())?;
//! let ranked = classifier.predict(&fv, TopK::All)?;
//! println!("best class: {:?}", ranked.best());
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

use catlin_core::cardinality::Cardinalities;
use catlin_core::encode::SparseEncoder;
use catlin_core::error::CatlinError;
use catlin_core::feature::FeatureVector;
use catlin_core::sparse::SparseVector;
use catlin_data::files::ModelFiles;
use catlin_data::partition::{self, PartitionKey};
use catlin_data::problem::ProblemBuilder;
use catlin_data::store::InstanceLog;

use crate::backend::{TrainerBackend, TrainingSet};
use crate::config::LearnerConfig;
use crate::error::{TrainError, TrainResult};
use crate::model::LinearModel;
use crate::rank::{rank_into, RankedPrediction, TopK};
use crate::solver::{self, InProcessSolver};

/// One model's instance log, trainer and loaded classifier.
#[derive(Debug)]
pub struct LinearLearner {
    files: ModelFiles,
    config: LearnerConfig,
    backend: TrainerBackend,
    log: InstanceLog,
    model: Option<LinearModel>,
    encoder: Option<SparseEncoder>,
}

impl LinearLearner {
    /// Starts a fresh accumulation phase, truncating any previous log.
    pub fn batch(files: ModelFiles, config: LearnerConfig) -> TrainResult<Self> {
        config.validate()?;
        let log = InstanceLog::create(files.instance_log(), config.exclude_nulls)?;
        tracing::debug!(log = %log.path().display(), "Accumulating instances");
        Ok(Self::with_log(files, config, log))
    }

    /// Continues accumulating into an existing log.
    pub fn resume(files: ModelFiles, config: LearnerConfig) -> TrainResult<Self> {
        config.validate()?;
        let log = InstanceLog::open_append(files.instance_log(), config.exclude_nulls)?;
        Ok(Self::with_log(files, config, log))
    }

    /// Opens a trained model for prediction. The model is loaded on the
    /// first call to [`predict`](Self::predict).
    pub fn classify(files: ModelFiles, config: LearnerConfig) -> TrainResult<Self> {
        config.validate()?;
        let log = InstanceLog::open_read(files.instance_log());
        Ok(Self::with_log(files, config, log))
    }

    fn with_log(files: ModelFiles, config: LearnerConfig, log: InstanceLog) -> Self {
        Self {
            backend: TrainerBackend::from_config(&config),
            files,
            config,
            log,
            model: None,
            encoder: None,
        }
    }

    /// Replaces the trainer backend chosen from the configuration.
    pub fn with_backend(mut self, backend: TrainerBackend) -> Self {
        self.backend = backend;
        self
    }

    /// The artifact paths of this model.
    pub fn files(&self) -> &ModelFiles {
        &self.files
    }

    /// The learner configuration.
    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    /// The instance log.
    pub fn log(&self) -> &InstanceLog {
        &self.log
    }

    /// The loaded model, if any.
    pub fn model(&self) -> Option<&LinearModel> {
        self.model.as_ref()
    }

    /// Logs one labeled example.
    pub fn add_instance(&mut self, label: i32, fv: &FeatureVector) -> TrainResult<()> {
        self.log.append(label, fv)?;
        Ok(())
    }

    /// Ends the accumulation phase.
    pub fn no_more_instances(&mut self) -> TrainResult<()> {
        self.log.close()?;
        Ok(())
    }

    /// Number of logged examples, recounted from the log if needed.
    pub fn num_instances(&mut self) -> TrainResult<u64> {
        Ok(self.log.count()?)
    }

    /// Trains on the logged examples under the cardinalities of `fv`.
    ///
    /// Writes the model and the cardinalities next to each other. Unless
    /// the configuration keeps instance files, the instance log and the
    /// exchange file are deleted afterwards.
    pub fn train(&mut self, fv: &FeatureVector) -> TrainResult<&LinearModel> {
        self.log.close()?;
        let cardinalities = Cardinalities::from_feature_vector(fv);
        let encoder = self.encoder_for(cardinalities.clone())?;
        let instances = self.log.count()?;
        tracing::info!(
            model = %self.files.model().display(),
            instances,
            solver = %self.config.solver,
            "Creating model"
        );
        let model = self.backend.train(
            TrainingSet {
                log: &mut self.log,
                cardinalities: &cardinalities,
                files: &self.files,
            },
            &self.config.solver,
        )?;
        cardinalities.save(self.files.cardinalities())?;

        if !self.config.save_instance_files {
            self.log.delete()?;
            remove_if_exists(&self.files.exchange())?;
        }
        self.encoder = Some(encoder);
        Ok(&*self.model.insert(model))
    }

    /// Cross-validates the logged examples in process and returns the
    /// accuracy in percent. The log is kept.
    pub fn cross_validate(&mut self, fv: &FeatureVector, folds: usize) -> TrainResult<f64> {
        self.log.close()?;
        let cardinalities = Cardinalities::from_feature_vector(fv);
        let problem = ProblemBuilder::new(&cardinalities, self.config.solver.bias)?
            .build(&mut self.log)?;
        tracing::info!(
            log = %self.log.path().display(),
            instances = problem.len(),
            folds,
            "Cross validation"
        );
        let accuracy = solver::cross_validate(
            &InProcessSolver::default(),
            &problem,
            &self.config.solver,
            folds,
        )?;
        tracing::info!(accuracy, "Cross validation accuracy");
        Ok(accuracy)
    }

    /// Ranks the classes of the loaded model for `fv`.
    ///
    /// The model and its cardinalities are loaded on first use. Without
    /// persisted cardinalities, those of `fv` are used instead. The label
    /// [`LinearModel::predict`] picks always ranks first, so ties are
    /// broken the same way cross validation breaks them.
    pub fn predict(
        &mut self,
        fv: &FeatureVector,
        k: impl Into<TopK>,
    ) -> TrainResult<RankedPrediction> {
        self.load(fv)?;
        let (Some(model), Some(encoder)) = (&self.model, &self.encoder) else {
            return Err(TrainError::ModelNotLoaded);
        };
        let x = encoder.encode(fv);
        let (labels, scores) = decision_order(model, &x);
        Ok(rank_into(&labels, &scores, RankedPrediction::scored(k.into())))
    }

    fn load(&mut self, fv: &FeatureVector) -> TrainResult<()> {
        if self.model.is_none() {
            let path = self.files.model();
            if !path.exists() {
                return Err(TrainError::ModelNotLoaded);
            }
            let model = LinearModel::load(&path)?;
            tracing::debug!(path = %path.display(), classes = model.nr_class(), "Loaded model");
            self.model = Some(model);
        }
        if self.encoder.is_none() {
            let cardinalities = Cardinalities::load_or_compute(self.files.cardinalities(), fv)?;
            self.encoder = Some(self.encoder_for(cardinalities)?);
        }
        Ok(())
    }

    fn encoder_for(&self, cardinalities: Cardinalities) -> TrainResult<SparseEncoder> {
        Ok(SparseEncoder::new(cardinalities)?.with_exclude_nulls(self.config.exclude_nulls))
    }

    /// Moves every logged example into `destination`, tagging each with
    /// `fixed_code` before the source feature columns at `positions` (see
    /// [`partition::move_all_instances`]). This learner's log is deleted
    /// afterwards.
    pub fn move_all_instances(
        &mut self,
        destination: &mut LinearLearner,
        fixed_code: i64,
        positions: &[usize],
    ) -> TrainResult<u64> {
        self.log.close()?;
        let moved = partition::move_all_instances(
            &mut self.log,
            &mut destination.log,
            fixed_code,
            positions,
        )?;
        Ok(moved)
    }

    /// Splits the log by the value of feature `feature_index` into one
    /// sub-learner per known value plus one for `overflow_key`.
    ///
    /// The sub-learners share this learner's configuration; their logs are
    /// closed and ready for training. This learner's log is kept.
    pub fn divide_by_feature_set(
        &mut self,
        feature_index: usize,
        known_values: &BTreeSet<i64>,
        overflow_key: &str,
    ) -> TrainResult<BTreeMap<PartitionKey, LinearLearner>> {
        self.log.close()?;
        let parts = partition::partition_by_feature(
            &self.log,
            feature_index,
            known_values,
            overflow_key,
            &self.files,
        )?;
        Ok(parts
            .into_iter()
            .map(|(key, log)| {
                let files = self.files.partition(&key.to_string());
                let learner = Self::with_log(files, self.config.clone(), log)
                    .with_backend(self.backend.clone());
                (key, learner)
            })
            .collect())
    }

    /// Counts the values of the given feature columns over the log.
    pub fn feature_value_counts(
        &mut self,
        feature_indices: &[usize],
    ) -> TrainResult<BTreeMap<i64, u64>> {
        self.log.close()?;
        Ok(partition::count_by_feature(&self.log, feature_indices)?)
    }

    /// Closes the log and drops the loaded model.
    pub fn terminate(&mut self) -> TrainResult<()> {
        self.log.close()?;
        self.model = None;
        self.encoder = None;
        Ok(())
    }
}

/// Model-order labels and scores with the predicted label moved to the
/// front. Only ties can reorder the ranking: a two-class model scoring 0
/// predicts its second label.
fn decision_order(model: &LinearModel, x: &SparseVector) -> (Vec<i32>, Vec<f64>) {
    let mut labels = model.labels().to_vec();
    let mut scores = model.decision_values(x);
    scores.truncate(labels.len());
    let winner = model.predict(x);
    if let Some(pos) = labels.iter().position(|&label| label == winner) {
        labels[..=pos].rotate_right(1);
        scores[..=pos].rotate_right(1);
    }
    (labels, scores)
}

fn remove_if_exists(path: &Path) -> TrainResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CatlinError::io(path, e).into()),
    }
}
