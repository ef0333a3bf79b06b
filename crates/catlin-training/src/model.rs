//! Trained linear models in the liblinear text format.
//!
//! ```text
//! solver_type MCSVM_CS
//! nr_class 3
//! label 1 2 3
//! nr_feature 4
//! bias 1
//! w
//! 0.25 -0.1 0
//! ...
//! ```
//!
//! One weight row per feature follows the `w` line, plus one row for the
//! bias feature when `bias >= 0`. A row holds one weight per class, or a
//! single weight for two-class models trained by a one-vs-rest solver.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use catlin_core::error::CatlinError;
use catlin_core::sparse::SparseVector;

use crate::config::SolverType;
use crate::error::{TrainError, TrainResult};

/// A trained linear classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    solver_type: SolverType,
    labels: Vec<i32>,
    nr_feature: u32,
    bias: f64,
    w: Vec<f64>,
}

impl LinearModel {
    /// Assembles a model. `w` is row-major by feature, with
    /// [`nr_w`](Self::nr_w) weights per row.
    pub fn new(
        solver_type: SolverType,
        labels: Vec<i32>,
        nr_feature: u32,
        bias: f64,
        w: Vec<f64>,
    ) -> TrainResult<Self> {
        let model = Self {
            solver_type,
            labels,
            nr_feature,
            bias,
            w,
        };
        let expected = model.w_size() * model.nr_w();
        if model.w.len() != expected {
            return Err(CatlinError::invalid(format!(
                "model needs {} weights, got {}",
                expected,
                model.w.len()
            ))
            .into());
        }
        Ok(model)
    }

    /// The solver that produced the model.
    pub fn solver_type(&self) -> SolverType {
        self.solver_type
    }

    /// Class labels, in model order.
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Number of classes.
    pub fn nr_class(&self) -> usize {
        self.labels.len()
    }

    /// Number of features, not counting the bias feature.
    pub fn nr_feature(&self) -> u32 {
        self.nr_feature
    }

    /// Bias value; negative when the model has no bias term.
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// The weights, row-major by feature.
    pub fn weights(&self) -> &[f64] {
        &self.w
    }

    /// Weights per feature row.
    pub fn nr_w(&self) -> usize {
        if self.nr_class() == 2 && self.solver_type != SolverType::McsvmCs {
            1
        } else {
            self.nr_class()
        }
    }

    fn w_size(&self) -> usize {
        self.nr_feature as usize + usize::from(self.bias >= 0.0)
    }

    /// Raw decision values, one per class in [`labels`](Self::labels)
    /// order.
    ///
    /// Indices above [`nr_feature`](Self::nr_feature) are ignored, so an
    /// encoded vector may carry codes unseen at training time. The bias
    /// weight is added when the model has a bias term. For two-class models
    /// with a single weight vector the second class scores 0.
    pub fn decision_values(&self, x: &SparseVector) -> Vec<f64> {
        let nr_w = self.nr_w();
        let mut dec = vec![0.0; self.nr_class().max(nr_w)];
        for node in x {
            if node.index == 0 || node.index > self.nr_feature {
                continue;
            }
            let row = (node.index as usize - 1) * nr_w;
            for (d, w) in dec.iter_mut().zip(&self.w[row..row + nr_w]) {
                *d += w * node.value;
            }
        }
        if self.bias >= 0.0 {
            let row = self.nr_feature as usize * nr_w;
            for (d, w) in dec.iter_mut().zip(&self.w[row..row + nr_w]) {
                *d += w * self.bias;
            }
        }
        dec
    }

    /// Predicts the label of `x`.
    ///
    /// Ties go to the class that comes first in model order.
    pub fn predict(&self, x: &SparseVector) -> i32 {
        let dec = self.decision_values(x);
        if self.nr_w() == 1 && self.nr_class() == 2 {
            return if dec[0] > 0.0 {
                self.labels[0]
            } else {
                self.labels[1]
            };
        }
        let mut best = 0;
        for (i, &d) in dec.iter().enumerate() {
            if d > dec[best] {
                best = i;
            }
        }
        self.labels.get(best).copied().unwrap_or_default()
    }

    /// Renders the text format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "solver_type {}", self.solver_type.name());
        let _ = writeln!(out, "nr_class {}", self.nr_class());
        out.push_str("label");
        for label in &self.labels {
            let _ = write!(out, " {}", label);
        }
        out.push('\n');
        let _ = writeln!(out, "nr_feature {}", self.nr_feature);
        let _ = writeln!(out, "bias {}", self.bias);
        out.push_str("w\n");
        for row in self.w.chunks(self.nr_w().max(1)) {
            for w in row {
                let _ = write!(out, "{} ", w);
            }
            out.push('\n');
        }
        out
    }

    /// Writes the model to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> TrainResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_text()).map_err(|e| CatlinError::io(path, e))?;
        tracing::debug!(path = %path.display(), classes = self.nr_class(), "Saved model");
        Ok(())
    }

    /// Reads a model from `path`.
    pub fn load(path: impl AsRef<Path>) -> TrainResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| CatlinError::io(path, e))?;
        Self::parse(&text, path)
    }

    /// Parses the text format. `path` names the source in errors.
    pub fn parse(text: &str, path: &Path) -> TrainResult<Self> {
        let mut solver_type = None;
        let mut nr_class = None;
        let mut labels = Vec::new();
        let mut nr_feature = None;
        let mut bias = -1.0;

        let mut lines = text.lines().enumerate();
        let mut weights_line = 0;
        for (i, line) in lines.by_ref() {
            let lineno = i + 1;
            let mut parts = line.split_whitespace();
            let Some(key) = parts.next() else {
                continue;
            };
            let bad = |reason: &str| TrainError::model_format(path, lineno, reason);
            match key {
                "solver_type" => {
                    let name = parts.next().unwrap_or("");
                    solver_type = Some(
                        SolverType::from_name(name)
                            .ok_or_else(|| bad(&format!("unknown solver type '{}'", name)))?,
                    );
                }
                "nr_class" => {
                    nr_class = Some(parse_field::<usize>(parts.next(), &bad, "nr_class")?);
                }
                "label" => {
                    labels = parts
                        .map(|t| t.parse::<i32>().map_err(|_| bad("label is not an integer")))
                        .collect::<TrainResult<Vec<_>>>()?;
                }
                "nr_feature" => {
                    nr_feature = Some(parse_field::<u32>(parts.next(), &bad, "nr_feature")?);
                }
                "bias" => bias = parse_field::<f64>(parts.next(), &bad, "bias")?,
                "w" => {
                    weights_line = lineno;
                    break;
                }
                other => return Err(bad(&format!("unknown header '{}'", other))),
            }
        }
        if weights_line == 0 {
            let last = text.lines().count();
            return Err(TrainError::model_format(path, last, "missing 'w' section"));
        }
        let header = |reason: &str| TrainError::model_format(path, weights_line, reason);
        let solver_type = solver_type.ok_or_else(|| header("missing solver_type"))?;
        let nr_class = nr_class.ok_or_else(|| header("missing nr_class"))?;
        let nr_feature = nr_feature.ok_or_else(|| header("missing nr_feature"))?;
        if labels.len() != nr_class {
            return Err(header("label count does not match nr_class"));
        }

        let mut w = Vec::new();
        for (i, line) in lines {
            for token in line.split_whitespace() {
                let value = token.parse::<f64>().map_err(|_| {
                    TrainError::model_format(path, i + 1, "weight is not a number")
                })?;
                w.push(value);
            }
        }
        Self::new(solver_type, labels, nr_feature, bias, w).map_err(|_| {
            TrainError::model_format(path, weights_line, "weight count does not match the header")
        })
    }
}

fn parse_field<T: std::str::FromStr>(
    token: Option<&str>,
    bad: &impl Fn(&str) -> TrainError,
    name: &str,
) -> TrainResult<T> {
    token
        .and_then(|t| t.parse::<T>().ok())
        .ok_or_else(|| bad(&format!("{} is not a number", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use catlin_core::sparse::FeatureNode;

    fn vector(indices: &[u32]) -> SparseVector {
        indices.iter().copied().map(FeatureNode::indicator).collect()
    }

    fn three_class() -> LinearModel {
        // Two features plus bias, three classes.
        LinearModel::new(
            SolverType::McsvmCs,
            vec![3, 1, 2],
            2,
            1.0,
            vec![
                1.0, 0.0, -1.0, //
                0.0, 2.0, 0.0, //
                0.5, 0.5, 0.5,
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_decision_values_add_bias_and_ignore_unknown_indices() {
        let model = three_class();
        assert_eq!(model.decision_values(&vector(&[1])), vec![1.5, 0.5, -0.5]);
        assert_eq!(model.decision_values(&vector(&[2, 9])), vec![0.5, 2.5, 0.5]);
        assert_eq!(model.predict(&vector(&[1])), 3);
        assert_eq!(model.predict(&vector(&[2])), 1);
    }

    #[test]
    fn test_ties_go_to_first_class() {
        let model = three_class();
        assert_eq!(model.predict(&vector(&[])), 3);
    }

    #[test]
    fn test_two_class_single_vector() {
        let model =
            LinearModel::new(SolverType::L2rL2lossSvcDual, vec![1, -1], 1, -1.0, vec![2.0])
                .unwrap();
        assert_eq!(model.nr_w(), 1);
        assert_eq!(model.decision_values(&vector(&[1])), vec![2.0, 0.0]);
        assert_eq!(model.predict(&vector(&[1])), 1);
        assert_eq!(model.predict(&vector(&[])), -1);
    }

    #[test]
    fn test_weight_count_is_checked() {
        let model = LinearModel::new(SolverType::McsvmCs, vec![1, 2, 3], 2, -1.0, vec![0.0; 9]);
        assert!(model.is_err());
    }

    #[test]
    fn test_text_format() {
        let model = three_class();
        let text = model.to_text();
        assert!(text.starts_with(
            "solver_type MCSVM_CS\nnr_class 3\nlabel 3 1 2\nnr_feature 2\nbias 1\nw\n1 0 -1 \n"
        ));
        let parsed = LinearModel::parse(&text, Path::new("m.mod")).unwrap();
        assert_eq!(parsed, model);
    }

    #[test]
    fn test_parse_liblinear_output() {
        let text = "solver_type L2R_L2LOSS_SVC_DUAL\nnr_class 2\nlabel 1 -1\nnr_feature 3\nbias -1\nw\n0.1 \n-0.25 \n1e-3 \n";
        let model = LinearModel::parse(text, Path::new("m.mod")).unwrap();
        assert_eq!(model.weights(), &[0.1, -0.25, 0.001]);
        assert!(model.bias() < 0.0);
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let err = LinearModel::parse("solver_type NOPE\n", Path::new("m.mod")).unwrap_err();
        assert!(matches!(err, TrainError::ModelFormat { line: 1, .. }));

        let text = "solver_type MCSVM_CS\nnr_class 2\nlabel 1 2\nnr_feature 1\nbias -1\nw\n0 x\n";
        let err = LinearModel::parse(text, Path::new("m.mod")).unwrap_err();
        assert!(matches!(err, TrainError::ModelFormat { line: 7, .. }));

        let text = "solver_type MCSVM_CS\nnr_class 2\nlabel 1 2\nnr_feature 1\nbias -1\nw\n0\n";
        assert!(LinearModel::parse(text, Path::new("m.mod")).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.mod");
        let model = three_class();
        model.save(&path).unwrap();
        assert_eq!(LinearModel::load(&path).unwrap(), model);
        assert!(LinearModel::load(dir.path().join("missing.mod")).is_err());
    }
}
