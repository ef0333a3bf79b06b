//! In-memory training problems built from instance logs.
//!
//! A [`Problem`] is the bulk-read counterpart of an [`InstanceLog`]: every
//! record decoded into a sorted sparse row, plus the label column and the
//! dimensionality of the index space. When a bias term is configured
//! (`bias >= 0`) every row carries one extra trailing node at index
//! `dimensionality` whose value is the bias.

use std::io::BufRead;
use std::path::Path;

use catlin_core::cardinality::{Cardinalities, OffsetTable};
use catlin_core::error::{CatlinError, Result};
use catlin_core::sparse::{FeatureNode, SparseVector};

use crate::convert::decode_record;
use crate::store::InstanceLog;

/// A labelled sparse data set ready for a linear solver.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    labels: Vec<i32>,
    rows: Vec<SparseVector>,
    dimensionality: u32,
    bias: f64,
}

impl Problem {
    /// Assembles a problem from labels and feature rows (without bias
    /// nodes). Rows are sorted by index; index 0 is rejected.
    pub fn from_rows(labels: Vec<i32>, rows: Vec<SparseVector>, bias: f64) -> Result<Self> {
        if labels.len() != rows.len() {
            return Err(CatlinError::invalid(format!(
                "{} labels for {} rows",
                labels.len(),
                rows.len()
            )));
        }
        let mut rows = rows;
        let mut max_index = 0u32;
        for (i, row) in rows.iter_mut().enumerate() {
            if row.iter().any(|node| node.index == 0) {
                return Err(CatlinError::invalid(format!(
                    "row {} uses feature index 0; indices start at 1",
                    i
                )));
            }
            row.normalize();
            max_index = max_index.max(row.max_index());
        }
        Self::finish(labels, rows, max_index, bias)
    }

    fn finish(
        labels: Vec<i32>,
        mut rows: Vec<SparseVector>,
        max_index: u32,
        bias: f64,
    ) -> Result<Self> {
        let dimensionality = if bias >= 0.0 {
            let bias_index = max_index.checked_add(1).ok_or_else(|| {
                CatlinError::invalid("no feature index is left for the bias term")
            })?;
            for row in &mut rows {
                row.push(FeatureNode::new(bias_index, bias));
            }
            bias_index
        } else {
            max_index
        };
        Ok(Self {
            labels,
            rows,
            dimensionality,
            bias,
        })
    }

    /// Number of examples.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if the problem holds no examples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in log order.
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// All rows, bias nodes included.
    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    /// Row `i`, bias node included.
    pub fn row(&self, i: usize) -> &SparseVector {
        &self.rows[i]
    }

    /// Dimensionality of the index space, counting the bias feature.
    pub fn dimensionality(&self) -> u32 {
        self.dimensionality
    }

    /// Number of real features, not counting the bias feature.
    pub fn nr_feature(&self) -> u32 {
        if self.has_bias() {
            self.dimensionality - 1
        } else {
            self.dimensionality
        }
    }

    /// The bias value; negative when no bias term is used.
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Returns true if rows carry a bias node.
    pub fn has_bias(&self) -> bool {
        self.bias >= 0.0
    }

    /// Builds the problem made of the examples at `indices`, in that order.
    /// Dimensionality and bias are kept.
    pub fn subset(&self, indices: &[usize]) -> Problem {
        Problem {
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            dimensionality: self.dimensionality,
            bias: self.bias,
        }
    }
}

/// Reads instance logs into [`Problem`]s.
#[derive(Debug, Clone)]
pub struct ProblemBuilder {
    offsets: OffsetTable,
    bias: f64,
}

impl ProblemBuilder {
    /// Creates a builder. A negative `bias` disables the bias term.
    ///
    /// Fails if the cardinalities do not fit the index space.
    pub fn new(cardinalities: &Cardinalities, bias: f64) -> Result<Self> {
        Ok(Self {
            offsets: cardinalities.offsets()?,
            bias,
        })
    }

    /// Reads every record of `log`.
    ///
    /// Row storage is reserved up front from the log's example count.
    pub fn build(&self, log: &mut InstanceLog) -> Result<Problem> {
        let expected = log.count()?;
        let lines = log.lines()?;
        let path = lines.path().to_path_buf();
        let problem = self.build_lines(lines, &path, expected)?;
        tracing::debug!(
            path = %path.display(),
            instances = problem.len(),
            dimensionality = problem.dimensionality(),
            "Built problem"
        );
        Ok(problem)
    }

    /// Reads every record from `reader`. `path` names the source in errors.
    pub fn build_from_reader<R: BufRead>(&self, reader: R, path: &Path) -> Result<Problem> {
        let lines = reader.lines().enumerate().map(|(i, line)| {
            line.map(|line| (i + 1, line))
                .map_err(|e| CatlinError::io(path, e))
        });
        self.build_lines(lines, path, 0)
    }

    fn build_lines<I>(&self, lines: I, path: &Path, expected: u64) -> Result<Problem>
    where
        I: Iterator<Item = Result<(usize, String)>>,
    {
        let expected = usize::try_from(expected).unwrap_or(usize::MAX);
        let mut labels: Vec<i32> = Vec::new();
        let mut rows: Vec<SparseVector> = Vec::new();
        reserve(&mut labels, expected, path)?;
        reserve(&mut rows, expected, path)?;

        let mut max_index = 0u32;
        for item in lines {
            let (line, text) = item?;
            if text.trim().is_empty() {
                continue;
            }
            let mut row = SparseVector::with_capacity(self.offsets.len());
            let label = decode_record(&text, &self.offsets, path, line, |index| {
                row.push(FeatureNode::indicator(index))
            })?;
            row.normalize();
            max_index = max_index.max(row.max_index());
            if labels.len() == labels.capacity() {
                reserve(&mut labels, 1, path)?;
                reserve(&mut rows, 1, path)?;
            }
            labels.push(label);
            rows.push(row);
        }
        Problem::finish(labels, rows, max_index, self.bias)
    }
}

fn reserve<T>(v: &mut Vec<T>, additional: usize, path: &Path) -> Result<()> {
    v.try_reserve(additional).map_err(|e| {
        CatlinError::ResourceExhausted(format!(
            "cannot hold {} more instances from {}: {}",
            additional,
            path.display(),
            e
        ))
    })
}
