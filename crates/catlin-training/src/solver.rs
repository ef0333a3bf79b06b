//! In-process linear solvers.
//!
//! Two families are provided:
//!
//! - dual coordinate descent for L2-regularised L1- and L2-loss SVMs,
//!   trained one-vs-rest with one subproblem per class in parallel;
//! - the multi-class SVM of Crammer and Singer, solved by sequential dual
//!   updates with shrinking.
//!
//! Classes are ordered by first appearance in the problem. Random
//! permutations come from a seeded generator so that training the same
//! problem twice yields the same model. The remaining liblinear variants
//! are only available through an external trainer.

use catlin_core::error::CatlinError;
use catlin_core::sparse::SparseVector;
use catlin_data::problem::Problem;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::{SolverConfig, SolverType};
use crate::error::{TrainError, TrainResult};
use crate::model::LinearModel;

const DEFAULT_SEED: u64 = 1;
const DUAL_CD_MAX_ITER: usize = 1000;
const MCSVM_MAX_ITER: usize = 100_000;

/// Trains linear models from problems.
pub trait LinearSolver: Send + Sync {
    /// Trains a model on `problem`.
    fn train(&self, problem: &Problem, config: &SolverConfig) -> TrainResult<LinearModel>;
}

/// The solvers implemented in this crate.
#[derive(Debug, Clone, Copy)]
pub struct InProcessSolver {
    seed: u64,
}

impl Default for InProcessSolver {
    fn default() -> Self {
        Self { seed: DEFAULT_SEED }
    }
}

impl InProcessSolver {
    /// Creates a solver with the given permutation seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Returns true if `solver` is implemented in-process.
    pub fn supports(solver: SolverType) -> bool {
        matches!(
            solver,
            SolverType::L2rL2lossSvcDual | SolverType::L2rL1lossSvcDual | SolverType::McsvmCs
        )
    }
}

impl LinearSolver for InProcessSolver {
    fn train(&self, problem: &Problem, config: &SolverConfig) -> TrainResult<LinearModel> {
        if !Self::supports(config.solver) {
            return Err(TrainError::UnsupportedSolver(config.solver));
        }
        if problem.is_empty() {
            return Err(TrainError::EmptyProblem);
        }
        let (labels, classes) = group_classes(problem.labels());
        let nr_class = labels.len();
        let w_size = problem.dimensionality() as usize;

        let w = match config.solver {
            SolverType::McsvmCs => {
                let mut solver = McsvmCs {
                    rows: problem.rows(),
                    classes: &classes,
                    nr_class,
                    w_size,
                    cost: config.cost,
                    eps: config.epsilon,
                    rng: StdRng::seed_from_u64(self.seed),
                };
                solver.solve()
            }
            solver_type => {
                let l1_loss = solver_type == SolverType::L2rL1lossSvcDual;
                let nr_w = if nr_class == 2 { 1 } else { nr_class };
                let columns: Vec<Vec<f64>> = (0..nr_w)
                    .into_par_iter()
                    .map(|class| {
                        let y: Vec<f64> = classes
                            .iter()
                            .map(|&c| if c == class { 1.0 } else { -1.0 })
                            .collect();
                        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(class as u64));
                        solve_dual_cd(problem.rows(), &y, w_size, config, l1_loss, &mut rng)
                    })
                    .collect();
                interleave(&columns, w_size)
            }
        };
        tracing::debug!(
            solver = %config.solver,
            classes = nr_class,
            instances = problem.len(),
            features = problem.nr_feature(),
            "Trained model"
        );
        LinearModel::new(config.solver, labels, problem.nr_feature(), problem.bias(), w)
    }
}

/// Estimates accuracy (in percent) by `folds`-fold cross validation.
///
/// The examples are shuffled once with a seeded generator and split into
/// contiguous folds. Each fold is predicted by a model trained on the
/// others; folds are trained in parallel.
pub fn cross_validate(
    solver: &dyn LinearSolver,
    problem: &Problem,
    config: &SolverConfig,
    folds: usize,
) -> TrainResult<f64> {
    let l = problem.len();
    if l == 0 {
        return Err(TrainError::EmptyProblem);
    }
    if folds < 2 || folds > l {
        return Err(CatlinError::invalid(format!(
            "number of folds must be between 2 and {}, got {}",
            l, folds
        ))
        .into());
    }
    let mut perm: Vec<usize> = (0..l).collect();
    perm.shuffle(&mut StdRng::seed_from_u64(DEFAULT_SEED));
    let fold_start: Vec<usize> = (0..=folds).map(|i| i * l / folds).collect();

    let predictions: Vec<Vec<(usize, i32)>> = (0..folds)
        .into_par_iter()
        .map(|fold| -> TrainResult<Vec<(usize, i32)>> {
            let (begin, end) = (fold_start[fold], fold_start[fold + 1]);
            let train: Vec<usize> = perm[..begin]
                .iter()
                .chain(&perm[end..])
                .copied()
                .collect();
            let model = solver.train(&problem.subset(&train), config)?;
            Ok(perm[begin..end]
                .iter()
                .map(|&i| (i, model.predict(problem.row(i))))
                .collect())
        })
        .collect::<TrainResult<_>>()?;

    let labels = problem.labels();
    let correct = predictions
        .iter()
        .flatten()
        .filter(|&&(i, predicted)| labels[i] == predicted)
        .count();
    Ok(100.0 * correct as f64 / l as f64)
}

/// Maps labels to class indices by order of first appearance.
fn group_classes(labels: &[i32]) -> (Vec<i32>, Vec<usize>) {
    let mut distinct: Vec<i32> = Vec::new();
    let classes = labels
        .iter()
        .map(|label| match distinct.iter().position(|d| d == label) {
            Some(class) => class,
            None => {
                distinct.push(*label);
                distinct.len() - 1
            }
        })
        .collect();
    (distinct, classes)
}

/// Lays per-class weight columns out row-major by feature.
fn interleave(columns: &[Vec<f64>], w_size: usize) -> Vec<f64> {
    let nr_w = columns.len();
    let mut w = vec![0.0; w_size * nr_w];
    for (class, column) in columns.iter().enumerate() {
        for (j, &value) in column.iter().enumerate() {
            w[j * nr_w + class] = value;
        }
    }
    w
}

fn dot(w: &[f64], x: &SparseVector) -> f64 {
    x.iter().map(|n| w[n.index as usize - 1] * n.value).sum()
}

/// Dual coordinate descent for a binary L2-regularised SVM with labels
/// `y` in {+1, -1}.
fn solve_dual_cd(
    rows: &[SparseVector],
    y: &[f64],
    w_size: usize,
    config: &SolverConfig,
    l1_loss: bool,
    rng: &mut StdRng,
) -> Vec<f64> {
    let l = rows.len();
    let (diag, upper) = if l1_loss {
        (0.0, config.cost)
    } else {
        (0.5 / config.cost, f64::INFINITY)
    };
    let qd: Vec<f64> = rows.iter().map(|x| diag + x.norm_squared()).collect();
    let mut w = vec![0.0; w_size];
    let mut alpha = vec![0.0; l];
    let mut index: Vec<usize> = (0..l).collect();
    let mut active = l;
    let mut pg_max_old = f64::INFINITY;
    let mut pg_min_old = f64::NEG_INFINITY;

    for _ in 0..DUAL_CD_MAX_ITER {
        let mut pg_max_new = f64::NEG_INFINITY;
        let mut pg_min_new = f64::INFINITY;
        for i in 0..active {
            let j = rng.gen_range(i..active);
            index.swap(i, j);
        }

        let mut s = 0;
        while s < active {
            let i = index[s];
            let yi = y[i];
            let g = yi * dot(&w, &rows[i]) - 1.0 + alpha[i] * diag;

            let mut pg = 0.0;
            if alpha[i] == 0.0 {
                if g > pg_max_old {
                    active -= 1;
                    index.swap(s, active);
                    continue;
                } else if g < 0.0 {
                    pg = g;
                }
            } else if alpha[i] == upper {
                if g < pg_min_old {
                    active -= 1;
                    index.swap(s, active);
                    continue;
                } else if g > 0.0 {
                    pg = g;
                }
            } else {
                pg = g;
            }
            pg_max_new = pg_max_new.max(pg);
            pg_min_new = pg_min_new.min(pg);

            if pg.abs() > 1e-12 {
                let old = alpha[i];
                alpha[i] = (alpha[i] - g / qd[i]).max(0.0).min(upper);
                let d = (alpha[i] - old) * yi;
                for node in &rows[i] {
                    w[node.index as usize - 1] += d * node.value;
                }
            }
            s += 1;
        }

        if pg_max_new - pg_min_new <= config.epsilon {
            if active == l {
                break;
            }
            active = l;
            pg_max_old = f64::INFINITY;
            pg_min_old = f64::NEG_INFINITY;
            continue;
        }
        pg_max_old = if pg_max_new <= 0.0 { f64::INFINITY } else { pg_max_new };
        pg_min_old = if pg_min_new >= 0.0 { f64::NEG_INFINITY } else { pg_min_new };
    }
    w
}

/// Crammer and Singer's multi-class SVM.
struct McsvmCs<'a> {
    rows: &'a [SparseVector],
    classes: &'a [usize],
    nr_class: usize,
    w_size: usize,
    cost: f64,
    eps: f64,
    rng: StdRng,
}

impl McsvmCs<'_> {
    fn solve(&mut self) -> Vec<f64> {
        let l = self.rows.len();
        let nr_class = self.nr_class;
        let c = self.cost;
        let mut w = vec![0.0; self.w_size * nr_class];
        let mut alpha = vec![0.0; l * nr_class];
        let mut alpha_index: Vec<usize> = (0..l).flat_map(|_| 0..nr_class).collect();
        let mut y_index: Vec<usize> = self.classes.to_vec();
        let mut active_size_i = vec![nr_class; l];
        let qd: Vec<f64> = self.rows.iter().map(|x| x.norm_squared()).collect();
        let mut index: Vec<usize> = (0..l).collect();
        let mut active = l;
        let mut eps_shrink = (10.0 * self.eps).max(1.0);
        let mut start_from_all = true;

        let mut g = vec![0.0; nr_class];
        let mut b = vec![0.0; nr_class];
        let mut alpha_new = vec![0.0; nr_class];
        let mut changes: Vec<(usize, f64)> = Vec::with_capacity(nr_class);

        for _ in 0..MCSVM_MAX_ITER {
            let mut stopping = f64::NEG_INFINITY;
            for i in 0..active {
                let j = self.rng.gen_range(i..active);
                index.swap(i, j);
            }

            let mut s = 0;
            while s < active {
                let i = index[s];
                let ai = qd[i];
                if ai <= 0.0 {
                    s += 1;
                    continue;
                }
                let alpha_i = &mut alpha[i * nr_class..(i + 1) * nr_class];
                let alpha_index_i = &mut alpha_index[i * nr_class..(i + 1) * nr_class];
                let yi_class = self.classes[i];
                let mut size = active_size_i[i];
                let mut yi = y_index[i];

                for (m, gm) in g.iter_mut().enumerate().take(size) {
                    *gm = if m == yi { 0.0 } else { 1.0 };
                }
                for node in &self.rows[i] {
                    let row = (node.index as usize - 1) * nr_class;
                    for m in 0..size {
                        g[m] += w[row + alpha_index_i[m]] * node.value;
                    }
                }

                let mut min_g = f64::INFINITY;
                let mut max_g = f64::NEG_INFINITY;
                for m in 0..size {
                    if alpha_i[alpha_index_i[m]] < 0.0 && g[m] < min_g {
                        min_g = g[m];
                    }
                    if g[m] > max_g {
                        max_g = g[m];
                    }
                }
                if yi < size && alpha_i[yi_class] < c && g[yi] < min_g {
                    min_g = g[yi];
                }

                let shrunk = |m: usize, yi: usize, alpha: f64, g_m: f64| {
                    let bound = if m == yi { c } else { 0.0 };
                    alpha == bound && g_m < min_g
                };
                let mut m = 0;
                while m < size {
                    if shrunk(m, yi, alpha_i[alpha_index_i[m]], g[m]) {
                        size -= 1;
                        while size > m {
                            if !shrunk(size, yi, alpha_i[alpha_index_i[size]], g[size]) {
                                alpha_index_i.swap(m, size);
                                g.swap(m, size);
                                if yi == size {
                                    yi = m;
                                } else if yi == m {
                                    yi = size;
                                }
                                break;
                            }
                            size -= 1;
                        }
                    }
                    m += 1;
                }
                active_size_i[i] = size;
                y_index[i] = yi;

                if size <= 1 {
                    active -= 1;
                    index.swap(s, active);
                    continue;
                }
                if max_g - min_g <= 1e-12 {
                    s += 1;
                    continue;
                }
                stopping = stopping.max(max_g - min_g);

                for m in 0..size {
                    b[m] = g[m] - ai * alpha_i[alpha_index_i[m]];
                }
                solve_sub_problem(ai, yi, c, &b[..size], &mut alpha_new[..size]);

                changes.clear();
                for m in 0..size {
                    let d = alpha_new[m] - alpha_i[alpha_index_i[m]];
                    alpha_i[alpha_index_i[m]] = alpha_new[m];
                    if d.abs() >= 1e-12 {
                        changes.push((alpha_index_i[m], d));
                    }
                }
                for node in &self.rows[i] {
                    let row = (node.index as usize - 1) * nr_class;
                    for &(class, d) in &changes {
                        w[row + class] += d * node.value;
                    }
                }
                s += 1;
            }

            if stopping < eps_shrink {
                if stopping < self.eps && start_from_all {
                    break;
                }
                active = l;
                active_size_i.iter_mut().for_each(|size| *size = nr_class);
                eps_shrink = (eps_shrink / 2.0).max(self.eps);
                start_from_all = true;
            } else {
                start_from_all = false;
            }
        }
        w
    }
}

/// Solves the per-example subproblem of the Crammer and Singer dual.
fn solve_sub_problem(ai: f64, yi: usize, c_yi: f64, b: &[f64], alpha_new: &mut [f64]) {
    let active = b.len();
    let mut d = b.to_vec();
    if yi < active {
        d[yi] += ai * c_yi;
    }
    d.sort_by(|x, y| y.total_cmp(x));

    let mut beta = d[0] - ai * c_yi;
    let mut r = 1;
    while r < active && beta < r as f64 * d[r] {
        beta += d[r];
        r += 1;
    }
    beta /= r as f64;

    for (m, value) in alpha_new.iter_mut().enumerate() {
        let bound = if m == yi { c_yi } else { 0.0 };
        *value = bound.min((beta - b[m]) / ai);
    }
}
