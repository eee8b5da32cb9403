//! Per-topic sufficient statistics for the LinUCB estimator
//!
//! Each arm keeps a ridge-regularised design matrix `A = I + Σ x xᵀ`,
//! its cached inverse, and `b = Σ r x`. The point estimate is
//! `θ = A⁻¹ b`; the confidence width for a feature vector is
//! `sqrt(xᵀ A⁻¹ x)`.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Smoothing rate for the diagnostic reward estimate
pub const VALUE_SMOOTHING: f64 = 0.1;

/// Pivots smaller than this fraction of the largest entry count as zero
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Statistics for one topic
#[derive(Debug, Clone, PartialEq)]
pub struct ArmState {
    pub(crate) a: Array2<f64>,
    pub(crate) a_inv: Array2<f64>,
    pub(crate) b: Array1<f64>,
    pub(crate) count: u64,
    pub(crate) value: f64,
    pub(crate) reward_sum: f64,
    pub(crate) last_selected_at: Option<DateTime<Utc>>,
}

/// Breakdown of an arm's UCB score for one feature vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmScore {
    /// θ·x
    pub exploitation: f64,
    /// alpha · sqrt(xᵀ A⁻¹ x)
    pub exploration: f64,
    pub total: f64,
}

/// What happened to an arm's statistics after an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Learned,
    /// Inversion failed and the arm went back to cold start
    Reset,
}

impl ArmState {
    pub fn new(dim: usize) -> Self {
        Self {
            a: Array2::eye(dim),
            a_inv: Array2::eye(dim),
            b: Array1::zeros(dim),
            count: 0,
            value: 0.0,
            reward_sum: 0.0,
            last_selected_at: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.b.len()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn average_reward(&self) -> f64 {
        self.reward_sum / self.count.max(1) as f64
    }

    pub fn last_selected_at(&self) -> Option<DateTime<Utc>> {
        self.last_selected_at
    }

    /// Ridge estimate θ = A⁻¹ b
    pub fn theta(&self) -> Array1<f64> {
        self.a_inv.dot(&self.b)
    }

    pub fn score(&self, x: ArrayView1<'_, f64>, alpha: f64) -> ArmScore {
        let exploitation = self.theta().dot(&x);
        // A⁻¹ is SPD in exact arithmetic; rounding can push the form a hair below zero.
        let width = x.dot(&self.a_inv.dot(&x)).max(0.0).sqrt();
        let exploration = alpha * width;
        ArmScore {
            exploitation,
            exploration,
            total: exploitation + exploration,
        }
    }

    /// Fold one reward observation into the statistics.
    pub fn observe(&mut self, x: ArrayView1<'_, f64>, reward: f64) -> Observation {
        let outer = outer(x);
        self.a += &outer;
        self.b.scaled_add(reward, &x);

        match invert(&self.a) {
            Some(a_inv) => {
                self.a_inv = a_inv;
                self.count += 1;
                self.reward_sum += reward;
                self.value += VALUE_SMOOTHING * (reward - self.value);
                Observation::Learned
            }
            None => {
                self.reset();
                Observation::Reset
            }
        }
    }

    /// Forget all learned statistics. Counters and timestamps survive.
    pub fn reset(&mut self) {
        let dim = self.dim();
        self.a = Array2::eye(dim);
        self.a_inv = Array2::eye(dim);
        self.b = Array1::zeros(dim);
    }
}

fn outer(x: ArrayView1<'_, f64>) -> Array2<f64> {
    let n = x.len();
    Array2::from_shape_fn((n, n), |(i, j)| x[i] * x[j])
}

/// Gauss-Jordan inverse with partial pivoting.
///
/// Returns `None` for non-square, singular, ill-conditioned or
/// non-finite input.
pub fn invert(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n == 0 || n != m.ncols() {
        return None;
    }

    let scale = m.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if !scale.is_finite() || scale == 0.0 {
        return None;
    }
    let tolerance = scale * PIVOT_TOLERANCE;

    let mut work = m.clone();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        let pivot_row =
            (col..n).max_by(|&i, &j| work[[i, col]].abs().total_cmp(&work[[j, col]].abs()))?;
        let pivot = work[[pivot_row, col]];
        if pivot.abs() <= tolerance {
            return None;
        }

        if pivot_row != col {
            for k in 0..n {
                work.swap([pivot_row, k], [col, k]);
                inv.swap([pivot_row, k], [col, k]);
            }
        }

        for k in 0..n {
            work[[col, k]] /= pivot;
            inv[[col, k]] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                let w = work[[col, k]];
                let v = inv[[col, k]];
                work[[row, k]] -= factor * w;
                inv[[row, k]] -= factor * v;
            }
        }
    }

    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}
