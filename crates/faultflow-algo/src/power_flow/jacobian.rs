//! Power-flow Jacobian.
//!
//! With `a_km = δ_k − δ_m − θ_km`:
//!
//! ```text
//! ∂P_k/∂δ_m =  V_k|Y_km|V_m sin a_km               ∂P_k/∂δ_k = −V_k Σ_{m≠k} |Y_km|V_m sin a_km
//! ∂P_k/∂V_m =  V_k|Y_km| cos a_km                  ∂P_k/∂V_k =  V_k|Y_kk| cos θ_kk + Σ_m |Y_km|V_m cos a_km
//! ∂Q_k/∂δ_m = −V_k|Y_km|V_m cos a_km               ∂Q_k/∂δ_k =  V_k Σ_{m≠k} |Y_km|V_m cos a_km
//! ∂Q_k/∂V_m =  V_k|Y_km| sin a_km                  ∂Q_k/∂V_k = −V_k|Y_kk| sin θ_kk + Σ_m |Y_km|V_m sin a_km
//! ```
//!
//! [`JacobianBlocks`] holds the full `2N × 2N` matrix `[[J_Pδ, J_PV], [J_Qδ, J_QV]]`.
//! [`Jacobian`] keeps only the rows and columns of actual unknowns, in
//! [`UnknownLayout`] order, and is rebuilt from scratch every iteration.

use faer::Mat;
use sprs::{CsMat, TriMat};

use super::injection::{BusState, PairTerm};
use super::mismatch::UnknownLayout;
use crate::linalg::{self, LinalgError};
use crate::ybus::YBus;

/// Untrimmed Jacobian over every bus angle and magnitude.
#[derive(Debug, Clone)]
pub struct JacobianBlocks {
    n_bus: usize,
    full: Mat<f64>,
}

impl JacobianBlocks {
    pub fn compute(ybus: &YBus, state: &BusState) -> Self {
        let n = ybus.n_bus();
        let mut full = Mat::zeros(2 * n, 2 * n);
        for k in 0..n {
            for m in 0..n {
                full.write(k, m, dp_ddelta(ybus, state, k, m));
                full.write(k, n + m, dp_dv(ybus, state, k, m));
                full.write(n + k, m, dq_ddelta(ybus, state, k, m));
                full.write(n + k, n + m, dq_dv(ybus, state, k, m));
            }
        }
        Self { n_bus: n, full }
    }

    pub fn n_bus(&self) -> usize {
        self.n_bus
    }

    pub fn dp_ddelta(&self, k: usize, m: usize) -> f64 {
        self.full.read(k, m)
    }

    pub fn dp_dv(&self, k: usize, m: usize) -> f64 {
        self.full.read(k, self.n_bus + m)
    }

    pub fn dq_ddelta(&self, k: usize, m: usize) -> f64 {
        self.full.read(self.n_bus + k, m)
    }

    pub fn dq_dv(&self, k: usize, m: usize) -> f64 {
        self.full.read(self.n_bus + k, self.n_bus + m)
    }

    /// Drop slack rows/columns and PV magnitude rows/columns.
    pub fn trim(&self, layout: &UnknownLayout) -> Jacobian {
        let keep = layout.full_indices();
        let matrix = Mat::from_fn(keep.len(), keep.len(), |i, j| {
            self.full.read(keep[i], keep[j])
        });
        Jacobian { matrix }
    }
}

/// Jacobian restricted to the Newton unknowns.
#[derive(Debug, Clone)]
pub struct Jacobian {
    matrix: Mat<f64>,
}

impl Jacobian {
    pub fn build(ybus: &YBus, state: &BusState, layout: &UnknownLayout) -> Self {
        JacobianBlocks::compute(ybus, state).trim(layout)
    }

    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.matrix.read(row, col)
    }

    /// Solve `J·Δx = mismatch`.
    pub fn solve(&self, mismatch: &[f64]) -> Result<Vec<f64>, LinalgError> {
        linalg::solve_dense(&self.matrix, mismatch, "Jacobian")
    }

    /// CSR copy, skipping entries with `|value| <= drop_tol`.
    pub fn to_csr(&self, drop_tol: f64) -> CsMat<f64> {
        let n = self.dim();
        let mut triplets = TriMat::new((n, n));
        for i in 0..n {
            for j in 0..n {
                let value = self.matrix.read(i, j);
                if value.abs() > drop_tol {
                    triplets.add_triplet(i, j, value);
                }
            }
        }
        triplets.to_csr()
    }
}

fn dp_ddelta(ybus: &YBus, state: &BusState, k: usize, m: usize) -> f64 {
    let v = &state.v_mag;
    if k == m {
        let sum: f64 = (0..ybus.n_bus())
            .filter(|&j| j != k)
            .map(|j| {
                let t = PairTerm::new(ybus, state, k, j);
                t.y_mag * v[j] * t.angle().sin()
            })
            .sum();
        -v[k] * sum
    } else {
        let t = PairTerm::new(ybus, state, k, m);
        v[k] * t.y_mag * v[m] * t.angle().sin()
    }
}

fn dp_dv(ybus: &YBus, state: &BusState, k: usize, m: usize) -> f64 {
    let v = &state.v_mag;
    if k == m {
        let own = PairTerm::new(ybus, state, k, k);
        let sum: f64 = (0..ybus.n_bus())
            .map(|j| {
                let t = PairTerm::new(ybus, state, k, j);
                t.y_mag * v[j] * t.angle().cos()
            })
            .sum();
        v[k] * own.y_mag * own.theta.cos() + sum
    } else {
        let t = PairTerm::new(ybus, state, k, m);
        v[k] * t.y_mag * t.angle().cos()
    }
}

fn dq_ddelta(ybus: &YBus, state: &BusState, k: usize, m: usize) -> f64 {
    let v = &state.v_mag;
    if k == m {
        let sum: f64 = (0..ybus.n_bus())
            .filter(|&j| j != k)
            .map(|j| {
                let t = PairTerm::new(ybus, state, k, j);
                t.y_mag * v[j] * t.angle().cos()
            })
            .sum();
        v[k] * sum
    } else {
        let t = PairTerm::new(ybus, state, k, m);
        -v[k] * t.y_mag * v[m] * t.angle().cos()
    }
}

fn dq_dv(ybus: &YBus, state: &BusState, k: usize, m: usize) -> f64 {
    let v = &state.v_mag;
    if k == m {
        let own = PairTerm::new(ybus, state, k, k);
        let sum: f64 = (0..ybus.n_bus())
            .map(|j| {
                let t = PairTerm::new(ybus, state, k, j);
                t.y_mag * v[j] * t.angle().sin()
            })
            .sum();
        -v[k] * own.y_mag * own.theta.sin() + sum
    } else {
        let t = PairTerm::new(ybus, state, k, m);
        v[k] * t.y_mag * t.angle().sin()
    }
}
