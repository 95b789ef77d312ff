//! Dense linear algebra on top of faer.
//!
//! Both studies need one dense factorization per step: the Newton update
//! solves `J·Δx = mismatch` and the fault study inverts the augmented
//! admittance matrix. faer works in real arithmetic here, so complex
//! matrices are embedded as
//!
//! ```text
//! Y = G + jB   ↦   [ G  -B ]        Z = R + jX   ↤   [ R  -X ]
//!                  [ B   G ]                         [ X   R ]
//! ```
//!
//! and the inverse of the embedding is the embedding of the inverse.
//!
//! A matrix is reported singular when LU produces a non-finite solution or
//! when the estimated condition number `‖A‖∞·‖x‖∞/‖b‖∞` (or `‖A‖∞·‖A⁻¹‖∞`)
//! exceeds [`CONDITION_LIMIT`].

use faer::prelude::SpSolver;
use faer::{FaerMat, Mat};
use num_complex::Complex64;
use thiserror::Error;

/// Condition estimate above which a factorization is treated as singular.
pub const CONDITION_LIMIT: f64 = 1e12;

#[derive(Debug, Error, PartialEq)]
pub enum LinalgError {
    #[error("{context} is singular")]
    Singular { context: &'static str },

    #[error("{context} is ill-conditioned (condition estimate {estimate:.3e})")]
    IllConditioned {
        context: &'static str,
        estimate: f64,
    },

    #[error("dimension mismatch: matrix is {rows}x{cols}, right-hand side has {rhs} rows")]
    DimensionMismatch { rows: usize, cols: usize, rhs: usize },
}

/// Square dense complex matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexMatrix {
    n: usize,
    data: Vec<Complex64>,
}

impl ComplexMatrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![Complex64::new(0.0, 0.0); n * n],
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.data[row * self.n + col]
    }

    #[inline]
    pub fn add_to(&mut self, row: usize, col: usize, value: Complex64) {
        self.data[row * self.n + col] += value;
    }

    pub fn row(&self, row: usize) -> &[Complex64] {
        &self.data[row * self.n..(row + 1) * self.n]
    }

    /// Inverse via LU of the real embedding.
    pub fn inverse(&self, context: &'static str) -> Result<ComplexMatrix, LinalgError> {
        let n = self.n;
        if n == 0 {
            return Ok(ComplexMatrix::zeros(0));
        }

        let embedded = Mat::from_fn(2 * n, 2 * n, |i, j| {
            let y = self.get(i % n, j % n);
            match (i < n, j < n) {
                (true, true) | (false, false) => y.re,
                (true, false) => -y.im,
                (false, true) => y.im,
            }
        });
        let identity = Mat::from_fn(2 * n, 2 * n, |i, j| if i == j { 1.0 } else { 0.0 });

        let lu = embedded.partial_piv_lu();
        let inv = lu.solve(&identity);

        let mut out = ComplexMatrix::zeros(n);
        for i in 0..n {
            for j in 0..n {
                out.data[i * n + j] = Complex64::new(inv.read(i, j), inv.read(n + i, j));
            }
        }

        if out.data.iter().any(|z| !z.is_finite()) {
            return Err(LinalgError::Singular { context });
        }
        let estimate = mat_norm_inf(&embedded) * mat_norm_inf(&inv);
        if !estimate.is_finite() || estimate > CONDITION_LIMIT {
            return Err(LinalgError::IllConditioned { context, estimate });
        }

        Ok(out)
    }
}

/// Solve `A·x = b` for a dense real `A` with partial-pivoting LU.
pub fn solve_dense(a: &Mat<f64>, b: &[f64], context: &'static str) -> Result<Vec<f64>, LinalgError> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return Err(LinalgError::DimensionMismatch {
            rows: a.nrows(),
            cols: a.ncols(),
            rhs: n,
        });
    }
    if n == 0 {
        return Ok(vec![]);
    }

    let rhs = Mat::from_fn(n, 1, |i, _| b[i]);
    let lu = a.partial_piv_lu();
    let solution = lu.solve(&rhs);
    let x: Vec<f64> = (0..n).map(|i| solution.read(i, 0)).collect();

    if x.iter().any(|v| !v.is_finite()) {
        return Err(LinalgError::Singular { context });
    }

    let b_norm = vec_norm_inf(b);
    if b_norm == 0.0 {
        // Any nonsingular A maps zero to zero; a non-zero x means LU broke down.
        return if vec_norm_inf(&x) == 0.0 {
            Ok(x)
        } else {
            Err(LinalgError::Singular { context })
        };
    }
    let estimate = mat_norm_inf(a) * vec_norm_inf(&x) / b_norm;
    if estimate > CONDITION_LIMIT {
        return Err(LinalgError::IllConditioned { context, estimate });
    }

    Ok(x)
}

fn mat_norm_inf(m: &Mat<f64>) -> f64 {
    (0..m.nrows())
        .map(|i| (0..m.ncols()).map(|j| m.read(i, j).abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

fn vec_norm_inf(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}
