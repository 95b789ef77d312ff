//! Bus admittance (Y-bus) matrix assembly.
//!
//! Every branch contributes a 2×2 primitive admittance `p` between its two
//! endpoint indices `i` and `j`:
//!
//! ```text
//! Y[i,i] += p[0,0]    Y[i,j] += p[0,1]
//! Y[j,i] += p[1,0]    Y[j,j] += p[1,1]
//! ```
//!
//! The matrix is always rebuilt from the branch list; nothing patches an
//! existing Y-bus in place. The fault study derives its augmented copy through
//! [`YBus::with_diagonal_additions`].

use faultflow_core::{Branch, FlowError, Network, PrimitiveAdmittance};
use num_complex::Complex64;
use thiserror::Error;

use crate::linalg::{ComplexMatrix, LinalgError};

/// Errors from Y-bus matrix operations
#[derive(Debug, Error, PartialEq)]
pub enum YBusError {
    #[error("No buses found in network")]
    NoBuses,

    #[error("Branch {branch} references bus index {bus}, but the network has {n_bus} buses")]
    UnknownBus {
        branch: usize,
        bus: usize,
        n_bus: usize,
    },
}

impl From<YBusError> for FlowError {
    fn from(err: YBusError) -> Self {
        FlowError::InvalidTopology(err.to_string())
    }
}

/// Anything that can be stamped into a Y-bus.
pub trait BranchPrimitive {
    /// `(from, to)` bus indices, matching the primitive's row order.
    fn endpoints(&self) -> (usize, usize);
    fn primitive(&self) -> PrimitiveAdmittance;
}

impl BranchPrimitive for Branch {
    fn endpoints(&self) -> (usize, usize) {
        (self.from_bus.value(), self.to_bus.value())
    }

    fn primitive(&self) -> PrimitiveAdmittance {
        self.primitive
    }
}

impl<T: BranchPrimitive + ?Sized> BranchPrimitive for &T {
    fn endpoints(&self) -> (usize, usize) {
        (**self).endpoints()
    }

    fn primitive(&self) -> PrimitiveAdmittance {
        (**self).primitive()
    }
}

impl BranchPrimitive for (usize, usize, PrimitiveAdmittance) {
    fn endpoints(&self) -> (usize, usize) {
        (self.0, self.1)
    }

    fn primitive(&self) -> PrimitiveAdmittance {
        self.2
    }
}

/// Dense complex admittance matrix indexed by bus position.
#[derive(Debug, Clone, PartialEq)]
pub struct YBus {
    matrix: ComplexMatrix,
}

impl YBus {
    /// Accumulate every branch primitive into an `n_bus × n_bus` matrix.
    pub fn assemble<I>(n_bus: usize, branches: I) -> Result<Self, YBusError>
    where
        I: IntoIterator,
        I::Item: BranchPrimitive,
    {
        if n_bus == 0 {
            return Err(YBusError::NoBuses);
        }

        let mut matrix = ComplexMatrix::zeros(n_bus);
        for (k, branch) in branches.into_iter().enumerate() {
            let (i, j) = branch.endpoints();
            for bus in [i, j] {
                if bus >= n_bus {
                    return Err(YBusError::UnknownBus {
                        branch: k,
                        bus,
                        n_bus,
                    });
                }
            }

            let p = branch.primitive();
            matrix.add_to(i, i, p.get(0, 0));
            matrix.add_to(i, j, p.get(0, 1));
            matrix.add_to(j, i, p.get(1, 0));
            matrix.add_to(j, j, p.get(1, 1));
        }

        Ok(Self { matrix })
    }

    /// Build the Y-bus of a network; bus ids are matrix positions.
    pub fn from_network(network: &Network) -> Result<Self, YBusError> {
        Self::assemble(network.bus_count(), network.branches())
    }

    #[inline]
    pub fn n_bus(&self) -> usize {
        self.matrix.dim()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.matrix.get(row, col)
    }

    pub fn matrix(&self) -> &ComplexMatrix {
        &self.matrix
    }

    /// True when `Y[i,j] == Y[j,i]` within `tol` for every pair.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        let n = self.n_bus();
        (0..n).all(|i| (i + 1..n).all(|j| (self.get(i, j) - self.get(j, i)).norm() <= tol))
    }

    /// Copy with extra admittance added on selected diagonal entries.
    pub fn with_diagonal_additions<I>(&self, additions: I) -> Self
    where
        I: IntoIterator<Item = (usize, Complex64)>,
    {
        let mut matrix = self.matrix.clone();
        for (bus, y) in additions {
            matrix.add_to(bus, bus, y);
        }
        Self { matrix }
    }

    /// Bus impedance matrix `Z = Y⁻¹`.
    pub fn invert(&self) -> Result<ComplexMatrix, LinalgError> {
        self.matrix.inverse("admittance matrix")
    }
}

impl std::fmt::Display for YBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_complex_table(f, &self.matrix)
    }
}

/// One row per line, entries as `re±imj` with five decimals.
pub(crate) fn write_complex_table(
    f: &mut std::fmt::Formatter<'_>,
    matrix: &ComplexMatrix,
) -> std::fmt::Result {
    for i in 0..matrix.dim() {
        let cells: Vec<String> = matrix
            .row(i)
            .iter()
            .map(|z| format!("{:>10.5}{:+.5}j", z.re, z.im))
            .collect();
        writeln!(f, "{}", cells.join("  "))?;
    }
    Ok(())
}
