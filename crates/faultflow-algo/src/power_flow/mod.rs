//! Power Flow Solvers
//!
//! Newton-Raphson AC power flow in polar coordinates, split by stage:
//!
//! - [`injection`]: calculated P/Q at every bus from the Y-bus and a [`BusState`]
//! - [`mismatch`]: specified minus calculated power, in [`UnknownLayout`] order
//! - [`jacobian`]: the four partial-derivative blocks and their trimmed form
//! - [`ac_pf`]: the iteration driver and its [`NewtonState`] machine

pub mod ac_pf;
pub mod injection;
pub mod jacobian;
pub mod mismatch;

pub use ac_pf::{AcPowerFlowSolution, AcPowerFlowSolver, NewtonState};
pub use injection::{BusState, PairTerm, PowerInjections};
pub use jacobian::{Jacobian, JacobianBlocks};
pub use mismatch::{compute_mismatch, max_abs, ScheduledPower, UnknownLayout};
