//! # faultflow-algo: Power Flow and Fault Analysis
//!
//! Steady-state and short-circuit studies over a [`faultflow_core::Network`].
//!
//! ## Admittance Matrix
//!
//! [`YBus`] stamps each branch's 2×2 primitive admittance into the complex
//! bus admittance matrix. Both studies start from it.
//!
//! ## Power Flow
//!
//! [`AcPowerFlowSolver`] runs full Newton-Raphson from a flat start:
//!
//! | Bus type | Known      | Unknown    |
//! |----------|------------|------------|
//! | Slack    | \|V\|, δ   | P, Q       |
//! | PV       | P, \|V\|   | Q, δ       |
//! | PQ       | P, Q       | \|V\|, δ   |
//!
//! Non-convergence is reported through [`NewtonState`], not as an error.
//!
//! ## Fault Analysis
//!
//! [`ShortCircuitAnalyzer`] adds generator subtransient admittances to the
//! Y-bus, inverts it once and evaluates bolted three-phase faults at any bus.
//!
//! ```no_run
//! use faultflow_algo::{AcPowerFlowSolver, ShortCircuitAnalyzer};
//! # fn study(network: &faultflow_core::Network) -> faultflow_core::FlowResult<()> {
//! let solution = AcPowerFlowSolver::new().with_tolerance(1e-6).solve(network)?;
//! println!("converged after {} iterations", solution.iterations);
//!
//! for fault in ShortCircuitAnalyzer::new(network)?.sweep()? {
//!     println!("{}: {}", fault.bus_name, fault.fault_current_ka());
//! }
//! # Ok(())
//! # }
//! ```

pub mod fault;
pub mod linalg;
pub mod power_flow;
pub mod ybus;

pub use fault::{FaultError, FaultResult, ShortCircuitAnalyzer, ZBus};
pub use linalg::{ComplexMatrix, LinalgError};
pub use power_flow::{AcPowerFlowSolution, AcPowerFlowSolver, NewtonState};
pub use ybus::{BranchPrimitive, YBus, YBusError};
