//! # AC Power Flow Solver with Newton-Raphson Method
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NEWTON-RAPHSON ITERATION                                               │
//! │                                                                         │
//! │  flat start: δ = 0, |V| = 1.0 at every bus                              │
//! │                                                                         │
//! │  1. mismatch = specified − calculated          (UnknownLayout order)    │
//! │  2. max|mismatch| < tolerance        → Converged                        │
//! │     updates == max_iterations        → FailedMaxIterations              │
//! │  3. J = trimmed Jacobian at the current state                           │
//! │  4. solve J·Δx = mismatch            (singular J → SingularSystem)      │
//! │  5. δ += Δδ (non-slack), |V| += Δ|V| (PQ); updates += 1; go to 1        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Hitting the iteration cap is not an error: the solution comes back with
//! [`NewtonState::FailedMaxIterations`] and the best-effort state, and a
//! warning is logged.

use std::collections::HashMap;

use faultflow_core::{
    BusId, BusType, FlowError, FlowResult, GenId, Megavars, MegavoltAmperes, Megawatts, Network,
    NewtonConfig, PerUnit, Radians,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::injection::{BusState, PowerInjections};
use super::jacobian::Jacobian;
use super::mismatch::{compute_mismatch, max_abs, ScheduledPower, UnknownLayout};
use crate::ybus::YBus;

/// Newton-Raphson driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NewtonState {
    Iterating,
    Converged,
    FailedMaxIterations,
}

/// AC Power Flow solution
#[derive(Debug, Clone, Serialize)]
pub struct AcPowerFlowSolution {
    /// Terminal state: `Converged` or `FailedMaxIterations`
    pub status: NewtonState,
    /// Number of state updates performed
    pub iterations: usize,
    /// Largest absolute mismatch (pu) of the final state
    pub max_mismatch: f64,
    /// Largest absolute mismatch of every evaluation, starting at the flat start
    pub mismatch_history: Vec<f64>,
    pub state: BusState,
    /// Calculated per-unit injections at the final state
    pub injections: PowerInjections,
    /// Generator active power output (MW)
    pub generator_p_mw: HashMap<GenId, f64>,
    /// Generator reactive power output (MVAR)
    pub generator_q_mvar: HashMap<GenId, f64>,
    #[serde(skip)]
    base_power: MegavoltAmperes,
    #[serde(skip)]
    slack: BusId,
}

impl AcPowerFlowSolution {
    pub fn converged(&self) -> bool {
        self.status == NewtonState::Converged
    }

    pub fn voltage(&self, bus: BusId) -> Option<(PerUnit, Radians)> {
        let i = bus.value();
        Some((
            PerUnit(*self.state.v_mag.get(i)?),
            Radians(*self.state.v_ang.get(i)?),
        ))
    }

    /// Real and reactive power delivered by the slack bus.
    pub fn slack_power(&self) -> (Megawatts, Megavars) {
        let i = self.slack.value();
        (
            Megawatts::from_per_unit(self.injections.p[i], self.base_power),
            Megavars::from_per_unit(self.injections.q[i], self.base_power),
        )
    }

    /// Net injection at a bus in MW/Mvar.
    pub fn bus_injection(&self, bus: BusId) -> Option<(Megawatts, Megavars)> {
        let i = bus.value();
        Some((
            Megawatts::from_per_unit(*self.injections.p.get(i)?, self.base_power),
            Megavars::from_per_unit(*self.injections.q.get(i)?, self.base_power),
        ))
    }

    /// Write the solved voltages back into the network's buses.
    pub fn apply_to(&self, network: &mut Network) -> FlowResult<()> {
        network.apply_state(&self.state.v_mag, &self.state.v_ang)
    }
}

/// AC Power Flow Solver configuration
#[derive(Debug, Clone)]
pub struct AcPowerFlowSolver {
    /// Convergence tolerance for power mismatches (pu)
    pub tolerance: f64,
    /// Maximum Newton-Raphson state updates
    pub max_iterations: usize,
}

impl Default for AcPowerFlowSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AcPowerFlowSolver {
    pub fn new() -> Self {
        Self::from_config(&NewtonConfig::default())
    }

    pub fn from_config(config: &NewtonConfig) -> Self {
        Self {
            tolerance: config.tolerance,
            max_iterations: config.max_iterations,
        }
    }

    /// Set convergence tolerance
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Solve AC power flow for the given network from a flat start.
    pub fn solve(&self, network: &Network) -> FlowResult<AcPowerFlowSolution> {
        network.validate()?;
        let ybus = YBus::from_network(network)?;
        self.solve_with_ybus(network, &ybus)
    }

    /// Solve with a prebuilt admittance matrix.
    pub fn solve_with_ybus(
        &self,
        network: &Network,
        ybus: &YBus,
    ) -> FlowResult<AcPowerFlowSolution> {
        NewtonConfig {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
        }
        .validate()?;
        network.settings.validate()?;
        let slack = network.slack_bus()?;
        if ybus.n_bus() != network.bus_count() {
            return Err(FlowError::InvalidTopology(format!(
                "admittance matrix has {} buses, network has {}",
                ybus.n_bus(),
                network.bus_count()
            )));
        }

        let layout = UnknownLayout::from_network(network);
        let scheduled = ScheduledPower::from_network(network);
        let mut state = BusState::flat_start(network);
        let mut history = Vec::new();
        let mut iterations = 0;

        loop {
            let injections = PowerInjections::compute(ybus, &state);
            let mismatch = compute_mismatch(&layout, &scheduled, &injections);
            let max_mismatch = max_abs(&mismatch);
            history.push(max_mismatch);
            debug!(iteration = iterations, max_mismatch, "newton-raphson mismatch");

            match self.next_state(max_mismatch, iterations) {
                NewtonState::Iterating => {
                    let jacobian = Jacobian::build(ybus, &state, &layout);
                    let delta = jacobian.solve(&mismatch).map_err(|e| {
                        FlowError::SingularSystem(format!("{} at iteration {}", e, iterations + 1))
                    })?;
                    layout.apply_update(&mut state, &delta);
                    iterations += 1;
                }
                status => {
                    match status {
                        NewtonState::Converged => info!(
                            iterations,
                            max_mismatch, "newton-raphson converged"
                        ),
                        _ => warn!(
                            iterations,
                            max_mismatch,
                            tolerance = self.tolerance,
                            "newton-raphson did not converge"
                        ),
                    }
                    return Ok(self.build_solution(
                        network, slack, status, iterations, history, state, injections,
                    ));
                }
            }
        }
    }

    fn next_state(&self, max_mismatch: f64, iterations: usize) -> NewtonState {
        if max_mismatch < self.tolerance {
            NewtonState::Converged
        } else if iterations >= self.max_iterations {
            NewtonState::FailedMaxIterations
        } else {
            NewtonState::Iterating
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_solution(
        &self,
        network: &Network,
        slack: BusId,
        status: NewtonState,
        iterations: usize,
        mismatch_history: Vec<f64>,
        state: BusState,
        injections: PowerInjections,
    ) -> AcPowerFlowSolution {
        let base_power = network.settings.base_power;
        let base_mva = base_power.value();

        // Loads only sit on PQ buses, so a generator's output is its bus injection
        let mut generator_p_mw = HashMap::new();
        let mut generator_q_mvar = HashMap::new();
        for gen in network.generators() {
            let i = gen.bus.value();
            let is_source = network
                .bus(gen.bus)
                .is_some_and(|b| b.bus_type() != BusType::PQ);
            if is_source {
                generator_p_mw.insert(gen.id, injections.p[i] * base_mva);
                generator_q_mvar.insert(gen.id, injections.q[i] * base_mva);
            }
        }

        AcPowerFlowSolution {
            status,
            iterations,
            max_mismatch: mismatch_history.last().copied().unwrap_or(0.0),
            mismatch_history,
            state,
            injections,
            generator_p_mw,
            generator_q_mvar,
            base_power,
            slack,
        }
    }
}
