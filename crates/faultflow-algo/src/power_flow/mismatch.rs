//! Power mismatch and the ordering of the Newton unknowns.
//!
//! | Bus   | ΔP row                         | ΔQ row                          |
//! |-------|--------------------------------|---------------------------------|
//! | Slack | none                           | none                            |
//! | PV    | `P_set/S_base − P_k`           | none                            |
//! | PQ    | `−P_load/S_base − P_k`         | `−Q_load/S_base − Q_k`          |
//!
//! Rows are ΔP for every non-slack bus in bus order, then ΔQ for every PQ bus
//! in bus order. [`UnknownLayout`] owns that ordering; the Jacobian trim and
//! the state update read it from the same value.

use faultflow_core::{BusKind, BusType, MegavoltAmperes, Network};

use super::injection::{BusState, PowerInjections};

/// Which buses carry an angle unknown and which carry a magnitude unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLayout {
    n_bus: usize,
    angle_buses: Vec<usize>,
    magnitude_buses: Vec<usize>,
}

impl UnknownLayout {
    pub fn new(bus_types: &[BusType]) -> Self {
        let mut angle_buses = Vec::new();
        let mut magnitude_buses = Vec::new();
        for (i, bus_type) in bus_types.iter().enumerate() {
            if *bus_type != BusType::Slack {
                angle_buses.push(i);
            }
            if *bus_type == BusType::PQ {
                magnitude_buses.push(i);
            }
        }
        Self {
            n_bus: bus_types.len(),
            angle_buses,
            magnitude_buses,
        }
    }

    pub fn from_network(network: &Network) -> Self {
        let types: Vec<BusType> = network.buses().map(|b| b.bus_type()).collect();
        Self::new(&types)
    }

    /// Number of unknowns (and of mismatch rows).
    pub fn len(&self) -> usize {
        self.angle_buses.len() + self.magnitude_buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_bus(&self) -> usize {
        self.n_bus
    }

    pub fn angle_buses(&self) -> &[usize] {
        &self.angle_buses
    }

    pub fn magnitude_buses(&self) -> &[usize] {
        &self.magnitude_buses
    }

    /// Row/column positions of the unknowns inside the full `2N × 2N`
    /// Jacobian (`[δ_0..δ_N, V_0..V_N]`), in unknown order.
    pub fn full_indices(&self) -> Vec<usize> {
        self.angle_buses
            .iter()
            .copied()
            .chain(self.magnitude_buses.iter().map(|&i| self.n_bus + i))
            .collect()
    }

    /// `x += Δx`: angle deltas to non-slack buses, magnitude deltas to PQ buses.
    pub fn apply_update(&self, state: &mut BusState, delta: &[f64]) {
        debug_assert_eq!(delta.len(), self.len());
        let n_ang = self.angle_buses.len();
        for (k, &bus) in self.angle_buses.iter().enumerate() {
            state.v_ang[bus] += delta[k];
        }
        for (k, &bus) in self.magnitude_buses.iter().enumerate() {
            state.v_mag[bus] += delta[n_ang + k];
        }
    }
}

/// Specified per-unit injections; entries without an equation stay zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledPower {
    pub p: Vec<f64>,
    pub q: Vec<f64>,
}

impl ScheduledPower {
    pub fn from_kinds<'a, I>(kinds: I, base: MegavoltAmperes) -> Self
    where
        I: IntoIterator<Item = &'a BusKind>,
    {
        let (p, q) = kinds
            .into_iter()
            .map(|kind| match *kind {
                BusKind::Slack => (0.0, 0.0),
                BusKind::Pv { p_setpoint, .. } => (p_setpoint.to_per_unit(base), 0.0),
                BusKind::Pq { p_load, q_load } => {
                    (-p_load.to_per_unit(base), -q_load.to_per_unit(base))
                }
            })
            .unzip();
        Self { p, q }
    }

    pub fn from_network(network: &Network) -> Self {
        Self::from_kinds(
            network.buses().map(|b| &b.kind),
            network.settings.base_power,
        )
    }
}

/// Specified minus calculated, in [`UnknownLayout`] order.
pub fn compute_mismatch(
    layout: &UnknownLayout,
    scheduled: &ScheduledPower,
    injections: &PowerInjections,
) -> Vec<f64> {
    let dp = layout
        .angle_buses
        .iter()
        .map(|&i| scheduled.p[i] - injections.p[i]);
    let dq = layout
        .magnitude_buses
        .iter()
        .map(|&i| scheduled.q[i] - injections.q[i]);
    dp.chain(dq).collect()
}

/// Largest absolute entry, zero for an empty vector and infinite if any
/// entry is NaN or infinite.
pub fn max_abs(values: &[f64]) -> f64 {
    if values.iter().any(|v| !v.is_finite()) {
        return f64::INFINITY;
    }
    values.iter().fold(0.0, |acc, v| acc.max(v.abs()))
}
