//! Bus power injections in polar form.
//!
//! ```text
//! P_k = Σ_m |V_k||V_m||Y_km| cos(δ_k − δ_m − θ_km)
//! Q_k = Σ_m |V_k||V_m||Y_km| sin(δ_k − δ_m − θ_km)
//! ```
//!
//! [`PairTerm`] is the one place `|Y_km|`, `θ_km` and `δ_k − δ_m` are
//! computed; the Jacobian reuses it.

use faultflow_core::Network;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::ybus::YBus;

/// Voltage magnitudes (pu) and angles (rad) in bus order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusState {
    pub v_mag: Vec<f64>,
    pub v_ang: Vec<f64>,
}

impl BusState {
    pub fn new(v_mag: Vec<f64>, v_ang: Vec<f64>) -> Self {
        debug_assert_eq!(v_mag.len(), v_ang.len());
        Self { v_mag, v_ang }
    }

    /// 1.0 pu at zero angle on every bus, setpoints included.
    pub fn flat_start(network: &Network) -> Self {
        let n = network.bus_count();
        Self {
            v_mag: vec![1.0; n],
            v_ang: vec![0.0; n],
        }
    }

    /// The voltages currently stored on the network's buses.
    pub fn from_network(network: &Network) -> Self {
        Self {
            v_mag: network.buses().map(|b| b.voltage_pu.value()).collect(),
            v_ang: network.buses().map(|b| b.angle_rad.value()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.v_mag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v_mag.is_empty()
    }

    /// Complex bus voltage `|V|∠δ`.
    pub fn phasor(&self, bus: usize) -> Complex64 {
        Complex64::from_polar(self.v_mag[bus], self.v_ang[bus])
    }
}

/// Admittance polar form and angle difference for one `(k, m)` pair.
#[derive(Debug, Clone, Copy)]
pub struct PairTerm {
    /// |Y_km|
    pub y_mag: f64,
    /// θ_km = arg(Y_km)
    pub theta: f64,
    /// δ_k − δ_m
    pub delta: f64,
}

impl PairTerm {
    #[inline]
    pub fn new(ybus: &YBus, state: &BusState, k: usize, m: usize) -> Self {
        let (y_mag, theta) = ybus.get(k, m).to_polar();
        Self {
            y_mag,
            theta,
            delta: state.v_ang[k] - state.v_ang[m],
        }
    }

    /// a_km = δ_k − δ_m − θ_km
    #[inline]
    pub fn angle(&self) -> f64 {
        self.delta - self.theta
    }
}

/// Computed per-unit injections at every bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerInjections {
    pub p: Vec<f64>,
    pub q: Vec<f64>,
}

impl PowerInjections {
    pub fn compute(ybus: &YBus, state: &BusState) -> Self {
        let n = ybus.n_bus();
        debug_assert_eq!(state.len(), n);

        let mut p = vec![0.0; n];
        let mut q = vec![0.0; n];
        for k in 0..n {
            for m in 0..n {
                let term = PairTerm::new(ybus, state, k, m);
                if term.y_mag == 0.0 {
                    continue;
                }
                let scale = state.v_mag[k] * state.v_mag[m] * term.y_mag;
                let a = term.angle();
                p[k] += scale * a.cos();
                q[k] += scale * a.sin();
            }
        }

        Self { p, q }
    }
}
