//! Symmetrical (three-phase bolted) fault analysis with the bus impedance
//! matrix.
//!
//! Each generator is modelled as its subtransient reactance to ground, added
//! to the diagonal of the Y-bus:
//!
//! ```text
//! Y'[g,g] = Y[g,g] + 1 / (j · X''_sys),   X''_sys = X'' · S_base / S_machine
//! Z       = (Y')⁻¹
//! I_f     = V_f / Z[n,n]
//! V_k     = (1 − Z[k,n] / Z[n,n]) · V_f
//! ```
//!
//! with every pre-fault voltage `V_f` at 1.0 pu. The Z-bus is factorized once
//! per analyzer, so faults at different buses share the same inversion.

use faultflow_core::{
    BusId, FlowError, FlowResult, Kiloamperes, Kilovolts, MegavoltAmperes, Network,
};
use num_complex::Complex64;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::linalg::{ComplexMatrix, LinalgError};
use crate::ybus::{write_complex_table, YBus};

/// Pre-fault voltage at every bus (pu).
pub const PREFAULT_VOLTAGE: f64 = 1.0;

#[derive(Debug, Error, PartialEq)]
pub enum FaultError {
    #[error("network has no generators; the admittance matrix has no path to ground")]
    NoGeneration,

    #[error("generator {name} has machine base {base} MVA; a positive rating is required")]
    InvalidMachineBase { name: String, base: f64 },

    #[error("generator {name} has subtransient reactance {x}; a positive value is required")]
    InvalidReactance { name: String, x: f64 },

    #[error("fault bus index {bus} is outside a {n_bus}-bus network")]
    UnknownBus { bus: usize, n_bus: usize },

    #[error("driving-point impedance at bus {0} is zero")]
    ZeroDrivingPoint(usize),

    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

impl From<FaultError> for FlowError {
    fn from(err: FaultError) -> Self {
        match err {
            FaultError::NoGeneration
            | FaultError::ZeroDrivingPoint(_)
            | FaultError::Linalg(_) => FlowError::SingularSystem(err.to_string()),
            FaultError::InvalidMachineBase { .. } | FaultError::InvalidReactance { .. } => {
                FlowError::Validation(err.to_string())
            }
            FaultError::UnknownBus { .. } => FlowError::InvalidTopology(err.to_string()),
        }
    }
}

/// Bus impedance matrix of the fault-augmented network.
#[derive(Debug, Clone, PartialEq)]
pub struct ZBus {
    matrix: ComplexMatrix,
}

impl ZBus {
    pub fn n_bus(&self) -> usize {
        self.matrix.dim()
    }

    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.matrix.get(row, col)
    }
}

impl std::fmt::Display for ZBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_complex_table(f, &self.matrix)
    }
}

/// Outcome of a bolted fault at one bus.
#[derive(Debug, Clone, Serialize)]
pub struct FaultResult {
    pub bus: BusId,
    pub bus_name: String,
    /// Fault current (pu)
    pub fault_current: Complex64,
    /// Post-fault voltage at every bus, in bus order (pu)
    pub voltages: Vec<Complex64>,
    pub base_kv: Kilovolts,
    pub base_power: MegavoltAmperes,
}

impl FaultResult {
    /// |I_f| in per-unit.
    pub fn fault_current_pu(&self) -> f64 {
        self.fault_current.norm()
    }

    /// |I_f| in kA, using the faulted bus's base voltage.
    pub fn fault_current_ka(&self) -> Kiloamperes {
        let i_base = self.base_power.base_current(self.base_kv);
        i_base * self.fault_current_pu()
    }

    pub fn voltage(&self, bus: BusId) -> Option<Complex64> {
        self.voltages.get(bus.value()).copied()
    }
}

/// Fault study over one network.
#[derive(Debug, Clone)]
pub struct ShortCircuitAnalyzer {
    augmented: YBus,
    zbus: ZBus,
    bus_names: Vec<String>,
    base_kv: Vec<Kilovolts>,
    base_power: MegavoltAmperes,
}

impl ShortCircuitAnalyzer {
    /// Build the Y-bus, add generator admittances and invert.
    pub fn new(network: &Network) -> FlowResult<Self> {
        let ybus = YBus::from_network(network)?;
        Self::from_ybus(network, &ybus)
    }

    /// Same as [`ShortCircuitAnalyzer::new`] with a prebuilt passive Y-bus.
    pub fn from_ybus(network: &Network, ybus: &YBus) -> FlowResult<Self> {
        network.settings.validate()?;
        if ybus.n_bus() != network.bus_count() {
            return Err(FlowError::InvalidTopology(format!(
                "admittance matrix has {} buses, network has {}",
                ybus.n_bus(),
                network.bus_count()
            )));
        }

        let additions = generator_admittances(network)?;
        let augmented = ybus.with_diagonal_additions(additions);
        let matrix = augmented.invert().map_err(FaultError::from)?;
        debug!(n_bus = matrix.dim(), "bus impedance matrix built");

        Ok(Self {
            augmented,
            zbus: ZBus { matrix },
            bus_names: network.buses().map(|b| b.name.clone()).collect(),
            base_kv: network.buses().map(|b| b.base_kv).collect(),
            base_power: network.settings.base_power,
        })
    }

    pub fn zbus(&self) -> &ZBus {
        &self.zbus
    }

    /// Y-bus with the generator admittances on its diagonal.
    pub fn augmented_ybus(&self) -> &YBus {
        &self.augmented
    }

    /// Bolted three-phase fault at `bus`.
    pub fn fault_at(&self, bus: BusId) -> FlowResult<FaultResult> {
        Ok(self.compute(bus.value())?)
    }

    pub fn fault_at_named(&self, name: &str) -> FlowResult<FaultResult> {
        let index = self
            .bus_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| FlowError::InvalidTopology(format!("unknown bus '{}'", name)))?;
        self.fault_at(BusId::new(index))
    }

    /// Fault at every bus in turn.
    pub fn sweep(&self) -> FlowResult<Vec<FaultResult>> {
        (0..self.zbus.n_bus())
            .map(|n| self.compute(n).map_err(FlowError::from))
            .collect()
    }

    fn compute(&self, n: usize) -> Result<FaultResult, FaultError> {
        let n_bus = self.zbus.n_bus();
        if n >= n_bus {
            return Err(FaultError::UnknownBus { bus: n, n_bus });
        }

        let z_nn = self.zbus.get(n, n);
        if z_nn.norm() == 0.0 || !z_nn.is_finite() {
            return Err(FaultError::ZeroDrivingPoint(n));
        }

        let v_f = Complex64::new(PREFAULT_VOLTAGE, 0.0);
        let fault_current = v_f / z_nn;
        let voltages = (0..n_bus)
            .map(|k| (Complex64::new(1.0, 0.0) - self.zbus.get(k, n) / z_nn) * v_f)
            .collect();

        let result = FaultResult {
            bus: BusId::new(n),
            bus_name: self.bus_names[n].clone(),
            fault_current,
            voltages,
            base_kv: self.base_kv[n],
            base_power: self.base_power,
        };
        info!(
            bus = %result.bus_name,
            current_pu = result.fault_current_pu(),
            "symmetrical fault"
        );
        Ok(result)
    }
}

/// `(bus index, 1/(j·X''_sys))` for every generator.
pub fn generator_admittances(network: &Network) -> Result<Vec<(usize, Complex64)>, FaultError> {
    if network.generators().is_empty() {
        return Err(FaultError::NoGeneration);
    }

    let system_base = network.settings.base_power;
    network
        .generators()
        .iter()
        .map(|gen| {
            let machine_base = gen.machine_base().value();
            if !(machine_base > 0.0 && machine_base.is_finite()) {
                return Err(FaultError::InvalidMachineBase {
                    name: gen.name.clone(),
                    base: machine_base,
                });
            }
            if !(gen.subtransient_x > 0.0 && gen.subtransient_x.is_finite()) {
                return Err(FaultError::InvalidReactance {
                    name: gen.name.clone(),
                    x: gen.subtransient_x,
                });
            }
            let x_sys = gen.subtransient_x_system(system_base);
            Ok((gen.bus.value(), Complex64::new(0.0, x_sys).inv()))
        })
        .collect()
}
