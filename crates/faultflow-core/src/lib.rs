//! # faultflow-core: Network Model for Power-Flow and Fault Studies
//!
//! Holds the data a study consumes: buses with their classification,
//! branches reduced to 2×2 primitive admittances, generators and loads, and
//! the system per-unit base.
//!
//! ## Design
//!
//! The network is an undirected petgraph graph whose **nodes are buses** and
//! whose **edges are branches**. Buses are never removed, so a bus's
//! `NodeIndex` equals its position in every matrix and vector the solvers
//! build. [`BusId`] wraps that position and is assigned by [`Network::add_bus`]
//! in registration order; it is scoped to one network instance.
//!
//! Generators and loads are kept alongside the graph and referenced from their
//! bus. Attaching them updates the bus classification's setpoints:
//!
//! ```text
//! ┌──────────┬──────────────────────────────┬─────────────────────────────┐
//! │ BUS KIND │ SETPOINTS                    │ ATTACHMENTS ALLOWED         │
//! │──────────│──────────────────────────────│─────────────────────────────│
//! │ Slack    │ none (|V| from its generator)│ one generator               │
//! │ PV       │ P (MW), |V| (pu)             │ one generator               │
//! │ PQ       │ load P (MW), load Q (Mvar)   │ one load                    │
//! └──────────┴──────────────────────────────┴─────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use faultflow_core::*;
//! use num_complex::Complex64;
//!
//! let mut network = Network::new();
//! let b1 = network.add_bus("Bus1", Kilovolts(20.0), BusType::Slack).unwrap();
//! let b2 = network.add_bus("Bus2", Kilovolts(20.0), BusType::PQ).unwrap();
//!
//! let z = Complex64::new(0.01, 0.1);
//! let primitive = PrimitiveAdmittance::pi(z, 0.02).unwrap();
//! network
//!     .add_branch(Branch::new("L1", b1, b2, BranchKind::Line, primitive))
//!     .unwrap();
//!
//! network
//!     .add_generator(Generator::new("G1", b1, PerUnit(1.0), Megawatts(100.0), 0.12))
//!     .unwrap();
//! network
//!     .add_load(Load::new("Load2", b2, Megawatts(50.0), Megavars(20.0)))
//!     .unwrap();
//!
//! assert_eq!(network.slack_bus().unwrap(), b1);
//! assert!(network.validate().is_ok());
//! ```

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use num_complex::Complex64;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::{Graph, Undirected};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod units;

pub use config::{NewtonConfig, Settings, StudyConfig};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{FlowError, FlowResult};
pub use units::{
    Degrees, Hertz, Kiloamperes, Kilovolts, Megavars, MegavoltAmperes, Megawatts, PerUnit,
    Radians,
};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }
    /// Position of the bus in admittance matrices and state vectors.
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
    #[inline]
    fn node(self) -> NodeIndex {
        NodeIndex::new(self.0)
    }
}

impl BranchId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BranchId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl GenId {
    #[inline]
    pub fn new(value: usize) -> Self {
        GenId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl LoadId {
    #[inline]
    pub fn new(value: usize) -> Self {
        LoadId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

// =============================================================================
// Bus classification
// =============================================================================

/// Bus classification tag.
///
/// Parses from `"Slack"`, `"PV"` or `"PQ"` (case-insensitive, optional
/// `_Bus` suffix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusType {
    /// |V| and θ fixed; P and Q are results
    Slack,
    /// P and |V| specified; Q and θ are results
    PV,
    /// P and Q specified; |V| and θ are results
    PQ,
}

impl FromStr for BusType {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let tag = lower.strip_suffix("_bus").unwrap_or(&lower);
        match tag {
            "slack" => Ok(BusType::Slack),
            "pv" => Ok(BusType::PV),
            "pq" => Ok(BusType::PQ),
            _ => Err(FlowError::InvalidBusType(format!(
                "unrecognized bus type '{}'",
                s
            ))),
        }
    }
}

impl std::fmt::Display for BusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BusType::Slack => "Slack",
            BusType::PV => "PV",
            BusType::PQ => "PQ",
        };
        f.write_str(label)
    }
}

/// Bus classification together with the setpoints it carries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BusKind {
    Slack,
    Pv {
        p_setpoint: Megawatts,
        v_setpoint: PerUnit,
    },
    Pq {
        p_load: Megawatts,
        q_load: Megavars,
    },
}

impl BusKind {
    pub fn bus_type(&self) -> BusType {
        match self {
            BusKind::Slack => BusType::Slack,
            BusKind::Pv { .. } => BusType::PV,
            BusKind::Pq { .. } => BusType::PQ,
        }
    }
}

impl From<BusType> for BusKind {
    /// Classification with empty setpoints; attaching a generator or load fills
    /// them in.
    fn from(bus_type: BusType) -> Self {
        match bus_type {
            BusType::Slack => BusKind::Slack,
            BusType::PV => BusKind::Pv {
                p_setpoint: Megawatts(0.0),
                v_setpoint: PerUnit::ONE,
            },
            BusType::PQ => BusKind::Pq {
                p_load: Megawatts(0.0),
                q_load: Megavars(0.0),
            },
        }
    }
}

// =============================================================================
// Elements
// =============================================================================

#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Base voltage in kilovolts
    pub base_kv: Kilovolts,
    /// Voltage magnitude in per-unit
    pub voltage_pu: PerUnit,
    /// Voltage angle in radians
    pub angle_rad: Radians,
    pub kind: BusKind,
    pub generator: Option<GenId>,
    pub load: Option<LoadId>,
}

impl Bus {
    pub fn bus_type(&self) -> BusType {
        self.kind.bus_type()
    }
}

/// 2×2 complex admittance contribution of one branch, ordered
/// `[from, to]` × `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveAdmittance(pub [[Complex64; 2]; 2]);

impl PrimitiveAdmittance {
    /// Series element with impedance `z`: `[[y, -y], [-y, y]]`.
    pub fn series(z: Complex64) -> FlowResult<Self> {
        let y = Self::series_admittance(z)?;
        Ok(Self([[y, -y], [-y, y]]))
    }

    /// Nominal-π line: series impedance `z` plus total shunt susceptance
    /// `b_total` split evenly between the two ends.
    pub fn pi(z: Complex64, b_total: f64) -> FlowResult<Self> {
        let y = Self::series_admittance(z)?;
        let half = Complex64::new(0.0, b_total / 2.0);
        Ok(Self([[y + half, -y], [-y, y + half]]))
    }

    pub fn from_matrix(matrix: [[Complex64; 2]; 2]) -> Self {
        Self(matrix)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.0[row][col]
    }

    fn series_admittance(z: Complex64) -> FlowResult<Complex64> {
        if z.norm() < 1e-12 || !z.is_finite() {
            return Err(FlowError::Validation(format!(
                "series impedance {} cannot be inverted",
                z
            )));
        }
        Ok(z.inv())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    Transformer,
    Line,
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub kind: BranchKind,
    pub primitive: PrimitiveAdmittance,
}

impl Branch {
    /// Build a branch; its id is assigned by [`Network::add_branch`].
    pub fn new(
        name: impl Into<String>,
        from_bus: BusId,
        to_bus: BusId,
        kind: BranchKind,
        primitive: PrimitiveAdmittance,
    ) -> Self {
        Self {
            id: BranchId(0),
            name: name.into(),
            from_bus,
            to_bus,
            kind,
            primitive,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Generator {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    /// Terminal voltage target (per-unit)
    pub voltage_setpoint: PerUnit,
    /// Scheduled active power (MW)
    pub mw_setpoint: Megawatts,
    /// Subtransient reactance X'' in per-unit on the machine base
    pub subtransient_x: f64,
    /// Machine MVA base; the MW setpoint is used when absent
    pub rating: Option<MegavoltAmperes>,
}

impl Generator {
    /// Build a generator; its id is assigned by [`Network::add_generator`].
    pub fn new(
        name: impl Into<String>,
        bus: BusId,
        voltage_setpoint: PerUnit,
        mw_setpoint: Megawatts,
        subtransient_x: f64,
    ) -> Self {
        Self {
            id: GenId(0),
            name: name.into(),
            bus,
            voltage_setpoint,
            mw_setpoint,
            subtransient_x,
            rating: None,
        }
    }

    pub fn with_rating(mut self, rating: MegavoltAmperes) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn machine_base(&self) -> MegavoltAmperes {
        self.rating
            .unwrap_or(MegavoltAmperes(self.mw_setpoint.value()))
    }

    /// X'' converted from the machine base to the system base.
    pub fn subtransient_x_system(&self, system_base: MegavoltAmperes) -> f64 {
        self.subtransient_x * (system_base / self.machine_base())
    }
}

#[derive(Debug, Clone)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    pub active_power: Megawatts,
    pub reactive_power: Megavars,
}

impl Load {
    /// Build a load; its id is assigned by [`Network::add_load`].
    pub fn new(
        name: impl Into<String>,
        bus: BusId,
        active_power: Megawatts,
        reactive_power: Megavars,
    ) -> Self {
        Self {
            id: LoadId(0),
            name: name.into(),
            bus,
            active_power,
            reactive_power,
        }
    }
}

// =============================================================================
// Network
// =============================================================================

/// The study network: buses as graph nodes, branches as graph edges.
#[derive(Debug, Default)]
pub struct Network {
    graph: Graph<Bus, Branch, Undirected>,
    generators: Vec<Generator>,
    loads: Vec<Load>,
    pub settings: Settings,
    bus_names: HashMap<String, BusId>,
    branch_names: HashSet<String>,
}

impl Network {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            graph: Graph::new_undirected(),
            generators: Vec::new(),
            loads: Vec::new(),
            settings,
            bus_names: HashMap::new(),
            branch_names: HashSet::new(),
        }
    }

    /// Register a bus. The returned id is its matrix position.
    pub fn add_bus(
        &mut self,
        name: impl Into<String>,
        base_kv: Kilovolts,
        kind: impl Into<BusKind>,
    ) -> FlowResult<BusId> {
        let name = name.into();
        if self.bus_names.contains_key(&name) {
            return Err(FlowError::duplicate("bus", name));
        }

        let id = BusId(self.graph.node_count());
        let node = self.graph.add_node(Bus {
            id,
            name: name.clone(),
            base_kv,
            voltage_pu: PerUnit::ONE,
            angle_rad: Radians::ZERO,
            kind: kind.into(),
            generator: None,
            load: None,
        });
        debug_assert_eq!(node.index(), id.value());

        self.bus_names.insert(name, id);
        Ok(id)
    }

    /// Register a branch between two existing buses.
    pub fn add_branch(&mut self, mut branch: Branch) -> FlowResult<BranchId> {
        if self.branch_names.contains(&branch.name) {
            return Err(FlowError::duplicate("branch", branch.name));
        }
        for end in [branch.from_bus, branch.to_bus] {
            if self.bus(end).is_none() {
                return Err(FlowError::InvalidTopology(format!(
                    "branch {} references unknown bus index {}",
                    branch.name,
                    end.value()
                )));
            }
        }

        let id = BranchId(self.graph.edge_count());
        branch.id = id;
        self.branch_names.insert(branch.name.clone());
        let edge: EdgeIndex = self
            .graph
            .add_edge(branch.from_bus.node(), branch.to_bus.node(), branch);
        debug_assert_eq!(edge.index(), id.value());
        Ok(id)
    }

    /// Attach a generator to a Slack or PV bus. On a PV bus the generator's
    /// MW and voltage setpoints become the bus setpoints.
    pub fn add_generator(&mut self, mut generator: Generator) -> FlowResult<GenId> {
        if self.generators.iter().any(|g| g.name == generator.name) {
            return Err(FlowError::duplicate("generator", generator.name));
        }

        let id = GenId(self.generators.len());
        let bus = self.bus_mut_for(generator.bus, &generator.name)?;
        if bus.generator.is_some() {
            return Err(FlowError::Validation(format!(
                "bus {} already has a generator",
                bus.name
            )));
        }
        match bus.kind {
            BusKind::Slack => {}
            BusKind::Pv { .. } => {
                bus.kind = BusKind::Pv {
                    p_setpoint: generator.mw_setpoint,
                    v_setpoint: generator.voltage_setpoint,
                };
            }
            BusKind::Pq { .. } => {
                return Err(FlowError::InvalidBusType(format!(
                    "generator {} cannot attach to PQ bus {}",
                    generator.name, bus.name
                )));
            }
        }
        bus.generator = Some(id);

        generator.id = id;
        self.generators.push(generator);
        Ok(id)
    }

    /// Attach a load to a PQ bus. Its demand becomes the bus setpoint.
    pub fn add_load(&mut self, mut load: Load) -> FlowResult<LoadId> {
        if self.loads.iter().any(|l| l.name == load.name) {
            return Err(FlowError::duplicate("load", load.name));
        }

        let id = LoadId(self.loads.len());
        let bus = self.bus_mut_for(load.bus, &load.name)?;
        if bus.load.is_some() {
            return Err(FlowError::Validation(format!(
                "bus {} already has a load",
                bus.name
            )));
        }
        match bus.kind {
            BusKind::Pq { .. } => {
                bus.kind = BusKind::Pq {
                    p_load: load.active_power,
                    q_load: load.reactive_power,
                };
            }
            other => {
                return Err(FlowError::InvalidBusType(format!(
                    "load {} cannot attach to {} bus {}",
                    load.name,
                    other.bus_type(),
                    bus.name
                )));
            }
        }
        bus.load = Some(id);

        load.id = id;
        self.loads.push(load);
        Ok(id)
    }

    fn bus_mut_for(&mut self, id: BusId, element: &str) -> FlowResult<&mut Bus> {
        self.graph.node_weight_mut(id.node()).ok_or_else(|| {
            FlowError::InvalidTopology(format!(
                "{} references unknown bus index {}",
                element,
                id.value()
            ))
        })
    }

    pub fn bus_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn branch_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.graph.node_weight(id.node())
    }

    pub fn bus_id(&self, name: &str) -> Option<BusId> {
        self.bus_names.get(name).copied()
    }

    /// Look up a bus id by name, failing with `InvalidTopology`.
    /// Buses in index order.
    pub fn buses(&self) -> impl Iterator<Item = &Bus> {
        self.graph.node_weights()
    }

    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.graph.edge_weights()
    }

    /// Generators in registration order.
    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn generator(&self, id: GenId) -> Option<&Generator> {
        self.generators.get(id.value())
    }

    pub fn generator_at(&self, bus: BusId) -> Option<&Generator> {
        self.bus(bus)?.generator.and_then(|g| self.generator(g))
    }

    pub fn load(&self, id: LoadId) -> Option<&Load> {
        self.loads.get(id.value())
    }

    /// The single slack bus.
    pub fn slack_bus(&self) -> FlowResult<BusId> {
        let mut slack = self.buses().filter(|b| b.bus_type() == BusType::Slack);
        match (slack.next(), slack.next()) {
            (Some(bus), None) => Ok(bus.id),
            (None, _) => Err(FlowError::InvalidTopology(
                "network has no slack bus".to_string(),
            )),
            (Some(first), Some(second)) => Err(FlowError::InvalidTopology(format!(
                "network has more than one slack bus ({}, {})",
                first.name, second.name
            ))),
        }
    }

    /// Reset every bus to 1.0 pu at zero angle. Generator voltage setpoints
    /// do not enter the flat start.
    pub fn flat_start(&mut self) {
        for bus in self.graph.node_weights_mut() {
            bus.voltage_pu = PerUnit::ONE;
            bus.angle_rad = Radians::ZERO;
        }
    }

    /// Write a solved state (per-unit magnitudes, radian angles, bus order)
    /// back into the buses.
    pub fn apply_state(&mut self, v_mag: &[f64], v_ang: &[f64]) -> FlowResult<()> {
        let n = self.bus_count();
        if v_mag.len() != n || v_ang.len() != n {
            return Err(FlowError::Validation(format!(
                "state has {} magnitudes and {} angles for {} buses",
                v_mag.len(),
                v_ang.len(),
                n
            )));
        }
        for (i, bus) in self.graph.node_weights_mut().enumerate() {
            bus.voltage_pu = PerUnit(v_mag[i]);
            bus.angle_rad = Radians(v_ang[i]);
        }
        Ok(())
    }

    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats {
            num_buses: self.bus_count(),
            num_branches: self.branch_count(),
            num_gens: self.generators.len(),
            num_loads: self.loads.len(),
            ..NetworkStats::default()
        };
        for bus in self.buses() {
            match bus.kind {
                BusKind::Slack => stats.num_slack += 1,
                BusKind::Pv { .. } => stats.num_pv += 1,
                BusKind::Pq { .. } => stats.num_pq += 1,
            }
        }
        stats.total_load_mw = self.loads.iter().map(|l| l.active_power).sum();
        stats.total_load_mvar = self.loads.iter().map(|l| l.reactive_power).sum();
        stats
    }

    /// Check the network for problems that stop or distort a study.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let stats = self.stats();

        if stats.num_buses == 0 {
            diag.add_error("topology", "Network has no buses");
            return;
        }

        match stats.num_slack {
            0 => diag.add_error("topology", "Network has no slack bus"),
            1 => {}
            _ => {
                for bus in self.buses().filter(|b| b.bus_type() == BusType::Slack) {
                    diag.add_error_with_entity(
                        "topology",
                        "Network has more than one slack bus",
                        &bus.name,
                    );
                }
            }
        }

        for bus in self.buses() {
            if bus.bus_type() == BusType::PV && bus.generator.is_none() {
                diag.add_warning_with_entity(
                    "bus-type",
                    "PV bus has no generator; setpoint defaults apply",
                    &bus.name,
                );
            }
        }

        if stats.num_gens == 0 {
            diag.add_warning(
                "generation",
                "Network has no generators; fault analysis will be singular",
            );
        }

        if stats.num_branches == 0 && stats.num_buses > 1 {
            diag.add_warning("topology", "Network has multiple buses but no branches");
        }
    }

    /// Run [`Network::validate_into`], log warnings, and fail on errors.
    pub fn validate(&self) -> FlowResult<()> {
        let mut diag = Diagnostics::new();
        self.validate_into(&mut diag);
        for issue in diag.warnings() {
            warn!(%issue, "network validation");
        }
        diag.into_result()
    }
}

/// Element counts and demand totals
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_slack: usize,
    pub num_pv: usize,
    pub num_pq: usize,
    pub num_branches: usize,
    pub num_gens: usize,
    pub num_loads: usize,
    pub total_load_mw: Megawatts,
    pub total_load_mvar: Megavars,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses ({} slack, {} PV, {} PQ), {} branches, {} gens, {} loads ({:.0} MW)",
            self.num_buses,
            self.num_slack,
            self.num_pv,
            self.num_pq,
            self.num_branches,
            self.num_gens,
            self.num_loads,
            self.total_load_mw.value()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reactance(x: f64) -> PrimitiveAdmittance {
        PrimitiveAdmittance::series(Complex64::new(0.0, x)).unwrap()
    }

    fn two_bus() -> (Network, BusId, BusId) {
        let mut network = Network::new();
        let b1 = network
            .add_bus("Bus1", Kilovolts(20.0), BusType::Slack)
            .unwrap();
        let b2 = network.add_bus("Bus2", Kilovolts(20.0), BusType::PQ).unwrap();
        network
            .add_branch(Branch::new("L12", b1, b2, BranchKind::Line, reactance(0.1)))
            .unwrap();
        (network, b1, b2)
    }

    #[test]
    fn test_bus_type_parsing() {
        assert_eq!("Slack".parse::<BusType>().unwrap(), BusType::Slack);
        assert_eq!("PV_Bus".parse::<BusType>().unwrap(), BusType::PV);
        assert_eq!("pq".parse::<BusType>().unwrap(), BusType::PQ);
        assert_eq!(" slack_bus ".parse::<BusType>().unwrap(), BusType::Slack);

        let err = "swing".parse::<BusType>().unwrap_err();
        assert!(matches!(err, FlowError::InvalidBusType(ref m) if m.contains("swing")));
    }

    #[test]
    fn test_bus_indices_follow_registration_order() {
        let mut network = Network::new();
        for (i, name) in ["A", "B", "C"].iter().enumerate() {
            let id = network
                .add_bus(*name, Kilovolts(115.0), BusType::PQ)
                .unwrap();
            assert_eq!(id.value(), i);
        }
        assert_eq!(network.bus_id("C"), Some(BusId::new(2)));

        // Indices are per network, not global
        let mut other = Network::new();
        let id = other.add_bus("X", Kilovolts(115.0), BusType::Slack).unwrap();
        assert_eq!(id.value(), 0);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let (mut network, b1, b2) = two_bus();

        let err = network
            .add_bus("Bus1", Kilovolts(20.0), BusType::PQ)
            .unwrap_err();
        assert!(matches!(err, FlowError::DuplicateName { kind: "bus", .. }));

        let err = network
            .add_branch(Branch::new("L12", b1, b2, BranchKind::Line, reactance(0.2)))
            .unwrap_err();
        assert!(matches!(err, FlowError::DuplicateName { kind: "branch", .. }));

        network
            .add_load(Load::new("Load", b2, Megawatts(10.0), Megavars(1.0)))
            .unwrap();
        let err = network
            .add_load(Load::new("Load", b2, Megawatts(10.0), Megavars(1.0)))
            .unwrap_err();
        assert!(matches!(err, FlowError::DuplicateName { kind: "load", .. }));
    }

    #[test]
    fn test_branch_to_unknown_bus_rejected() {
        let (mut network, b1, _) = two_bus();
        let err = network
            .add_branch(Branch::new(
                "Dangling",
                b1,
                BusId::new(9),
                BranchKind::Transformer,
                reactance(0.1),
            ))
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidTopology(_)));
        assert_eq!(network.branch_count(), 1);
    }

    #[test]
    fn test_attachment_rules() {
        let (mut network, b1, b2) = two_bus();
        let pv = network.add_bus("Bus3", Kilovolts(20.0), BusType::PV).unwrap();

        let err = network
            .add_generator(Generator::new("G2", b2, PerUnit(1.0), Megawatts(50.0), 0.12))
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidBusType(_)));

        let err = network
            .add_load(Load::new("L1", b1, Megawatts(50.0), Megavars(5.0)))
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidBusType(_)));

        network
            .add_generator(Generator::new("G3", pv, PerUnit(1.02), Megawatts(200.0), 0.12))
            .unwrap();
        let bus = network.bus(pv).unwrap();
        assert_eq!(
            bus.kind,
            BusKind::Pv {
                p_setpoint: Megawatts(200.0),
                v_setpoint: PerUnit(1.02)
            }
        );
        assert_eq!(network.generator_at(pv).unwrap().name, "G3");

        let err = network
            .add_generator(Generator::new("G4", pv, PerUnit(1.0), Megawatts(10.0), 0.12))
            .unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));

        let err = network
            .add_generator(Generator::new(
                "G5",
                BusId::new(42),
                PerUnit(1.0),
                Megawatts(10.0),
                0.12,
            ))
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidTopology(_)));

        // Rejected attachments leave no trace
        assert_eq!(network.generators().len(), 1);
        assert_eq!(network.generators()[0].name, "G3");
        assert!(network.loads().is_empty());
    }

    #[test]
    fn test_load_sets_pq_setpoints() {
        let (mut network, _, b2) = two_bus();
        let id = network
            .add_load(Load::new("Load2", b2, Megawatts(110.0), Megavars(50.0)))
            .unwrap();
        assert_eq!(
            network.bus(b2).unwrap().kind,
            BusKind::Pq {
                p_load: Megawatts(110.0),
                q_load: Megavars(50.0)
            }
        );
        assert_eq!(network.bus(b2).unwrap().load, Some(id));
        assert_eq!(network.load(id).unwrap().name, "Load2");
        assert_eq!(network.loads().len(), 1);
        assert!(network.load(LoadId::new(5)).is_none());
    }

    #[test]
    fn test_primitive_constructors() {
        let z = Complex64::new(0.0, 0.1);
        let series = PrimitiveAdmittance::series(z).unwrap();
        assert!((series.get(0, 0) - Complex64::new(0.0, -10.0)).norm() < 1e-12);
        assert!((series.get(0, 1) - Complex64::new(0.0, 10.0)).norm() < 1e-12);

        let pi = PrimitiveAdmittance::pi(z, 0.2).unwrap();
        assert!((pi.get(1, 1) - Complex64::new(0.0, -9.9)).norm() < 1e-12);
        assert_eq!(pi.get(1, 0), series.get(1, 0));

        assert!(PrimitiveAdmittance::series(Complex64::new(0.0, 0.0)).is_err());

        // Off-nominal tap a = 1.05 on the from side
        let y = Complex64::new(0.0, -10.0);
        let a = 1.05;
        let tapped = PrimitiveAdmittance::from_matrix([[y / (a * a), -y / a], [-y / a, y]]);
        assert!((tapped.get(0, 0) - y / (a * a)).norm() < 1e-12);
        assert_eq!(tapped.get(0, 1), tapped.get(1, 0));
        assert_eq!(tapped.get(1, 1), y);
    }

    #[test]
    fn test_subtransient_on_system_base() {
        let gen = Generator::new("G1", BusId::new(0), PerUnit(1.0), Megawatts(200.0), 0.12);
        // 0.12 · 100 / 200
        assert!((gen.subtransient_x_system(MegavoltAmperes(100.0)) - 0.06).abs() < 1e-12);

        let rated = gen.with_rating(MegavoltAmperes(100.0));
        assert!((rated.subtransient_x_system(MegavoltAmperes(100.0)) - 0.12).abs() < 1e-12);
    }

    #[test]
    fn test_slack_bus_lookup() {
        let (mut network, b1, _) = two_bus();
        assert_eq!(network.slack_bus().unwrap(), b1);

        network
            .add_bus("Bus3", Kilovolts(20.0), BusType::Slack)
            .unwrap();
        assert!(matches!(
            network.slack_bus(),
            Err(FlowError::InvalidTopology(_))
        ));

        let empty = Network::new();
        assert!(empty.slack_bus().is_err());
    }

    #[test]
    fn test_flat_start_and_apply_state() {
        let (mut network, b1, b2) = two_bus();
        let pv = network.add_bus("Bus3", Kilovolts(20.0), BusType::PV).unwrap();
        network
            .add_generator(Generator::new("G1", b1, PerUnit(1.05), Megawatts(100.0), 0.12))
            .unwrap();
        network
            .add_generator(Generator::new("G3", pv, PerUnit(0.98), Megawatts(50.0), 0.12))
            .unwrap();

        network.apply_state(&[0.9, 0.8, 0.7], &[0.1, -0.2, 0.3]).unwrap();
        assert_eq!(network.bus(b2).unwrap().voltage_pu, PerUnit(0.8));
        assert_eq!(network.bus(pv).unwrap().angle_rad, Radians(0.3));

        network.flat_start();
        assert!(network.buses().all(|b| b.voltage_pu == PerUnit::ONE));
        assert!(network.buses().all(|b| b.angle_rad == Radians::ZERO));

        let err = network.apply_state(&[1.0], &[0.0]).unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
    }

    #[test]
    fn test_validation() {
        let network = Network::new();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.errors().any(|i| i.message.contains("no buses")));

        let (mut network, _, _) = two_bus();
        network.add_bus("Bus3", Kilovolts(20.0), BusType::PV).unwrap();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(!diag.has_errors());
        assert!(diag.warnings().any(|i| i.entity.as_deref() == Some("Bus3")));
        assert!(diag.warnings().any(|i| i.message.contains("no generators")));
        assert!(network.validate().is_ok());

        network.add_bus("Bus4", Kilovolts(20.0), BusType::Slack).unwrap();
        assert!(matches!(
            network.validate(),
            Err(FlowError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_stats_display() {
        let (mut network, _, b2) = two_bus();
        network
            .add_load(Load::new("Load2", b2, Megawatts(50.0), Megavars(20.0)))
            .unwrap();
        let stats = network.stats();
        assert_eq!(stats.num_slack, 1);
        assert_eq!(stats.num_pq, 1);
        assert_eq!(
            stats.to_string(),
            "2 buses (1 slack, 0 PV, 1 PQ), 1 branches, 0 gens, 1 loads (50 MW)"
        );
    }
}
