//! Shared networks for the integration tests.

#![allow(dead_code)]

use faultflow_core::{
    Branch, BranchKind, BusId, BusType, Generator, Kilovolts, Load, Megavars, MegavoltAmperes,
    Megawatts, Network, PerUnit, PrimitiveAdmittance, Settings,
};
use num_complex::Complex64;

/// Series impedance per mile of the 230 kV lines (pu on 100 MVA)
const LINE_Z_PER_MILE: Complex64 = Complex64::new(0.000364, 0.00147);
/// Total charging susceptance per mile (pu)
const LINE_B_PER_MILE: f64 = 0.00286;

/// Route tracing output through the test harness; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn transformer(z_mag: f64, x_over_r: f64) -> PrimitiveAdmittance {
    let r = z_mag / (1.0 + x_over_r * x_over_r).sqrt();
    PrimitiveAdmittance::series(Complex64::new(r, r * x_over_r)).unwrap()
}

fn line(miles: f64) -> PrimitiveAdmittance {
    PrimitiveAdmittance::pi(LINE_Z_PER_MILE * miles, LINE_B_PER_MILE * miles).unwrap()
}

/// Seven-bus benchmark: slack generator at `Bus1` (20 kV), PV generator at
/// `Bus7` (18 kV) scheduling `pv_mw`, five 230 kV PQ buses with three loads.
pub fn seven_bus_with_pv(pv_mw: f64) -> Network {
    let mut network = Network::with_settings(Settings {
        base_power: MegavoltAmperes(100.0),
        ..Settings::default()
    });

    let kv = [20.0, 230.0, 230.0, 230.0, 230.0, 230.0, 18.0];
    let ids: Vec<BusId> = kv
        .iter()
        .enumerate()
        .map(|(i, &base_kv)| {
            let bus_type = match i {
                0 => BusType::Slack,
                6 => BusType::PV,
                _ => BusType::PQ,
            };
            network
                .add_bus(format!("Bus{}", i + 1), Kilovolts(base_kv), bus_type)
                .unwrap()
        })
        .collect();

    let mut connect = |name: &str, from: usize, to: usize, kind, primitive| {
        network
            .add_branch(Branch::new(name, ids[from], ids[to], kind, primitive))
            .unwrap();
    };
    connect("T1", 0, 1, BranchKind::Transformer, transformer(0.068, 10.0));
    connect("T2", 5, 6, BranchKind::Transformer, transformer(0.0525, 12.0));
    connect("L24", 1, 3, BranchKind::Line, line(10.0));
    connect("L23", 1, 2, BranchKind::Line, line(25.0));
    connect("L35", 2, 4, BranchKind::Line, line(20.0));
    connect("L46", 3, 5, BranchKind::Line, line(20.0));
    connect("L56", 4, 5, BranchKind::Line, line(10.0));
    connect("L45", 3, 4, BranchKind::Line, line(35.0));

    network
        .add_generator(
            Generator::new("G1", ids[0], PerUnit(1.0), Megawatts(0.0), 0.12)
                .with_rating(MegavoltAmperes(100.0)),
        )
        .unwrap();
    network
        .add_generator(
            Generator::new("G2", ids[6], PerUnit(1.0), Megawatts(pv_mw), 0.12)
                .with_rating(MegavoltAmperes(200.0)),
        )
        .unwrap();

    for (name, bus, p, q) in [
        ("Load3", 2, 110.0, 50.0),
        ("Load4", 3, 100.0, 70.0),
        ("Load5", 4, 100.0, 65.0),
    ] {
        network
            .add_load(Load::new(name, ids[bus], Megawatts(p), Megavars(q)))
            .unwrap();
    }

    network
}

pub fn seven_bus() -> Network {
    seven_bus_with_pv(200.0)
}

/// Two buses joined by a j0.12 line with no generator anywhere.
pub fn passive_radial() -> Network {
    let mut network = Network::new();
    let b1 = network
        .add_bus("Bus1", Kilovolts(20.0), BusType::Slack)
        .unwrap();
    let b2 = network.add_bus("Bus2", Kilovolts(20.0), BusType::PQ).unwrap();
    let primitive = PrimitiveAdmittance::series(Complex64::new(0.0, 0.12)).unwrap();
    network
        .add_branch(Branch::new("L12", b1, b2, BranchKind::Line, primitive))
        .unwrap();
    network
}

/// Generator bus with X'' = 0.12 feeding a second bus through a j0.12 line.
pub fn radial_fault_network() -> Network {
    let mut network = Network::new();
    let b1 = network
        .add_bus("Bus1", Kilovolts(20.0), BusType::Slack)
        .unwrap();
    let b2 = network.add_bus("Bus2", Kilovolts(20.0), BusType::PQ).unwrap();
    let primitive = PrimitiveAdmittance::series(Complex64::new(0.0, 0.12)).unwrap();
    network
        .add_branch(Branch::new("L12", b1, b2, BranchKind::Line, primitive))
        .unwrap();
    network
        .add_generator(
            Generator::new("G1", b1, PerUnit(1.0), Megawatts(100.0), 0.12)
                .with_rating(MegavoltAmperes(100.0)),
        )
        .unwrap();
    network
}
