//! Symmetrical fault analysis through the bus impedance matrix

mod common;

use common::{init_tracing, passive_radial, radial_fault_network, seven_bus};
use faultflow_algo::{AcPowerFlowSolver, ShortCircuitAnalyzer, YBus};
use faultflow_core::{BusId, FlowError};
use num_complex::Complex64;

#[test]
fn generator_bus_fault_matches_hand_calculation() {
    init_tracing();
    let network = radial_fault_network();
    let ybus = YBus::from_network(&network).unwrap();

    // Line admittance 1/(j0.12) before augmentation
    let y_line = Complex64::new(0.0, -1.0 / 0.12);
    assert!((ybus.get(0, 0) - y_line).norm() < 1e-9);

    let analyzer = ShortCircuitAnalyzer::from_ybus(&network, &ybus).unwrap();
    let y_gen = Complex64::new(0.0, 0.12).inv();
    let y11 = y_line + y_gen;
    assert!((analyzer.augmented_ybus().get(0, 0) - y11).norm() < 1e-9);
    assert_eq!(analyzer.augmented_ybus().get(1, 1), ybus.get(1, 1));

    // Closed-form inverse of the 2×2 augmented matrix
    let (y12, y22) = (-y_line, y_line);
    let det = y11 * y22 - y12 * y12;
    let z11 = y22 / det;
    let z21 = -y12 / det;
    let z = analyzer.zbus();
    assert!((z.get(0, 0) - z11).norm() < 1e-6);
    assert!((z.get(1, 0) - z21).norm() < 1e-6);

    let fault = analyzer.fault_at(BusId::new(0)).unwrap();
    assert!((fault.fault_current - Complex64::new(1.0, 0.0) / z11).norm() < 1e-6);
    assert!(fault.voltages[0].norm() < 1e-9);
    let v2 = Complex64::new(1.0, 0.0) - z21 / z11;
    assert!((fault.voltages[1] - v2).norm() < 1e-6);
}

#[test]
fn zbus_is_symmetric_for_seven_bus() {
    let analyzer = ShortCircuitAnalyzer::new(&seven_bus()).unwrap();
    let z = analyzer.zbus();
    assert_eq!(z.n_bus(), 7);
    for i in 0..7 {
        for j in 0..7 {
            assert!((z.get(i, j) - z.get(j, i)).norm() < 1e-9, "Z[{}][{}]", i, j);
        }
    }
}

#[test]
fn sweep_covers_every_bus() {
    let network = seven_bus();
    let analyzer = ShortCircuitAnalyzer::new(&network).unwrap();
    let results = analyzer.sweep().unwrap();
    assert_eq!(results.len(), network.bus_count());

    for (n, result) in results.iter().enumerate() {
        assert_eq!(result.bus, BusId::new(n));
        assert!(result.voltages[n].norm() < 1e-9, "faulted bus {} not at zero", n);
        for (k, v) in result.voltages.iter().enumerate() {
            assert!(v.norm() <= 1.0 + 1e-6, "bus {} voltage {} during fault at {}", k, v, n);
        }
        assert!(result.fault_current_pu() > 0.0);
        assert!(result.fault_current_ka().value().is_finite());
    }

    // Generator terminals see more current than a remote load bus
    let by_name = analyzer.fault_at_named("Bus7").unwrap();
    assert_eq!(by_name.bus, BusId::new(6));
    assert!(by_name.fault_current_pu() > results[3].fault_current_pu());
}

#[test]
fn fault_study_ignores_load_flow_state() {
    let mut network = seven_bus();
    let before = ShortCircuitAnalyzer::new(&network)
        .unwrap()
        .fault_at(BusId::new(3))
        .unwrap();

    let solution = AcPowerFlowSolver::new().solve(&network).unwrap();
    solution.apply_to(&mut network).unwrap();
    let after = ShortCircuitAnalyzer::new(&network)
        .unwrap()
        .fault_at(BusId::new(3))
        .unwrap();

    assert!((before.fault_current - after.fault_current).norm() < 1e-12);
}

#[test]
fn network_without_generation_is_singular() {
    let network = passive_radial();
    assert!(network.generators().is_empty());
    let err = ShortCircuitAnalyzer::new(&network).unwrap_err();
    assert!(matches!(err, FlowError::SingularSystem(_)), "{err}");
}

#[test]
fn zbus_table_renders_every_row() {
    let analyzer = ShortCircuitAnalyzer::new(&radial_fault_network()).unwrap();
    let table = analyzer.zbus().to_string();
    assert_eq!(table.lines().count(), 2);
    assert!(table.contains('j'));
}
