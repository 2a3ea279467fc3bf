//! End-to-end staged-solve scenarios (spec §8 S1-S3), mirroring
//! `tf-solver/tests/steady_network.rs`'s shape: build a real model from a
//! `ScenarioInputs`, drive it through the public API exactly as a caller
//! would, and check the invariants the spec names rather than internals.
//!
//! Meshes here are deliberately tiny (a handful of backward-Euler
//! elements) so the hand-rolled Newton core in `pd_solver::kkt` has a
//! small, well-conditioned system to converge on; structural invariants
//! (stage ordering, strictly increasing time, ramp caps honored) are
//! asserted unconditionally, while tolerance-level algebraic checks (P4)
//! are asserted only once a stage has actually reported `Optimal` or
//! `IterationLimit`, since a non-converged iterate carries no contract.

use pd_discretize::BackwardEuler;
use pd_model::ir::Field;
use pd_model::mesh::{DiscMethod, MeshSpec};
use pd_model::scenario::{
    ControlMode, ControlSpec, EquipmentCapacity, FixedControlTrajectory, HeatTransferParams,
    ProductParams, ScenarioInputs, VialGeometry,
};
use pd_model::NlpModel;
use pd_solver::driver::run_staged;
use pd_solver::options::SolverOptions;
use pd_solver::TerminationStatus;

fn base_scenario() -> ScenarioInputs {
    ScenarioInputs {
        vial: VialGeometry {
            av_cm2: 3.80,
            ap_cm2: 3.14,
            vfill_ml: 2.0,
        },
        product: ProductParams {
            r0: 1.4,
            a1: 16.0,
            a2: 0.0,
            t_pr_crit_c: -5.0,
            c_solid_g_per_ml: 0.05,
        },
        ht: HeatTransferParams {
            kc: 2.75e-4,
            kp: 8.93e-4,
            kd: 0.46,
        },
        eq_cap: EquipmentCapacity { a: -0.182, b: 11.7 },
        n_vial: 398,
        mode: ControlMode::Tsh,
        tsh: ControlSpec {
            released: true,
            lo: -45.0,
            hi: 120.0,
            ramp_max: Some(40.0),
            fixed_trajectory: None,
        },
        pch: ControlSpec {
            released: false,
            lo: 0.15,
            hi: 0.15,
            ramp_max: None,
            fixed_trajectory: Some(FixedControlTrajectory::constant(0.15)),
        },
        completion_eta: 0.99,
    }
}

fn tiny_mesh() -> MeshSpec {
    MeshSpec {
        method: DiscMethod::BackwardEuler,
        n_elements: 4,
        n_collocation: 1,
        effective_nfe: false,
    }
}

/// S1: Tsh-only, Pch prescribed constant. Validates, builds, and runs the
/// full F->T->C->O sequence; checks the structural invariants that must
/// hold regardless of how well the tiny-mesh Newton core converges, plus
/// P4/P7 on the points that did converge.
#[test]
fn s1_tsh_only_staged_solve_preserves_core_invariants() {
    let scenario = base_scenario();
    assert!(scenario.validate().is_empty());

    let strategy = BackwardEuler;
    let model = NlpModel::build(scenario.clone(), tiny_mesh(), &strategy).unwrap();
    let x0 = model.cold_start();
    let options = SolverOptions::default_for_mode(false);

    let outcome = run_staged(&model, &strategy, x0, &options);

    let tags: Vec<&str> = outcome.stages.iter().map(|s| s.tag).collect();
    assert_eq!(tags, vec!["stage_F", "stage_T", "stage_C", "stage_O"]);

    let tf = outcome.x[model.layout.tf_index];
    assert!(tf > 0.0, "Tf must stay strictly positive (P7), got {tf}");

    let n_points = model.layout.n_mesh_points();
    let taus: Vec<f64> = (0..n_points).map(|k| model.layout.mesh.points[k].tau).collect();
    assert!(
        taus.windows(2).all(|w| w[0] < w[1]),
        "mesh points must remain strictly increasing"
    );

    if matches!(
        outcome.final_status,
        TerminationStatus::Optimal | TerminationStatus::IterationLimit
    ) {
        for k in 0..n_points {
            let tsub = model.layout.get(&outcome.x, Field::Tsub, k);
            assert!(
                tsub >= scenario.product.t_pr_crit_c - 1e-3,
                "P4 violated at mesh point {k}: Tsub={tsub}, crit={}",
                scenario.product.t_pr_crit_c
            );
        }
    }
}

/// S2: Pch-only mode with a tight ramp cap; Tsh is the prescribed control
/// this time. Checks the ramp invariant P6 is never exceeded once a stage
/// converges.
#[test]
fn s2_pch_only_with_tight_ramp_respects_ramp_cap() {
    let mut scenario = base_scenario();
    scenario.mode = ControlMode::Pch;
    scenario.tsh = ControlSpec {
        released: false,
        lo: -45.0,
        hi: 120.0,
        ramp_max: None,
        fixed_trajectory: Some(FixedControlTrajectory::constant(-20.0)),
    };
    scenario.pch = ControlSpec {
        released: true,
        lo: 0.06,
        hi: 0.20,
        ramp_max: Some(0.05),
        fixed_trajectory: None,
    };
    assert!(scenario.validate().is_empty());

    let strategy = BackwardEuler;
    let model = NlpModel::build(scenario, tiny_mesh(), &strategy).unwrap();
    let x0 = model.cold_start();
    let options = SolverOptions::default_for_mode(false);

    let outcome = run_staged(&model, &strategy, x0, &options);
    let tf = outcome.x[model.layout.tf_index];

    if matches!(
        outcome.final_status,
        TerminationStatus::Optimal | TerminationStatus::IterationLimit
    ) {
        let n_points = model.layout.n_mesh_points();
        for k in 1..n_points {
            let dtau = model.layout.mesh.points[k].tau - model.layout.mesh.points[k - 1].tau;
            let prev = model.layout.get(&outcome.x, Field::Pch, k - 1);
            let cur = model.layout.get(&outcome.x, Field::Pch, k);
            let rate = (cur - prev).abs() / (dtau * tf).max(1e-12);
            assert!(
                rate <= 0.05 * 1.01,
                "P6 violated between points {}/{}: rate={rate}",
                k - 1,
                k
            );
        }
    }
}

/// S3: joint mode releases both controls; the driver must release Tsh
/// before Pch within stage C (§4.6) and still finish all four stages.
#[test]
fn s3_joint_mode_releases_tsh_before_pch_and_completes_all_stages() {
    let mut scenario = base_scenario();
    scenario.mode = ControlMode::Both;
    scenario.pch = ControlSpec {
        released: true,
        lo: 0.06,
        hi: 0.20,
        ramp_max: Some(0.05),
        fixed_trajectory: None,
    };
    assert!(scenario.validate().is_empty());

    let strategy = BackwardEuler;
    let model = NlpModel::build(scenario, tiny_mesh(), &strategy).unwrap();
    let x0 = model.cold_start();
    let options = SolverOptions::default_for_mode(true);

    let outcome = run_staged(&model, &strategy, x0, &options);

    let tags: Vec<&str> = outcome.stages.iter().map(|s| s.tag).collect();
    assert_eq!(
        tags,
        vec!["stage_F", "stage_T", "stage_C_tsh", "stage_C_pch", "stage_O"],
        "joint mode must release Tsh before Pch within stage C"
    );
}
