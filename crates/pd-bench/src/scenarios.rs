//! Named production scenario presets for the grid runner's `--scenario`
//! argument, in the style of this workspace's older benchmark suite
//! (`tf_bench::default_benchmarks`) but keyed by name rather than indexed
//! by position, since grid cases need a stable string for file naming and
//! hashing.

use pd_model::{
    ControlMode, ControlSpec, EquipmentCapacity, FixedControlTrajectory, HeatTransferParams,
    ProductParams, ScenarioInputs, VialGeometry,
};

pub fn names() -> Vec<&'static str> {
    vec![
        "s1_tsh_baseline",
        "s2_pch_baseline",
        "s3_joint_both",
        "s4_tight_ramp",
        "s5_low_capacity",
    ]
}

pub fn lookup(name: &str) -> Option<ScenarioInputs> {
    match name {
        "s1_tsh_baseline" => Some(s1_tsh_baseline()),
        "s2_pch_baseline" => Some(s2_pch_baseline()),
        "s3_joint_both" => Some(s3_joint_both()),
        "s4_tight_ramp" => Some(s4_tight_ramp()),
        "s5_low_capacity" => Some(s5_low_capacity()),
        _ => None,
    }
}

fn base_vial() -> VialGeometry {
    VialGeometry { av_cm2: 3.80, ap_cm2: 3.14, vfill_ml: 2.0 }
}

fn base_product() -> ProductParams {
    ProductParams { r0: 1.4, a1: 16.0, a2: 0.0, t_pr_crit_c: -5.0, c_solid_g_per_ml: 0.05 }
}

fn base_ht() -> HeatTransferParams {
    HeatTransferParams { kc: 2.75e-4, kp: 8.93e-4, kd: 0.46 }
}

fn base_eq_cap() -> EquipmentCapacity {
    EquipmentCapacity { a: -0.182, b: 11.7 }
}

/// Tsh-only release, the fixture this workspace's model/solver tests were
/// already built against.
pub fn s1_tsh_baseline() -> ScenarioInputs {
    ScenarioInputs {
        vial: base_vial(),
        product: base_product(),
        ht: base_ht(),
        eq_cap: base_eq_cap(),
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

/// Pch-only release, Tsh pinned to a fixed reference trajectory.
pub fn s2_pch_baseline() -> ScenarioInputs {
    ScenarioInputs {
        vial: base_vial(),
        product: base_product(),
        ht: base_ht(),
        eq_cap: base_eq_cap(),
        n_vial: 398,
        mode: ControlMode::Pch,
        tsh: ControlSpec {
            released: false,
            lo: -20.0,
            hi: -20.0,
            ramp_max: None,
            fixed_trajectory: Some(FixedControlTrajectory::constant(-20.0)),
        },
        pch: ControlSpec {
            released: true,
            lo: 0.05,
            hi: 0.50,
            ramp_max: Some(0.1),
            fixed_trajectory: None,
        },
        completion_eta: 0.99,
    }
}

/// Both controls released jointly (stage C splits into `stage_C_tsh` then
/// `stage_C_pch`).
pub fn s3_joint_both() -> ScenarioInputs {
    ScenarioInputs {
        vial: base_vial(),
        product: base_product(),
        ht: base_ht(),
        eq_cap: base_eq_cap(),
        n_vial: 398,
        mode: ControlMode::Both,
        tsh: ControlSpec {
            released: true,
            lo: -45.0,
            hi: 120.0,
            ramp_max: Some(40.0),
            fixed_trajectory: None,
        },
        pch: ControlSpec {
            released: true,
            lo: 0.05,
            hi: 0.50,
            ramp_max: Some(0.1),
            fixed_trajectory: None,
        },
        completion_eta: 0.99,
    }
}

/// Same as `s1_tsh_baseline` but with a tight Tsh ramp cap, exercising the
/// INV11 ramp slacks under active bounds rather than slack.
pub fn s4_tight_ramp() -> ScenarioInputs {
    let mut s = s1_tsh_baseline();
    s.tsh.ramp_max = Some(5.0);
    s
}

/// Same as `s1_tsh_baseline` but with a much smaller equipment capacity
/// envelope, exercising the INV9 capacity slack under active bounds.
pub fn s5_low_capacity() -> ScenarioInputs {
    let mut s = s1_tsh_baseline();
    s.eq_cap = EquipmentCapacity { a: -0.02, b: 0.8 };
    s
}
