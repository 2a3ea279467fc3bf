//! Diagnostics & result extraction (§4.7): trajectory, model size,
//! termination code, and constraint post-checks.

use serde::{Deserialize, Serialize};

use pd_core::Real;
use pd_model::ir::Field;
use pd_model::NlpModel;
use pd_solver::TerminationStatus;

use crate::error::{ResultsError, ResultsResult};

/// One row of the 7-column external trajectory contract (§6): `(time[hr],
/// Tsub[°C], Tbot[°C], Tsh[°C], Pch[mTorr], flux[kg·hr⁻¹·m⁻²],
/// frac_dried[0..1])`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrajectoryRow {
    pub t_hr: Real,
    pub tsub_c: Real,
    pub tbot_c: Real,
    pub tsh_c: Real,
    pub pch_mtorr: Real,
    pub flux_kg_hr_m2: Real,
    pub frac_dried: Real,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelSize {
    pub n_variables: usize,
    pub n_constraints: usize,
    pub n_objectives: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PostChecks {
    pub max_ramp_violation: Real,
    pub dryness_shortfall: Real,
}

/// `termination` (§4.7): a small integer code, 0 optimal ... -1 other.
pub fn termination_code(status: TerminationStatus) -> i32 {
    status.code()
}

/// Extracts the 7-column trajectory, reporting values at every mesh point
/// (including intra-element collocation points, which are genuine solved
/// states, not just element anchors).
pub fn extract_trajectory(model: &NlpModel, x: &[Real]) -> ResultsResult<Vec<TrajectoryRow>> {
    let tf = x[model.layout.tf_index];
    let n_points = model.layout.n_mesh_points();
    let ap_m2 = model.scenario.vial.ap_cm2 * 1e-4;

    let mut rows = Vec::with_capacity(n_points);
    for k in 0..n_points {
        let tau = model.layout.mesh.points[k].tau;
        let tsub = model.layout.get(x, Field::Tsub, k);
        let tbot = model.layout.get(x, Field::Tbot, k);
        let tsh = model.layout.get(x, Field::Tsh, k);
        let pch = model.layout.get(x, Field::Pch, k);
        let dmdt = model.layout.get(x, Field::Dmdt, k);
        let lck = model.layout.get(x, Field::Lck, k);

        let row = TrajectoryRow {
            t_hr: tau * tf,
            tsub_c: tsub,
            tbot_c: tbot,
            tsh_c: tsh,
            pch_mtorr: pch * 1000.0,
            flux_kg_hr_m2: dmdt / ap_m2,
            frac_dried: (lck / lpr0_cm(model)).clamp(0.0, 1.0),
        };
        for (label, v) in [
            ("t_hr", row.t_hr),
            ("tsub_c", row.tsub_c),
            ("tbot_c", row.tbot_c),
            ("tsh_c", row.tsh_c),
            ("pch_mtorr", row.pch_mtorr),
            ("flux_kg_hr_m2", row.flux_kg_hr_m2),
            ("frac_dried", row.frac_dried),
        ] {
            if !v.is_finite() {
                return Err(ResultsError::NumericError { mesh_point: k, field: label });
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

fn lpr0_cm(model: &NlpModel) -> Real {
    pd_physics::lpr0(
        model.scenario.vial.vfill_ml,
        model.scenario.vial.ap_cm2,
        model.scenario.product.c_solid_g_per_ml,
    )
    .unwrap_or(1.0)
}

pub fn model_size(model: &NlpModel, n_constraints: usize) -> ModelSize {
    ModelSize {
        n_variables: model.n_variables(),
        n_constraints,
        n_objectives: 1,
    }
}

/// Constraint post-checks (§4.7): max ramp violation across every released
/// control, and dryness shortfall `max(0, eta - frac_dried(end))`.
pub fn post_checks(model: &NlpModel, x: &[Real], trajectory: &[TrajectoryRow]) -> PostChecks {
    let tf = x[model.layout.tf_index].max(1e-12);
    let mut max_ramp_violation: Real = 0.0;

    for (field, spec) in [(Field::Tsh, &model.scenario.tsh), (Field::Pch, &model.scenario.pch)] {
        if !spec.released {
            continue;
        }
        let Some(rate_max) = spec.ramp_max else { continue };
        for k in 1..model.layout.n_mesh_points() {
            let dtau = model.layout.mesh.points[k].tau - model.layout.mesh.points[k - 1].tau;
            let u_k = model.layout.get(x, field, k);
            let u_prev = model.layout.get(x, field, k - 1);
            let actual_rate = (u_k - u_prev).abs() / (dtau * tf);
            let violation = (actual_rate - rate_max).max(0.0);
            max_ramp_violation = max_ramp_violation.max(violation);
        }
    }

    let dryness_shortfall = (model.scenario.completion_eta
        - trajectory.last().map(|r| r.frac_dried).unwrap_or(0.0))
    .max(0.0);

    PostChecks {
        max_ramp_violation,
        dryness_shortfall,
    }
}
