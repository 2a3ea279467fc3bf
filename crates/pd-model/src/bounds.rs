//! Box bounds per variable (INV8, INV12) and the structural fixings every
//! scenario carries regardless of solver stage (the initial condition
//! `Lck(0)=0` and non-released controls pinned to their reference
//! trajectory sample).

use crate::ir::{Field, VariableLayout, FIELDS};
use crate::scenario::ScenarioInputs;
use pd_core::Real;

#[derive(Debug, Clone, Copy)]
pub struct Bound {
    pub lo: Real,
    pub hi: Real,
}

pub fn compute_bounds(scenario: &ScenarioInputs, layout: &VariableLayout) -> Vec<Bound> {
    let mut bounds = vec![Bound { lo: Real::NEG_INFINITY, hi: Real::INFINITY }; layout.len];
    let n_points = layout.n_mesh_points();

    for field in FIELDS {
        for k in 0..n_points {
            let idx = layout.index(field, k);
            bounds[idx] = field_bound(field, scenario);
        }
    }
    bounds[layout.tf_index] = Bound { lo: 1e-6, hi: 1e4 };
    for i in 0..layout.n_slacks() {
        bounds[layout.slack_index(i)] = Bound { lo: 0.0, hi: 1e12 };
    }
    bounds
}

fn field_bound(field: Field, scenario: &ScenarioInputs) -> Bound {
    match field {
        Field::Lck => Bound { lo: 0.0, hi: 1e4 },
        Field::Tsub => Bound {
            lo: scenario.product.t_pr_crit_c,
            hi: 50.0,
        },
        Field::Tbot => Bound { lo: -80.0, hi: 150.0 },
        Field::Psub => Bound { lo: 1e-9, hi: 10.0 },
        Field::LogPsub => Bound { lo: -60.0, hi: 10.0 },
        Field::Dmdt => Bound { lo: 0.0, hi: 1e6 },
        Field::Kv => Bound { lo: 1e-9, hi: 1.0 },
        Field::Rp => Bound { lo: 1e-6, hi: 1e6 },
        Field::Tsh => {
            if scenario.tsh.released {
                Bound { lo: scenario.tsh.lo, hi: scenario.tsh.hi }
            } else {
                Bound { lo: -50.0, hi: 150.0 }
            }
        }
        Field::Pch => {
            if scenario.pch.released {
                Bound { lo: scenario.pch.lo, hi: scenario.pch.hi }
            } else {
                Bound { lo: 0.005, hi: 1.5 }
            }
        }
    }
}

/// Variables that are structurally fixed independent of the staged driver:
/// `Lck(tau=0) = 0` (§3, consistent initial condition).
pub fn structural_fixings(layout: &VariableLayout) -> Vec<(usize, Real)> {
    vec![(layout.index(Field::Lck, 0), 0.0)]
}
