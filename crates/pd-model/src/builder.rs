//! DAE model builder (§4.2): turns a validated `ScenarioInputs` + `MeshSpec`
//! into the flat NLP this workspace's solver iterates on.

use crate::bounds::{compute_bounds, structural_fixings, Bound};
use crate::error::ModelError;
use crate::ir::{Field, VariableLayout};
use crate::mesh::MeshSpec;
use crate::residual::{assemble, build_slacks};
use crate::scenario::ScenarioInputs;
use crate::strategy::DiscretizationStrategy;
use pd_core::units::constants::RHO_ICE_EFFECTIVE;
use pd_core::Real;
use pd_physics::lpr0;

pub struct NlpModel {
    pub scenario: ScenarioInputs,
    pub layout: VariableLayout,
    pub bounds: Vec<Bound>,
    pub structural_fixed: Vec<(usize, Real)>,
}

impl NlpModel {
    /// Builds the model. Per §4.2, `ScenarioInputs::validate()` must have
    /// already been called by the caller (the staged driver refuses to
    /// build otherwise); this function itself only raises `InvalidMesh`.
    pub fn build(
        scenario: ScenarioInputs,
        mesh_spec: MeshSpec,
        strategy: &dyn DiscretizationStrategy,
    ) -> Result<Self, ModelError> {
        mesh_spec.validate().map_err(ModelError::InvalidMesh)?;

        let mesh = strategy.place_mesh(&mesh_spec);
        if !mesh.is_strictly_increasing() {
            return Err(ModelError::InvalidMesh(
                "discretization strategy produced a non-increasing mesh",
            ));
        }
        let slacks = build_slacks(&scenario, mesh.total_mesh_points());
        let layout = VariableLayout::new(mesh, slacks);
        let bounds = compute_bounds(&scenario, &layout);
        let structural_fixed = structural_fixings(&layout);

        Ok(Self {
            scenario,
            layout,
            bounds,
            structural_fixed,
        })
    }

    pub fn n_variables(&self) -> usize {
        self.layout.len
    }

    /// Number of equality-constraint rows this model emits (model_size,
    /// §4.7). Measured directly from a residual evaluation since the
    /// differential-link row count is a property of the strategy, not of
    /// this builder.
    pub fn n_constraints(&self, strategy: &dyn DiscretizationStrategy) -> usize {
        self.residual(&self.cold_start(), strategy).len()
    }

    /// Evaluate the full equality-residual vector: algebraic rows +
    /// differential-link rows contributed by `strategy`.
    pub fn residual(&self, x: &[Real], strategy: &dyn DiscretizationStrategy) -> Vec<Real> {
        let algebraic = assemble(x, &self.scenario, &self.layout);
        let mut out: Vec<Real> = algebraic.iter().map(|r| r.value).collect();

        let lpr0_cm = lpr0(
            self.scenario.vial.vfill_ml,
            self.scenario.vial.ap_cm2,
            self.scenario.product.c_solid_g_per_ml,
        )
        .expect("validated scenario");
        let ap = self.scenario.vial.ap_cm2;

        let rate_at = |k: usize| -> Real {
            let dmdt = self.layout.get(x, Field::Dmdt, k);
            dmdt * 1000.0 / (ap * RHO_ICE_EFFECTIVE)
        };
        let lck_index = |k: usize| self.layout.index(Field::Lck, k);

        let link_rows = strategy.emit_differential_link(
            x,
            &self.layout.mesh,
            &lck_index,
            self.layout.tf_index,
            &rate_at,
        );
        out.extend(link_rows.into_iter().map(|r| r.value));
        let _ = lpr0_cm; // used by `assemble` for INV10; kept here for symmetry/documentation
        out
    }

    /// A physically plausible cold-start initial guess (§4.6 feeds this
    /// when no warm-start trajectory is supplied).
    pub fn cold_start(&self) -> Vec<Real> {
        let n_points = self.layout.n_mesh_points();
        let mut x = vec![0.0; self.layout.len];
        let lpr0_cm = lpr0(
            self.scenario.vial.vfill_ml,
            self.scenario.vial.ap_cm2,
            self.scenario.product.c_solid_g_per_ml,
        )
        .expect("validated scenario");

        let tsh0 = if self.scenario.tsh.released {
            0.5 * (self.scenario.tsh.lo + self.scenario.tsh.hi)
        } else {
            self.scenario
                .tsh
                .fixed_trajectory
                .as_ref()
                .map(|t| t.sample(0.0))
                .unwrap_or(-20.0)
        };
        let pch0 = if self.scenario.pch.released {
            0.5 * (self.scenario.pch.lo + self.scenario.pch.hi)
        } else {
            self.scenario
                .pch
                .fixed_trajectory
                .as_ref()
                .map(|t| t.sample(0.0))
                .unwrap_or(0.15)
        };

        for k in 0..n_points {
            let tau = self.layout.mesh.points[k].tau;
            let lck = tau * self.scenario.completion_eta * lpr0_cm;
            let tsh = if self.scenario.tsh.released {
                tsh0
            } else {
                self.scenario
                    .tsh
                    .fixed_trajectory
                    .as_ref()
                    .map(|t| t.sample(tau))
                    .unwrap_or(tsh0)
            };
            let pch = if self.scenario.pch.released {
                pch0
            } else {
                self.scenario
                    .pch
                    .fixed_trajectory
                    .as_ref()
                    .map(|t| t.sample(tau))
                    .unwrap_or(pch0)
            };
            let tsub = self.scenario.product.t_pr_crit_c + 1.0;
            let (log_psub, psub) = pd_physics::psub_sat_log(tsub).unwrap_or((0.0, 1e-3));
            let rp_val = pd_physics::rp(
                lck,
                self.scenario.product.r0,
                self.scenario.product.a1,
                self.scenario.product.a2,
            )
            .unwrap_or(1.0);
            let kv_val = pd_physics::kv(
                pch,
                self.scenario.ht.kc,
                self.scenario.ht.kp,
                self.scenario.ht.kd,
            )
            .unwrap_or(1e-3);
            let dmdt = ((self.scenario.vial.ap_cm2 / rp_val) * (psub - pch) * 1e-3).max(1e-6);
            let tbot = tsub + 1.0;

            x[self.layout.index(Field::Lck, k)] = lck;
            x[self.layout.index(Field::Tsub, k)] = tsub;
            x[self.layout.index(Field::Tbot, k)] = tbot;
            x[self.layout.index(Field::Psub, k)] = psub;
            x[self.layout.index(Field::LogPsub, k)] = log_psub;
            x[self.layout.index(Field::Dmdt, k)] = dmdt;
            x[self.layout.index(Field::Kv, k)] = kv_val;
            x[self.layout.index(Field::Rp, k)] = rp_val;
            x[self.layout.index(Field::Tsh, k)] = tsh;
            x[self.layout.index(Field::Pch, k)] = pch;
        }
        x[self.layout.tf_index] = 10.0;
        for i in 0..self.layout.n_slacks() {
            x[self.layout.slack_index(i)] = 1.0;
        }
        x
    }
}
