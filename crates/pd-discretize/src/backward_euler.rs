//! Backward-Euler (finite-difference) discretization (§4.3): one algebraic
//! replica per interval boundary, one differential-link row per interval.

use pd_core::Real;
use pd_model::mesh::{MeshLayout, MeshPoint, MeshSpec};
use pd_model::strategy::{DiscretizationStrategy, LinkRow};

#[derive(Debug, Clone, Copy, Default)]
pub struct BackwardEuler;

impl DiscretizationStrategy for BackwardEuler {
    fn place_mesh(&self, mesh_spec: &MeshSpec) -> MeshLayout {
        let n = mesh_spec.n_elements_applied();
        let points = (0..=n)
            .map(|k| MeshPoint {
                tau: k as Real / n as Real,
                element: k.min(n.saturating_sub(1)),
                is_differential_anchor: true,
            })
            .collect();
        MeshLayout {
            points,
            n_elements_requested: mesh_spec.n_elements,
            n_elements_applied: n,
        }
    }

    fn emit_differential_link(
        &self,
        x: &[Real],
        mesh: &MeshLayout,
        lck_index: &dyn Fn(usize) -> usize,
        tf_index: usize,
        rate_at: &dyn Fn(usize) -> Real,
    ) -> Vec<LinkRow> {
        let tf = x[tf_index];
        let n = mesh.total_mesh_points();
        let mut rows = Vec::with_capacity(n.saturating_sub(1));
        for k in 1..n {
            let h = mesh.points[k].tau - mesh.points[k - 1].tau;
            let lck_k = x[lck_index(k)];
            let lck_km1 = x[lck_index(k - 1)];
            rows.push(LinkRow {
                label: "inv3_backward_euler_link",
                value: lck_k - lck_km1 - h * tf * rate_at(k),
            });
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_model::mesh::DiscMethod;

    #[test]
    fn mesh_has_n_plus_one_points_and_is_ordered() {
        let spec = MeshSpec {
            method: DiscMethod::BackwardEuler,
            n_elements: 24,
            n_collocation: 1,
            effective_nfe: false,
        };
        let mesh = BackwardEuler.place_mesh(&spec);
        assert_eq!(mesh.total_mesh_points(), 25);
        assert!(mesh.is_strictly_increasing());
        assert_eq!(mesh.n_elements_applied, 24);
    }
}
