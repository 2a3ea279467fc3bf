//! The discretization capability trait (§9 design note: "Model two
//! variants (BE, collocation) behind a common capability set
//! {place_mesh, emit_differential_link, emit_algebraic_replica,
//! total_mesh_points}. Adding a third method should not touch the builder
//! or driver."). Implementations live in `pd-discretize`; this crate only
//! depends on the trait so the dependency graph stays acyclic.

use crate::mesh::{MeshLayout, MeshSpec};
use pd_core::Real;

/// One differential-link (or collocation) row: a residual value plus a
/// label so diagnostics can attribute it.
pub struct LinkRow {
    pub label: &'static str,
    pub value: Real,
}

/// A discretization method's capability set. `rate_fn` returns the
/// *physical* `dLck/dt` term (before multiplying by `Tf`, which the
/// strategy applies internally) at a given mesh point, given the full
/// state vector.
pub trait DiscretizationStrategy {
    /// Builds the strictly-increasing mesh for this `MeshSpec`.
    fn place_mesh(&self, mesh_spec: &MeshSpec) -> MeshLayout;

    /// Emits the differential-link / collocation-and-continuity rows
    /// (INV3) for the dried-cake length, given the solved state `x`, the
    /// flat index of `Lck` at each mesh point, the flat index of `Tf`, and
    /// a callback computing the physical growth rate at a mesh point.
    fn emit_differential_link(
        &self,
        x: &[Real],
        mesh: &MeshLayout,
        lck_index: &dyn Fn(usize) -> usize,
        tf_index: usize,
        rate_at: &dyn Fn(usize) -> Real,
    ) -> Vec<LinkRow>;

    fn total_mesh_points(&self, mesh_spec: &MeshSpec) -> usize {
        self.place_mesh(mesh_spec).total_mesh_points()
    }
}
