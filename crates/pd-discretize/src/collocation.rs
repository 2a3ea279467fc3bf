//! Radau collocation roots and the element-local differentiation matrix
//! (§4.3: "Orthogonal collocation on finite elements ... interior roots
//! {tau_{e,j}} (Radau, fixed to n_collocation points)"). The equation
//! pattern (collocation rows relate a node's value to a weighted sum of
//! the element's function evaluations) follows the same layout as the
//! orthogonal-collocation boundary-value solver this workspace's
//! period-doubling continuation code uses, generalized from a fixed
//! multi-shooting BVP to a single per-element growth law.

use nalgebra::DMatrix;
use pd_core::Real;
use pd_model::mesh::{MeshLayout, MeshPoint, MeshSpec};
use pd_model::strategy::{DiscretizationStrategy, LinkRow};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollocationError {
    #[error("unsupported collocation degree {0}; must be one of 2, 3, 5")]
    UnsupportedDegree(usize),
}

/// Standard Radau IIA roots on (0, 1], as tabulated for `ncp` in {2, 3, 5}
/// (the last root is always 1.0 - a defining property of Radau IIA that
/// this rewrite leans on: an element's final collocation point coincides
/// exactly with its right boundary, so inter-element continuity is simply
/// variable sharing rather than an extra equation).
pub fn radau_roots(ncp: usize) -> Result<Vec<f64>, CollocationError> {
    match ncp {
        2 => Ok(vec![0.333_333_333_333_333_3, 1.0]),
        3 => Ok(vec![0.155_051_025_721_682_2, 0.644_948_974_278_318_3, 1.0]),
        5 => Ok(vec![
            0.057_104_196_114_517_35,
            0.276_843_013_638_123_63,
            0.583_590_432_368_916_8,
            0.860_240_135_656_219_4,
            1.0,
        ]),
        other => Err(CollocationError::UnsupportedDegree(other)),
    }
}

/// Element-local nodes (0, then the `ncp` roots) and the `ncp x (ncp+1)`
/// differentiation matrix `D[j][i] = ell_i'(tau_j)` for collocation rows
/// `j in 1..=ncp` against basis node `i in 0..=ncp`, computed from the
/// barycentric differentiation-matrix formula (Berrut & Trefethen 2004):
/// `D[j][i] = (w_i/w_j) / (x_j - x_i)` for `i != j`, `D[j][j] = -sum_{i!=j} D[j][i]`.
pub struct CollocationBasis {
    pub ncp: usize,
    pub nodes: Vec<f64>,
    pub diff_matrix: DMatrix<f64>,
}

impl CollocationBasis {
    pub fn new(ncp: usize) -> Result<Self, CollocationError> {
        let roots = radau_roots(ncp)?;
        let mut nodes = Vec::with_capacity(ncp + 1);
        nodes.push(0.0);
        nodes.extend(roots);

        let n = nodes.len();
        let weights: Vec<f64> = (0..n)
            .map(|i| {
                let mut w = 1.0;
                for (m, &xm) in nodes.iter().enumerate() {
                    if m != i {
                        w *= nodes[i] - xm;
                    }
                }
                1.0 / w
            })
            .collect();

        let mut full = DMatrix::<f64>::zeros(n, n);
        for j in 0..n {
            let mut row_sum = 0.0;
            for i in 0..n {
                if i != j {
                    let val = (weights[i] / weights[j]) / (nodes[j] - nodes[i]);
                    full[(j, i)] = val;
                    row_sum += val;
                }
            }
            full[(j, j)] = -row_sum;
        }

        // Keep only the rows corresponding to the `ncp` collocation points
        // (node indices 1..=ncp); node 0 is the element's left anchor, not
        // itself a collocation equation.
        let diff_matrix = full.rows(1, ncp).into_owned();

        Ok(Self {
            ncp,
            nodes,
            diff_matrix,
        })
    }
}

/// Orthogonal collocation on finite elements, Radau IIA roots (§4.3).
/// Holds a pre-built `CollocationBasis` so the differentiation matrix is
/// computed once per `n_collocation`, not once per `place_mesh` call.
pub struct CollocationRadau {
    pub ncp: usize,
    basis: CollocationBasis,
}

impl CollocationRadau {
    pub fn new(ncp: usize) -> Result<Self, CollocationError> {
        Ok(Self {
            ncp,
            basis: CollocationBasis::new(ncp)?,
        })
    }
}

impl DiscretizationStrategy for CollocationRadau {
    fn place_mesh(&self, mesh_spec: &MeshSpec) -> MeshLayout {
        let n_elements = mesh_spec.n_elements_applied();
        let ncp = self.ncp;
        let roots = &self.basis.nodes[1..]; // skip the element-local anchor (0.0)
        let h = 1.0 / n_elements as Real;

        let mut points = Vec::with_capacity(n_elements * ncp + 1);
        points.push(MeshPoint {
            tau: 0.0,
            element: 0,
            is_differential_anchor: true,
        });
        for e in 0..n_elements {
            let tau0 = e as Real * h;
            for (j, &root) in roots.iter().enumerate() {
                points.push(MeshPoint {
                    tau: tau0 + root * h,
                    element: e,
                    // Radau's last root coincides with the element's right
                    // boundary, so it doubles as the next element's anchor
                    // (§4.3 continuity: "Lck_{e+1,0} = Lck_{e,end}" is then
                    // automatic variable sharing, not a separate equation).
                    is_differential_anchor: j + 1 == ncp,
                });
            }
        }

        MeshLayout {
            points,
            n_elements_requested: mesh_spec.n_elements,
            n_elements_applied: n_elements,
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
        let ncp = self.ncp;
        let n_elements = mesh.n_elements_applied;
        let diff = &self.basis.diff_matrix;
        let mut rows = Vec::with_capacity(n_elements * ncp);

        for e in 0..n_elements {
            let anchor_global = e * ncp;
            let h = mesh.points[anchor_global + ncp].tau - mesh.points[anchor_global].tau;
            let local: Vec<Real> = (0..=ncp)
                .map(|i| x[lck_index(anchor_global + i)])
                .collect();
            for j in 0..ncp {
                let mut deriv = 0.0;
                for (i, &lck_i) in local.iter().enumerate() {
                    deriv += diff[(j, i)] * lck_i;
                }
                // `diff` differentiates w.r.t. the element-local coordinate
                // in [0, 1]; physical d(Lck)/dtau = deriv / h.
                let global = anchor_global + 1 + j;
                rows.push(LinkRow {
                    label: "inv3_collocation_link",
                    value: deriv / h - tf * rate_at(global),
                });
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differentiation_matrix_is_exact_for_linear_functions() {
        for ncp in [2, 3, 5] {
            let basis = CollocationBasis::new(ncp).unwrap();
            // f(x) = x has derivative 1 everywhere; D * f_values should be
            // all-ones at every collocation row.
            let f_values: Vec<f64> = basis.nodes.clone();
            for j in 0..ncp {
                let mut deriv = 0.0;
                for i in 0..basis.nodes.len() {
                    deriv += basis.diff_matrix[(j, i)] * f_values[i];
                }
                assert!((deriv - 1.0).abs() < 1e-9, "ncp={ncp} row={j} deriv={deriv}");
            }
        }
    }

    #[test]
    fn last_root_is_the_element_right_boundary() {
        for ncp in [2, 3, 5] {
            let roots = radau_roots(ncp).unwrap();
            assert!((roots[ncp - 1] - 1.0).abs() < 1e-15);
        }
    }

    #[test]
    fn mesh_has_one_plus_n_times_ncp_points_and_is_ordered() {
        use pd_model::mesh::DiscMethod;
        let strategy = CollocationRadau::new(3).unwrap();
        let spec = MeshSpec {
            method: DiscMethod::CollocationRadau,
            n_elements: 8,
            n_collocation: 3,
            effective_nfe: false,
        };
        let mesh = strategy.place_mesh(&spec);
        assert_eq!(mesh.total_mesh_points(), 8 * 3 + 1);
        assert!(mesh.is_strictly_increasing());
    }

    #[test]
    fn differential_link_is_zero_for_a_consistent_linear_ramp() {
        // Lck(tau) = tau * k, so d(Lck)/dtau = k everywhere; with Tf=1 and
        // rate_at returning k, every collocation row should vanish.
        use pd_model::mesh::DiscMethod;
        let ncp = 3;
        let strategy = CollocationRadau::new(ncp).unwrap();
        let spec = MeshSpec {
            method: DiscMethod::CollocationRadau,
            n_elements: 4,
            n_collocation: ncp,
            effective_nfe: false,
        };
        let mesh = strategy.place_mesh(&spec);
        let k = 2.5;
        let lck: Vec<f64> = mesh.points.iter().map(|p| p.tau * k).collect();

        let tf_index = lck.len();
        let mut x = lck.clone();
        x.push(1.0); // Tf = 1

        let rows = strategy.emit_differential_link(
            &x,
            &mesh,
            &|idx| idx,
            tf_index,
            &|_idx| k,
        );
        for row in rows {
            assert!(row.value.abs() < 1e-9, "residual {}", row.value);
        }
    }
}
