//! `MeshSpec` (spec §3) and the mesh-point layout shared by both
//! discretization strategies.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DiscMethod {
    BackwardEuler,
    CollocationRadau,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshSpec {
    pub method: DiscMethod,
    pub n_elements: usize,
    pub n_collocation: usize,
    pub effective_nfe: bool,
}

impl MeshSpec {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.n_elements == 0 {
            return Err("n_elements must be >= 1");
        }
        if self.method == DiscMethod::CollocationRadau
            && !matches!(self.n_collocation, 2 | 3 | 5)
        {
            return Err("n_collocation must be one of {2, 3, 5}");
        }
        Ok(())
    }

    /// Finite elements actually used for collocation once the "effective
    /// NFE" parity convention (§4.3) is applied: when enabled, `n_elements`
    /// is reinterpreted as the total interior-point budget.
    pub fn n_elements_applied(&self) -> usize {
        match self.method {
            DiscMethod::BackwardEuler => self.n_elements,
            DiscMethod::CollocationRadau => {
                if self.effective_nfe {
                    self.n_elements.div_ceil(self.n_collocation).max(1)
                } else {
                    self.n_elements
                }
            }
        }
    }
}

/// One point on the normalized time horizon tau in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshPoint {
    pub tau: f64,
    pub element: usize,
    /// True for backward-Euler boundaries and for tau=0; used by the
    /// algebraic-replica bookkeeping (§4.3: "Algebraics are replicated at
    /// every collocation point").
    pub is_differential_anchor: bool,
}

/// Strictly-increasing mesh produced by a `DiscretizationStrategy`, plus
/// bookkeeping the diagnostics block reports verbatim (§4.3, §6).
#[derive(Debug, Clone)]
pub struct MeshLayout {
    pub points: Vec<MeshPoint>,
    pub n_elements_requested: usize,
    pub n_elements_applied: usize,
}

impl MeshLayout {
    pub fn total_mesh_points(&self) -> usize {
        self.points.len()
    }

    /// Ordering guarantee (§4.3): tau_0 < tau_1 < ... < tau_M.
    pub fn is_strictly_increasing(&self) -> bool {
        self.points.windows(2).all(|w| w[0].tau < w[1].tau)
    }
}
