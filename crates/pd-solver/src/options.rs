//! Options handed to the NLP solver core by value on every invocation
//! (§4.6, §5: "Solver options are passed by value at every invocation" —
//! the guard against the reference implementation's solver-handle option
//! leakage bug, §9).

use pd_core::Real;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MuStrategy {
    Adaptive,
    Monotone,
}

impl MuStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MuStrategy::Adaptive => "adaptive",
            MuStrategy::Monotone => "monotone",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverOptions {
    pub max_iter: usize,
    pub tol: Real,
    pub constr_viol_tol: Real,
    pub mu_strategy: MuStrategy,
    pub mu_init: Real,
    /// Kept in plaintext for readability alongside the fingerprint (§4.7).
    pub linear_solver: &'static str,
    pub bound_relax_factor: Real,
    /// Only `Some` when the caller explicitly requested warm-start for
    /// *this specific* solve; a fresh `SolverOptions` is built per call so
    /// this can never leak into a cold-start invocation later in the same
    /// process (§4.6, §5).
    pub warmstart_bound_push: Option<Real>,
    /// Weight of the optional quadratic smoothness penalty on released
    /// controls (§4.2 objective); zero by default per the spec's policy
    /// choice.
    pub smoothness_weight: Real,
}

impl SolverOptions {
    /// §4.6: "max_iter=5000-8000 (higher for joint mode)".
    pub fn default_for_mode(joint_mode: bool) -> Self {
        Self {
            max_iter: if joint_mode { 8000 } else { 5000 },
            tol: 1e-6,
            constr_viol_tol: 1e-6,
            mu_strategy: MuStrategy::Adaptive,
            mu_init: 0.1,
            linear_solver: "dense_lu",
            bound_relax_factor: 1e-8,
            warmstart_bound_push: None,
            smoothness_weight: 0.0,
        }
    }

    pub fn with_warmstart_bound_push(mut self, push: Real) -> Self {
        self.warmstart_bound_push = Some(push);
        self
    }

    /// A relaxed copy used by the staged driver's single automatic retry
    /// (§4.6 policy, §7 StageFailure).
    pub fn relaxed(&self) -> Self {
        Self {
            tol: self.tol * 10.0,
            constr_viol_tol: self.constr_viol_tol * 10.0,
            max_iter: self.max_iter + self.max_iter / 2,
            ..self.clone()
        }
    }

    /// The subset of fields kept in plaintext alongside the SHA-256
    /// fingerprint (§4.7): `{linear_solver, tol, constr_viol_tol,
    /// mu_strategy, max_iter}`.
    pub fn fingerprint_fields(&self) -> OptionFingerprintFields {
        OptionFingerprintFields {
            linear_solver: self.linear_solver,
            tol: self.tol,
            constr_viol_tol: self.constr_viol_tol,
            mu_strategy: self.mu_strategy.as_str(),
            max_iter: self.max_iter,
        }
    }
}

/// §4.7's plaintext subset of `SolverOptions`, carried in `Diagnostics`
/// alongside the opaque `option_fingerprint` hash so a reader can tell at a
/// glance what produced a record without reversing the hash.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptionFingerprintFields {
    pub linear_solver: &'static str,
    pub tol: Real,
    pub constr_viol_tol: Real,
    pub mu_strategy: &'static str,
    pub max_iter: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_fields_mirror_the_options_they_were_built_from() {
        let options = SolverOptions::default_for_mode(true);
        let fields = options.fingerprint_fields();
        assert_eq!(fields.linear_solver, options.linear_solver);
        assert_eq!(fields.tol, options.tol);
        assert_eq!(fields.constr_viol_tol, options.constr_viol_tol);
        assert_eq!(fields.mu_strategy, options.mu_strategy.as_str());
        assert_eq!(fields.max_iter, options.max_iter);
    }
}
