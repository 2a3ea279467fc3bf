//! Backward-Euler and orthogonal-collocation discretization strategies
//! behind `pd_model::DiscretizationStrategy`, plus the warm-start adapter
//! that maps an external reference trajectory onto either mesh (§4.3,
//! §4.4).

pub mod backward_euler;
pub mod collocation;
pub mod error;
pub mod warmstart;

pub use backward_euler::BackwardEuler;
pub use collocation::{radau_roots, CollocationBasis, CollocationRadau};
pub use error::{DiscretizeError, ReferenceResidual};
pub use warmstart::{apply as apply_warmstart, ReferenceRecord, WarmStartPolicy, WarmStartResult};
