//! Foundational types shared by every layer of the primary-drying
//! optimization engine: physical constants, numeric tolerances, compact IDs,
//! and the base error type. No domain logic lives here.

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

pub use error::PdError;
pub use ids::{ElementId, Id, MeshPointId, VarId};
pub use numeric::{nearly_equal, Real, Tolerances, INVARIANT_ABS_TOL};
