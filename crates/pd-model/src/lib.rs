//! `ScenarioInputs`, `MeshSpec`, the DAE model builder, the variable/
//! constraint IR, and the ramp-rate & bound layer (spec §3, §4.2, §4.5).

pub mod bounds;
pub mod builder;
pub mod error;
pub mod ir;
pub mod mesh;
pub mod residual;
pub mod scenario;
pub mod strategy;

pub use builder::NlpModel;
pub use error::{FieldViolation, ModelError};
pub use mesh::{DiscMethod, MeshLayout, MeshPoint, MeshSpec};
pub use scenario::{
    ControlMode, ControlSpec, EquipmentCapacity, FixedControlTrajectory, HeatTransferParams,
    ProductParams, ScenarioInputs, VialGeometry,
};
pub use strategy::DiscretizationStrategy;
