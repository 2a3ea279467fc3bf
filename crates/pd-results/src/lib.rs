//! Diagnostics, fingerprinting, the benchmark record schema, and the
//! append-only record store (§4.7, §6).

pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod fingerprint;
pub mod record;
pub mod store;

pub use diagnostics::{extract_trajectory, model_size, post_checks, termination_code, ModelSize, PostChecks, TrajectoryRow};
pub use environment::Environment;
pub use error::{ResultsError, ResultsResult};
pub use fingerprint::{input_hash, option_fingerprint, record_hash, reference_hash};
pub use record::{BenchmarkRecord, RECORD_SCHEMA_VERSION};
pub use store::RecordStore;
