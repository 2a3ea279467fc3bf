//! The unified error taxonomy (§7). Every variant here is a distinct
//! diagnostic tag the grid runner persists rather than panics on — "the
//! grid runner never throws: every failure becomes a persisted record".

use pd_core::PdError;
use pd_discretize::DiscretizeError;
use pd_model::ModelError;
use pd_solver::FailureStage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("invalid scenario: {0}")]
    InvalidScenario(#[from] ModelError),

    #[error("required nonlinear solver backend is unavailable: {0}")]
    SolverUnavailable(String),

    #[error("warm-start reference trajectory is inconsistent: {0}")]
    WarmStartInconsistent(#[from] DiscretizeError),

    #[error("stage {stage:?} returned a non-acceptable status after one relaxed retry")]
    StageFailure { stage: FailureStage },

    #[error("post-check violation: {0}")]
    PostCheckViolation(String),

    #[error("solve exceeded its time budget")]
    Timeout,

    #[error("non-finite value in extracted trajectory at mesh point {mesh_point}: {field}")]
    NumericError { mesh_point: usize, field: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record not found for hash {hash}")]
    RecordNotFound { hash: String },

    #[error(transparent)]
    Core(#[from] PdError),
}

pub type ResultsResult<T> = Result<T, ResultsError>;
