use std::time::Duration;

use pd_core::PdError;
use pd_discretize::DiscretizeError;
use pd_model::ModelError;
use pd_results::ResultsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("unknown scenario preset: {0}")]
    UnknownScenario(String),

    #[error("unknown grid override path: {0}")]
    UnknownOverridePath(String),

    #[error("unknown discretization method: {0}")]
    UnknownMethod(String),

    #[error("invalid --vary specification: {0}")]
    InvalidVarySpec(String),

    #[error("grid case exceeded its wall-time budget of {budget:?}")]
    Timeout { budget: Duration },

    #[error("isolated worker process produced no usable result: {detail}")]
    ChildProcessFailed { detail: String },

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("results error: {0}")]
    Results(#[from] ResultsError),

    #[error("discretization error: {0}")]
    Discretize(#[from] DiscretizeError),

    #[error(transparent)]
    Core(#[from] PdError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BenchResult<T> = Result<T, BenchError>;
