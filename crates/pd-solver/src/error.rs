use pd_core::PdError;
use pd_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("problem setup error: {what}")]
    ProblemSetup { what: String },

    #[error("KKT system is severely ill-conditioned; SVD pseudo-inverse failed")]
    IllConditioned,

    #[error("non-finite value encountered during solve: {what}")]
    Numeric { what: String },

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    Core(#[from] PdError),
}

pub type SolverResult<T> = Result<T, SolverError>;
