use pd_core::PdError;
use thiserror::Error;

/// One residual check performed against a raw (pre-adapter) reference
/// trajectory record (§7 WarmStartInconsistent).
#[derive(Debug, Clone)]
pub struct ReferenceResidual {
    pub label: &'static str,
    pub record_index: usize,
    pub value: f64,
}

#[derive(Debug, Error)]
pub enum DiscretizeError {
    #[error("unsupported collocation degree {0}; must be one of 2, 3, 5")]
    UnsupportedDegree(usize),

    #[error(
        "warm-start reference trajectory is inconsistent: {} residual(s) exceed tolerance",
        .0.len()
    )]
    WarmStartInconsistent(Vec<ReferenceResidual>),

    #[error("warm-start reference pressure column is out of range even after mTorr->Torr conversion: {value} Torr at record {record_index}")]
    PressureUnitMismatch { record_index: usize, value: f64 },

    #[error("warm-start reference trajectory is empty")]
    EmptyReference,

    #[error("warm-start reference trajectory is not sorted by time")]
    UnsortedReference,

    #[error(transparent)]
    Core(#[from] PdError),
}

impl From<crate::collocation::CollocationError> for DiscretizeError {
    fn from(e: crate::collocation::CollocationError) -> Self {
        match e {
            crate::collocation::CollocationError::UnsupportedDegree(d) => {
                DiscretizeError::UnsupportedDegree(d)
            }
        }
    }
}
