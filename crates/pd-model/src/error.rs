use pd_core::PdError;
use thiserror::Error;

/// One offending field from `ScenarioInputs::validate` or mesh validation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub reason: &'static str,
}

impl FieldViolation {
    pub fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    /// Every offending field, collected eagerly before any variable is
    /// created (§4.2, §7).
    #[error("invalid scenario: {} offending field(s): {}", .0.len(), join(.0))]
    InvalidScenario(Vec<FieldViolation>),

    #[error("mesh error: {0}")]
    InvalidMesh(&'static str),

    #[error(transparent)]
    Core(#[from] PdError),
}

fn join(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
