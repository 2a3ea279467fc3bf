//! `environment` metadata block (§4.7, §6): runtime/library/solver versions
//! plus host identification, captured once per run.

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const CODE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SOLVER_VERSION: &str = "pd-solver/0.1.0";
pub const MODEL_BUILDER_VERSION: &str = "pd-model/0.1.0";
pub const RUNTIME_VERSION: &str = "rustc";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub runtime: String,
    pub model_builder: String,
    pub solver: String,
    pub os: String,
    pub host: String,
    pub timestamp: String,
}

impl Environment {
    pub fn capture() -> Self {
        Self {
            runtime: RUNTIME_VERSION.to_string(),
            model_builder: MODEL_BUILDER_VERSION.to_string(),
            solver: SOLVER_VERSION.to_string(),
            os: std::env::consts::OS.to_string(),
            host: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_fills_every_field() {
        let env = Environment::capture();
        assert!(!env.os.is_empty());
        assert!(!env.timestamp.is_empty());
        assert!(!env.runtime.is_empty());
    }
}
