//! Benchmark record schema v2 (§6): the stable, newline-delimited,
//! persisted contract — one record per solved (or failed) case.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use pd_model::ControlMode;
use pd_solver::OptionFingerprintFields;

use crate::diagnostics::{ModelSize, PostChecks, TrajectoryRow};
use crate::environment::Environment;

pub const RECORD_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashBlock {
    pub inputs: String,
    pub record: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridOverride {
    pub path: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverStatus {
    pub status: String,
    pub termination_condition: String,
}

/// The reference/synthetic-baseline solve block, produced by
/// `pd_bench::baseline::synthetic_reference`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineBlock {
    pub success: bool,
    pub wall_time_s: f64,
    pub objective_time_hr: f64,
    pub solver: SolverStatus,
    pub metrics: BTreeMap<String, f64>,
    pub trajectory: Vec<TrajectoryRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscretizationBlock {
    pub method: String,
    pub n_elements_requested: usize,
    pub n_elements_applied: usize,
    pub n_collocation: usize,
    pub effective_nfe: bool,
    pub total_mesh_points: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmstartBlock {
    pub enabled: bool,
    pub source_hash: Option<String>,
    pub variable_match_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub model_size: ModelSize,
    pub termination: i32,
    pub option_fingerprint: String,
    /// The `{linear_solver, tol, constr_viol_tol, mu_strategy, max_iter}`
    /// subset kept in plaintext alongside `option_fingerprint` (§4.7).
    pub option_fingerprint_fields: OptionFingerprintFields,
    pub environment: Environment,
    pub code_version: String,
    pub wall_time_s: f64,
    pub solver_cpu_time_s: f64,
    pub warmstart: WarmstartBlock,
    pub post_checks: PostChecks,
    pub failure_stage: Option<String>,
}

/// The block produced by this workspace's staged NLP solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineBlock {
    pub success: bool,
    pub wall_time_s: f64,
    pub objective_time_hr: f64,
    pub solver: SolverStatus,
    pub metrics: BTreeMap<String, f64>,
    pub discretization: DiscretizationBlock,
    pub warmstart_used: bool,
    pub diagnostics: Diagnostics,
    pub trajectory: Vec<TrajectoryRow>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Tsh,
    Pch,
    Both,
}

impl From<ControlMode> for Task {
    fn from(mode: ControlMode) -> Self {
        match mode {
            ControlMode::Tsh => Task::Tsh,
            ControlMode::Pch => Task::Pch,
            ControlMode::Both => Task::Both,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub version: u32,
    pub hash: HashBlock,
    pub environment: Environment,
    pub task: Task,
    pub scenario: String,
    pub grid: BTreeMap<String, GridOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineBlock>,
    pub failed: bool,
}

impl BenchmarkRecord {
    /// Serializes the record body (everything except `hash.record`, which
    /// the caller computes over this exact string) so `hash.record` never
    /// becomes self-referential.
    pub fn body_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&BenchmarkRecordBody {
            version: self.version,
            hash_inputs: self.hash.inputs.clone(),
            environment: self.environment.clone(),
            task: self.task,
            scenario: self.scenario.clone(),
            grid: self.grid.clone(),
            baseline: self.baseline.clone(),
            engine: self.engine.clone(),
            failed: self.failed,
        })
    }
}

#[derive(Serialize)]
struct BenchmarkRecordBody {
    version: u32,
    hash_inputs: String,
    environment: Environment,
    task: Task,
    scenario: String,
    grid: BTreeMap<String, GridOverride>,
    baseline: Option<BaselineBlock>,
    engine: Option<EngineBlock>,
    failed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&Task::Tsh).unwrap(), "\"tsh\"");
        assert_eq!(serde_json::to_string(&Task::Both).unwrap(), "\"both\"");
    }

    #[test]
    fn absent_baseline_and_engine_blocks_are_omitted_from_the_wire_format() {
        let record = BenchmarkRecord {
            version: RECORD_SCHEMA_VERSION,
            hash: HashBlock { inputs: "a".repeat(16), record: "b".repeat(16) },
            environment: Environment::capture(),
            task: Task::Tsh,
            scenario: "s1".to_string(),
            grid: BTreeMap::new(),
            baseline: None,
            engine: None,
            failed: false,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("\"baseline\""));
        assert!(!json.contains("\"engine\""));
        let back: BenchmarkRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scenario, "s1");
    }
}
