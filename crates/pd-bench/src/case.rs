//! Resolves one `GridCase` into a `ScenarioInputs`, builds and solves (or,
//! for the synthetic-baseline method, generates) the corresponding model,
//! and assembles the resulting `BenchmarkRecord`.

use std::collections::BTreeMap;
use std::time::Instant;

use pd_core::Real;
use pd_discretize::{apply_warmstart, BackwardEuler, CollocationRadau, DiscretizeError, WarmStartPolicy};
use pd_model::{ControlMode, DiscMethod, MeshSpec, ModelError, NlpModel, ScenarioInputs};
use pd_results::record::{
    BaselineBlock, Diagnostics, DiscretizationBlock, EngineBlock, GridOverride, HashBlock,
    SolverStatus, Task, WarmstartBlock,
};
use pd_results::{
    extract_trajectory, input_hash, model_size, option_fingerprint, post_checks, record_hash,
    reference_hash, termination_code, BenchmarkRecord, Environment, ModelSize, PostChecks,
    ResultsError,
};
use pd_solver::{run_staged, FailureStage, SolverOptions, StagedOutcome, TerminationStatus};

use crate::error::{BenchError, BenchResult};
use crate::grid::{GridCase, Method};
use crate::overrides::apply_overrides;
use crate::{baseline, scenarios};

/// §4.7 `PostCheckViolation` tolerances, matching the numeric slack the
/// spec's own invariants allow: P5 accepts `frac_dried >= eta - 1e-3`, P6
/// accepts a ramp rate up to `rate_max * (1 + 1e-3)`.
const DRYNESS_SHORTFALL_TOL: Real = 1e-3;
const RAMP_VIOLATION_TOL: Real = 1e-3;

/// Applies the registry lookup, grid overrides, and ramp-cap overrides
/// (but not validation) — the first half of what `run_case` needs, shared
/// with `case_input_hash` so both see exactly the same resolved scenario.
pub fn resolve_scenario(case: &GridCase) -> BenchResult<ScenarioInputs> {
    let mut scenario = scenarios::lookup(&case.scenario_name)
        .ok_or_else(|| BenchError::UnknownScenario(case.scenario_name.clone()))?;
    apply_overrides(&mut scenario, &case.overrides)?;
    if let Some(r) = case.ramp_tsh_max {
        scenario.tsh.ramp_max = Some(r);
    }
    if let Some(r) = case.ramp_pch_max {
        scenario.pch.ramp_max = Some(r);
    }
    Ok(scenario)
}

/// The mesh spec a case implies. The synthetic-baseline method performs no
/// discretization; it gets a nominal, otherwise-unused spec so its
/// `hash.inputs` still occupies a distinct space from real engine runs
/// (which always require `n_elements >= 1` on a real method).
pub fn case_mesh_spec(case: &GridCase) -> MeshSpec {
    match case.method {
        Method::SequentialBaseline => {
            MeshSpec { method: DiscMethod::BackwardEuler, n_elements: 1, n_collocation: 1, effective_nfe: false }
        }
        Method::FiniteDifferences => MeshSpec {
            method: DiscMethod::BackwardEuler,
            n_elements: case.n_elements,
            n_collocation: case.n_collocation,
            effective_nfe: case.effective_nfe,
        },
        Method::Collocation => MeshSpec {
            method: DiscMethod::CollocationRadau,
            n_elements: case.n_elements,
            n_collocation: case.n_collocation,
            effective_nfe: case.effective_nfe,
        },
    }
}

fn task_label(task: Task) -> &'static str {
    match task {
        Task::Tsh => "tsh",
        Task::Pch => "pch",
        Task::Both => "both",
    }
}

/// `hash.inputs` for a case, computed the same way whether or not the
/// case actually runs — lets the grid runner check the record store for
/// reuse before paying for a solve.
pub fn case_input_hash(case: &GridCase) -> BenchResult<String> {
    let scenario = resolve_scenario(case)?;
    let mesh = case_mesh_spec(case);
    let task = Task::from(scenario.mode);
    Ok(input_hash(&scenario, &mesh, task_label(task)))
}

/// Runs one grid case in-process (no process isolation) and returns its
/// `BenchmarkRecord`.
pub fn run_case(case: &GridCase) -> BenchResult<BenchmarkRecord> {
    let scenario = resolve_scenario(case)?;
    let violations = scenario.validate();
    if !violations.is_empty() {
        return Err(ModelError::InvalidScenario(violations).into());
    }

    let task = Task::from(scenario.mode);
    let grid_overrides = to_grid_overrides(&case.overrides);
    let hash_inputs = case_input_hash(case)?;

    let mut record = if case.method == Method::SequentialBaseline {
        let block = baseline::build_baseline_block(&scenario)?;
        BenchmarkRecord {
            version: pd_results::RECORD_SCHEMA_VERSION,
            hash: HashBlock { inputs: hash_inputs, record: String::new() },
            environment: Environment::capture(),
            task,
            scenario: case.scenario_name.clone(),
            grid: grid_overrides,
            baseline: Some(block),
            engine: None,
            failed: false,
        }
    } else {
        run_engine_case(case, scenario, task, grid_overrides, hash_inputs)?
    };

    record.hash.record = record_hash(&record.body_json()?);
    Ok(record)
}

fn run_engine_case(
    case: &GridCase,
    scenario: ScenarioInputs,
    task: Task,
    grid_overrides: BTreeMap<String, GridOverride>,
    hash_inputs: String,
) -> BenchResult<BenchmarkRecord> {
    let mesh_spec = case_mesh_spec(case);
    let strategy: Box<dyn pd_model::DiscretizationStrategy> = match case.method {
        Method::FiniteDifferences => Box::new(BackwardEuler),
        Method::Collocation => {
            Box::new(CollocationRadau::new(case.n_collocation).map_err(DiscretizeError::from)?)
        }
        Method::SequentialBaseline => unreachable!("handled by run_case"),
    };
    let strategy_ref = strategy.as_ref();

    let joint_mode = scenario.mode == ControlMode::Both;
    let model = NlpModel::build(scenario, mesh_spec, strategy_ref)?;

    let mut options = SolverOptions::default_for_mode(joint_mode);
    let (x0, warmstart_used, variable_match_ratio, warmstart_source_hash) = if case.warmstart {
        let refs = baseline::synthetic_reference(&model.scenario);
        let source_hash = reference_hash(&refs);
        let result = apply_warmstart(&refs, &model, strategy_ref, WarmStartPolicy::default())?;
        options = options.with_warmstart_bound_push(1e-6);
        (result.x, true, Some(result.variable_match_ratio), Some(source_hash))
    } else {
        (model.cold_start(), false, None, None)
    };

    let started = Instant::now();
    let outcome = run_staged(&model, strategy_ref, x0, &options);
    let wall_time_s = started.elapsed().as_secs_f64();

    let n_constraints = model.n_constraints(strategy_ref);
    let size = model_size(&model, n_constraints);
    let discretization = DiscretizationBlock {
        method: case.method.as_str().to_string(),
        n_elements_requested: case.n_elements,
        n_elements_applied: model.layout.mesh.n_elements_applied,
        n_collocation: case.n_collocation,
        effective_nfe: case.effective_nfe,
        total_mesh_points: model.layout.n_mesh_points(),
    };

    if let Some(stage) = outcome.failure_stage {
        tracing::warn!(error = %ResultsError::StageFailure { stage }, "staged solve did not finish all four stages");
    }

    // §7 NumericError: "record flagged and discarded from downstream
    // aggregation" — contained here rather than bubbled out of
    // `run_case`/`run_grid` with `?`, so one case with a non-finite
    // extracted value cannot abort the rest of the grid (§5, §6 "the grid
    // runner never throws").
    let trajectory = match extract_trajectory(&model, &outcome.x) {
        Ok(trajectory) => trajectory,
        Err(err) => {
            tracing::warn!(error = %err, "numeric error extracting trajectory; recording a failed case");
            return Ok(numeric_error_record(
                case,
                task,
                grid_overrides,
                hash_inputs,
                size,
                discretization,
                &options,
                &outcome,
                model.layout.tf_index,
                wall_time_s,
                warmstart_used,
                variable_match_ratio,
                warmstart_source_hash,
                err,
            ));
        }
    };
    let post = post_checks(&model, &outcome.x, &trajectory);
    let objective_time_hr = outcome.x[model.layout.tf_index];

    let post_check_violated =
        post.dryness_shortfall > DRYNESS_SHORTFALL_TOL || post.max_ramp_violation > RAMP_VIOLATION_TOL;
    if post_check_violated && outcome.failure_stage.is_none() {
        let err = ResultsError::PostCheckViolation(format!(
            "dryness_shortfall={:.6}, max_ramp_violation={:.6}",
            post.dryness_shortfall, post.max_ramp_violation
        ));
        tracing::warn!(error = %err, "post-checks failed on an otherwise-converged staged solve");
    }
    let failed = outcome.failure_stage.is_some() || post_check_violated;

    let mut metrics: BTreeMap<String, Real> = BTreeMap::new();
    metrics.insert("max_ramp_violation".to_string(), post.max_ramp_violation);
    metrics.insert("dryness_shortfall".to_string(), post.dryness_shortfall);

    let diagnostics = Diagnostics {
        model_size: size,
        termination: termination_code(outcome.final_status),
        option_fingerprint: option_fingerprint(&options),
        option_fingerprint_fields: options.fingerprint_fields(),
        environment: Environment::capture(),
        code_version: pd_results::environment::CODE_VERSION.to_string(),
        wall_time_s,
        solver_cpu_time_s: outcome.stages.iter().map(|s| s.cpu_time.as_secs_f64()).sum(),
        warmstart: WarmstartBlock {
            enabled: case.warmstart,
            source_hash: warmstart_source_hash,
            variable_match_ratio,
        },
        post_checks: post,
        failure_stage: outcome
            .failure_stage
            .map(|s| failure_stage_label(s).to_string())
            .or(post_check_violated.then(|| "postcheck".to_string())),
    };

    let engine = EngineBlock {
        success: !failed,
        wall_time_s,
        objective_time_hr,
        solver: SolverStatus {
            status: termination_status_label(outcome.final_status).to_string(),
            termination_condition: format!("{:?}", outcome.final_status),
        },
        metrics,
        discretization,
        warmstart_used,
        diagnostics,
        trajectory,
    };

    Ok(BenchmarkRecord {
        version: pd_results::RECORD_SCHEMA_VERSION,
        hash: HashBlock { inputs: hash_inputs, record: String::new() },
        environment: Environment::capture(),
        task,
        scenario: case.scenario_name.clone(),
        grid: grid_overrides,
        baseline: None,
        engine: Some(engine),
        failed,
    })
}

/// Builds the degraded, `failed=true` record for a case whose staged solve
/// ran to completion but whose extracted trajectory contained a
/// non-finite value (§7 NumericError). No trajectory/ramp/dryness figures
/// can be trusted once one field is non-finite, so the trajectory and
/// metrics are left empty rather than populated with values computed from
/// a corrupted state; `failure_stage` carries the offending mesh
/// point/field so the case is still diagnosable from the record alone.
#[allow(clippy::too_many_arguments)]
fn numeric_error_record(
    case: &GridCase,
    task: Task,
    grid_overrides: BTreeMap<String, GridOverride>,
    hash_inputs: String,
    size: ModelSize,
    discretization: DiscretizationBlock,
    options: &SolverOptions,
    outcome: &StagedOutcome,
    tf_index: usize,
    wall_time_s: f64,
    warmstart_used: bool,
    variable_match_ratio: Option<Real>,
    warmstart_source_hash: Option<String>,
    err: ResultsError,
) -> BenchmarkRecord {
    let objective_time_hr = outcome.x[tf_index];
    let objective_time_hr = if objective_time_hr.is_finite() { objective_time_hr } else { 0.0 };

    let diagnostics = Diagnostics {
        model_size: size,
        termination: termination_code(outcome.final_status),
        option_fingerprint: option_fingerprint(options),
        option_fingerprint_fields: options.fingerprint_fields(),
        environment: Environment::capture(),
        code_version: pd_results::environment::CODE_VERSION.to_string(),
        wall_time_s,
        solver_cpu_time_s: outcome.stages.iter().map(|s| s.cpu_time.as_secs_f64()).sum(),
        warmstart: WarmstartBlock {
            enabled: case.warmstart,
            source_hash: warmstart_source_hash,
            variable_match_ratio,
        },
        post_checks: PostChecks { max_ramp_violation: 0.0, dryness_shortfall: 1.0 },
        failure_stage: Some(format!("numeric_error: {err}")),
    };

    let engine = EngineBlock {
        success: false,
        wall_time_s,
        objective_time_hr,
        solver: SolverStatus {
            status: termination_status_label(outcome.final_status).to_string(),
            termination_condition: format!("{:?}", outcome.final_status),
        },
        metrics: BTreeMap::new(),
        discretization,
        warmstart_used,
        diagnostics,
        trajectory: Vec::new(),
    };

    BenchmarkRecord {
        version: pd_results::RECORD_SCHEMA_VERSION,
        hash: HashBlock { inputs: hash_inputs, record: String::new() },
        environment: Environment::capture(),
        task,
        scenario: case.scenario_name.clone(),
        grid: grid_overrides,
        baseline: None,
        engine: Some(engine),
        failed: true,
    }
}

fn termination_status_label(status: TerminationStatus) -> &'static str {
    match status {
        TerminationStatus::Optimal => "optimal",
        TerminationStatus::IterationLimit => "iteration_limit",
        TerminationStatus::Infeasible => "infeasible",
        TerminationStatus::Unbounded => "unbounded",
        TerminationStatus::Other => "other",
    }
}

fn failure_stage_label(stage: FailureStage) -> &'static str {
    match stage {
        FailureStage::StageF => "stage_F",
        FailureStage::StageT => "stage_T",
        FailureStage::StageC => "stage_C",
        FailureStage::StageO => "stage_O",
    }
}

/// Builds the minimal, `failed=true` partial record written for a case
/// whose isolated worker process exceeded its wall-time budget and was
/// killed before it could report anything back (§7 Timeout: "partial
/// record written"). The parent has no channel into a killed child beyond
/// its exit status, so there is no engine/baseline block to salvage —
/// unlike `numeric_error_record`, which runs in-process and still has the
/// model and staged outcome to hand.
pub fn timeout_record(case: &GridCase, task: Task, hash_inputs: &str) -> BenchmarkRecord {
    let mut record = BenchmarkRecord {
        version: pd_results::RECORD_SCHEMA_VERSION,
        hash: HashBlock { inputs: hash_inputs.to_string(), record: String::new() },
        environment: Environment::capture(),
        task,
        scenario: case.scenario_name.clone(),
        grid: to_grid_overrides(&case.overrides),
        baseline: None,
        engine: None,
        failed: true,
    };
    record.hash.record = record_hash(&record.body_json().unwrap_or_default());
    record
}

fn to_grid_overrides(overrides: &BTreeMap<String, f64>) -> BTreeMap<String, GridOverride> {
    overrides
        .iter()
        .map(|(k, v)| (k.clone(), GridOverride { path: k.clone(), value: *v }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn tiny_case(method: Method, warmstart: bool) -> GridCase {
        GridCase {
            scenario_name: "s1_tsh_baseline".to_string(),
            overrides: BTreeMap::new(),
            method,
            n_elements: 3,
            n_collocation: 1,
            effective_nfe: false,
            warmstart,
            ramp_tsh_max: None,
            ramp_pch_max: None,
        }
    }

    #[test]
    fn sequential_baseline_case_populates_only_the_baseline_block() {
        let record = run_case(&tiny_case(Method::SequentialBaseline, false)).unwrap();
        assert!(record.baseline.is_some());
        assert!(record.engine.is_none());
        assert!(!record.failed);
    }

    #[test]
    fn finite_differences_case_on_a_tiny_mesh_produces_an_engine_block() {
        let record = run_case(&tiny_case(Method::FiniteDifferences, false)).unwrap();
        assert!(record.engine.is_some());
        assert!(record.baseline.is_none());
        let engine = record.engine.unwrap();
        assert_eq!(engine.discretization.method, "finite_differences");
        assert!(engine.trajectory.len() >= 4);
    }

    #[test]
    fn unknown_scenario_is_reported_before_any_model_is_built() {
        let mut case = tiny_case(Method::FiniteDifferences, false);
        case.scenario_name = "does-not-exist".to_string();
        assert!(matches!(run_case(&case), Err(BenchError::UnknownScenario(_))));
    }

    #[test]
    fn input_hash_is_stable_for_the_same_case() {
        let case = tiny_case(Method::FiniteDifferences, false);
        assert_eq!(case_input_hash(&case).unwrap(), case_input_hash(&case).unwrap());
    }
}
