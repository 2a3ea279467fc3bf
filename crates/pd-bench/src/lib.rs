//! The benchmark grid runner: scenario presets, grid expansion, the
//! synthetic reference-trajectory generator, and process-isolated case
//! execution against the append-only record store.

pub mod baseline;
pub mod case;
pub mod error;
pub mod grid;
pub mod overrides;
pub mod process;
pub mod scenarios;

pub use error::{BenchError, BenchResult};
pub use grid::{expand, GridCase, GridConfig, Method, VarySpec};
pub use process::{run_isolated, run_worker, INTERNAL_RUN_CASE_FLAG};

use std::time::Duration;

use pd_results::record::Task;
use pd_results::{BenchmarkRecord, RecordStore};

/// Runs every case `config` expands to, skipping any already present in
/// `store` unless `config.force` is set, and appending every fresh
/// result as it completes.
pub fn run_grid(
    config: &GridConfig,
    store: &RecordStore,
    budget: Duration,
    isolate: bool,
) -> BenchResult<Vec<BenchmarkRecord>> {
    let cases = grid::expand(config)?;
    let mut out = Vec::with_capacity(cases.len());

    for grid_case in &cases {
        let scenario = case::resolve_scenario(grid_case)?;
        let task = Task::from(scenario.mode);
        let task_str = match task {
            Task::Tsh => "tsh",
            Task::Pch => "pch",
            Task::Both => "both",
        };
        let hash_inputs = case::case_input_hash(grid_case)?;

        if !config.force && store.has_case(&grid_case.scenario_name, task_str, &hash_inputs)? {
            tracing::info!(
                scenario = %grid_case.scenario_name,
                method = grid_case.method.as_str(),
                "skipping case already present in the record store"
            );
            continue;
        }

        let outcome = if isolate { process::run_isolated(grid_case, budget) } else { case::run_case(grid_case) };

        // The grid runner never throws: every failure becomes a persisted
        // record (§7). `case::run_case` already turns a NumericError into a
        // `failed: true` record before it gets here, so the only error that
        // can still reach this point is a `Timeout` from a killed isolated
        // worker (or a genuine config/IO error, which does abort the grid).
        let record = match outcome {
            Ok(record) => record,
            Err(BenchError::Timeout { budget }) => {
                tracing::warn!(
                    scenario = %grid_case.scenario_name,
                    method = grid_case.method.as_str(),
                    budget_s = budget.as_secs_f64(),
                    "case exceeded its wall-time budget; recording a failed case and continuing the grid"
                );
                case::timeout_record(grid_case, task, &hash_inputs)
            }
            Err(other) => return Err(other),
        };
        store.append(&grid_case.scenario_name, task_str, &record)?;
        out.push(record);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("pd-bench-test-{name}-{}", std::process::id()))
    }

    fn small_config(force: bool) -> GridConfig {
        GridConfig {
            scenario: "s1_tsh_baseline".to_string(),
            vary: vec![],
            methods: vec![Method::FiniteDifferences],
            n_elements: 3,
            n_collocation: 1,
            effective_nfe: false,
            warmstart: false,
            ramp_tsh_max: None,
            ramp_pch_max: None,
            force,
        }
    }

    #[test]
    fn rerunning_without_force_skips_already_recorded_cases() {
        let dir = temp_store_dir("rerun");
        let store = RecordStore::new(dir.clone()).unwrap();

        let first = run_grid(&small_config(false), &store, Duration::from_secs(30), false).unwrap();
        assert_eq!(first.len(), 1);

        let second = run_grid(&small_config(false), &store, Duration::from_secs(30), false).unwrap();
        assert!(second.is_empty(), "identical case should be skipped on reuse");

        let forced = run_grid(&small_config(true), &store, Duration::from_secs(30), false).unwrap();
        assert_eq!(forced.len(), 1, "force=true must re-run even an existing case");

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn varying_a_bound_produces_a_distinct_case_per_value() {
        let dir = temp_store_dir("vary");
        let store = RecordStore::new(dir.clone()).unwrap();
        let mut config = small_config(false);
        config.vary = vec![grid::VarySpec { path: "tsh.hi".to_string(), values: vec![90.0, 110.0] }];

        let records = run_grid(&config, &store, Duration::from_secs(30), false).unwrap();
        assert_eq!(records.len(), 2);
        let hashes: std::collections::HashSet<_> = records.iter().map(|r| r.hash.inputs.clone()).collect();
        assert_eq!(hashes.len(), 2, "distinct overrides must fingerprint distinctly");

        std::fs::remove_dir_all(dir).ok();
    }
}
