//! Process isolation for grid-case execution: a case can be run in a fresh
//! child process of the currently running executable, re-invoked with a
//! single-case selector, so a hung or crashing solve cannot take the rest
//! of the grid down with it. The wall-time budget is enforced by polling
//! and killing the child rather than a CPU-time rlimit, since not every
//! platform this workspace targets exposes one reliably.

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use pd_results::{BenchmarkRecord, ResultsError};

use crate::error::{BenchError, BenchResult};
use crate::grid::GridCase;

/// The flag a caller binary must recognize (see `apps/pd-cli`) for
/// `run_isolated` to be able to re-invoke itself as a single-case worker:
/// `<exe> --internal-run-case <case-file> <result-file>`.
pub const INTERNAL_RUN_CASE_FLAG: &str = "--internal-run-case";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

static CASE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Runs `case` in a child process of `std::env::current_exe()`, killing it
/// if it outlives `budget`.
pub fn run_isolated(case: &GridCase, budget: Duration) -> BenchResult<BenchmarkRecord> {
    let exe = std::env::current_exe()?;
    let n = CASE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    let case_path = std::env::temp_dir().join(format!("pd-bench-case-{pid}-{n}.json"));
    let result_path = std::env::temp_dir().join(format!("pd-bench-result-{pid}-{n}.json"));

    fs::write(&case_path, serde_json::to_string(case)?)?;

    let mut child = match Command::new(&exe)
        .arg(INTERNAL_RUN_CASE_FLAG)
        .arg(&case_path)
        .arg(&result_path)
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let err = ResultsError::SolverUnavailable(format!("worker executable {exe:?} not found: {e}"));
            tracing::warn!(error = %err, "cannot spawn isolated worker process");
            return Err(err.into());
        }
        Err(e) => return Err(e.into()),
    };

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if started.elapsed() > budget {
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let _ = fs::remove_file(&case_path);

    match status {
        None => {
            let _ = fs::remove_file(&result_path);
            tracing::warn!(error = %ResultsError::Timeout, budget = ?budget, "isolated worker exceeded its wall-time budget");
            Err(BenchError::Timeout { budget })
        }
        Some(status) if status.success() => {
            let body = fs::read_to_string(&result_path).map_err(|e| BenchError::ChildProcessFailed {
                detail: format!("worker exited successfully but left no readable result file: {e}"),
            })?;
            let _ = fs::remove_file(&result_path);
            Ok(serde_json::from_str(&body)?)
        }
        Some(status) => {
            let _ = fs::remove_file(&result_path);
            Err(BenchError::ChildProcessFailed { detail: format!("worker exited with {status}") })
        }
    }
}

/// The worker side: reads the case from `case_path`, runs it in-process,
/// and writes the resulting record to `result_path`. A non-zero exit from
/// the caller of this function communicates failure back to the parent,
/// which has no other channel into the child besides its exit status.
pub fn run_worker(case_path: &Path, result_path: &Path) -> BenchResult<()> {
    let body = fs::read_to_string(case_path)?;
    let case: GridCase = serde_json::from_str(&body)?;
    let record = crate::case::run_case(&case)?;
    let mut file = fs::File::create(result_path)?;
    file.write_all(serde_json::to_string(&record)?.as_bytes())?;
    Ok(())
}
