//! Command-line entry point for the benchmark grid runner: wires the grid
//! configuration surface to argv and maps the error taxonomy to process
//! exit codes, in the style of this workspace's other CLI binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use pd_bench::grid::{GridConfig, Method, VarySpec};
use pd_bench::{scenarios, run_worker, BenchError};
use pd_model::ModelError;
use pd_results::{RecordStore, ResultsError};

#[derive(Parser)]
#[command(name = "pd-cli", about = "Primary-drying optimization benchmark grid runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark grid, appending fresh records to the record store.
    Run(RunArgs),
    /// List the named scenario presets available to `--scenario`.
    ListScenarios,
    /// Runs one grid case in-process and writes its record to a file.
    /// Re-invoked by the grid runner's isolated worker path; not a stable
    /// user-facing interface.
    #[command(hide = true, name = "internal-run-case")]
    InternalRunCase { case_path: PathBuf, result_path: PathBuf },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Name of a registered scenario preset (see `list-scenarios`).
    #[arg(long)]
    scenario: String,

    /// A dotted override path plus a comma-separated value list, e.g.
    /// `tsh.hi=90,100,110`. May be repeated; every repetition's values are
    /// crossed into the grid.
    #[arg(long = "vary", value_name = "PATH=V1,V2,...")]
    vary: Vec<String>,

    /// One of `sequential_baseline`, `finite_differences`, `collocation`.
    /// May be repeated. Defaults to `finite_differences` if omitted.
    #[arg(long = "method", value_name = "METHOD")]
    methods: Vec<String>,

    #[arg(long, default_value_t = 24)]
    n_elements: usize,

    #[arg(long, default_value_t = 3)]
    n_collocation: usize,

    #[arg(long, default_value_t = true)]
    effective_nfe: bool,

    #[arg(long)]
    warmstart: bool,

    #[arg(long)]
    ramp_tsh_max: Option<f64>,

    #[arg(long)]
    ramp_pch_max: Option<f64>,

    /// Re-run cases already present in the record store.
    #[arg(long)]
    force: bool,

    #[arg(long, default_value = "benchmarks/records")]
    out_dir: PathBuf,

    /// Run each case in its own child process instead of in-process.
    #[arg(long)]
    isolate: bool,

    /// Wall-time budget per case, in seconds, enforced only when
    /// `--isolate` is set.
    #[arg(long, default_value_t = 600)]
    budget_secs: u64,
}

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::InternalRunCase { case_path, result_path } => match run_worker(&case_path, &result_path) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("pd-cli: worker case failed: {e}");
                exit_code(&e)
            }
        },
        Commands::ListScenarios => {
            for name in scenarios::names() {
                println!("{name}");
            }
            0
        }
        Commands::Run(args) => run_grid_command(args),
    };
    std::process::exit(code);
}

fn run_grid_command(args: RunArgs) -> i32 {
    let vary = match args.vary.iter().map(|raw| parse_vary(raw)).collect::<Result<Vec<_>, _>>() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("pd-cli: {e}");
            return exit_code(&e);
        }
    };
    let methods = match args.methods.iter().map(|m| Method::parse(m)).collect::<Result<Vec<_>, _>>() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("pd-cli: {e}");
            return exit_code(&e);
        }
    };

    let config = GridConfig {
        scenario: args.scenario,
        vary,
        methods,
        n_elements: args.n_elements,
        n_collocation: args.n_collocation,
        effective_nfe: args.effective_nfe,
        warmstart: args.warmstart,
        ramp_tsh_max: args.ramp_tsh_max,
        ramp_pch_max: args.ramp_pch_max,
        force: args.force,
    };

    let store = match RecordStore::new(args.out_dir.clone()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("pd-cli: failed to open record store at {}: {e}", args.out_dir.display());
            return 4;
        }
    };

    let budget = Duration::from_secs(args.budget_secs);
    match pd_bench::run_grid(&config, &store, budget, args.isolate) {
        Ok(records) => {
            let failed = records.iter().filter(|r| r.failed).count();
            println!("ran {} case(s), {failed} failed", records.len());
            if failed > 0 {
                3
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("pd-cli: grid run aborted: {e}");
            exit_code(&e)
        }
    }
}

fn parse_vary(raw: &str) -> Result<VarySpec, BenchError> {
    let (path, values) = raw.split_once('=').ok_or_else(|| BenchError::InvalidVarySpec(raw.to_string()))?;
    let values = values
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|_| BenchError::InvalidVarySpec(raw.to_string()))?;
    if values.is_empty() {
        return Err(BenchError::InvalidVarySpec(raw.to_string()));
    }
    Ok(VarySpec { path: path.to_string(), values })
}

/// Maps the error taxonomy to an exit code: 2 for a caller/input mistake
/// the user can fix (bad scenario, bad override path, invalid scenario
/// bounds), 3 for a solver/runtime failure, 4 for everything else
/// (I/O, serialization, an internal invariant violation).
fn exit_code(err: &BenchError) -> i32 {
    match err {
        BenchError::UnknownScenario(_)
        | BenchError::UnknownOverridePath(_)
        | BenchError::UnknownMethod(_)
        | BenchError::InvalidVarySpec(_)
        | BenchError::Model(ModelError::InvalidScenario(_)) => 2,
        BenchError::Timeout { .. }
        | BenchError::ChildProcessFailed { .. }
        | BenchError::Results(ResultsError::SolverUnavailable(_)) => 3,
        _ => 4,
    }
}
