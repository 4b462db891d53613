//! converge CLI
//!
//! Converges the local host to the state declared in a YAML playbook

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use converge_core::{
    ConvergeError, ConvergenceEngine, ExecutionPlan, Playbook, PlaybookError, Report, RunEvent,
    codec,
};
use converge_exec::LocalExecutor;
use eyre::WrapErr;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod factory;

use config::Config;
use factory::ModuleFactory;

/// Exit status for parse and structural errors
const EXIT_INVALID: u8 = 2;

#[derive(Parser)]
#[command(name = "converge", version)]
#[command(about = "Declarative single-host configuration convergence", long_about = None)]
struct Cli {
    /// Config file (default: $CONVERGE_CONFIG, ./converge.toml, /etc/converge/converge.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Converge the host to the playbook
    Apply {
        /// Playbook path, or `-` for stdin
        playbook: String,
        /// Report what would change without changing anything
        #[arg(long)]
        check: bool,
        /// Per-resource timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Independent resources to run at once
        #[arg(long)]
        jobs: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Format of the input
        #[arg(long, value_enum, default_value_t = InputFormat::Yaml)]
        input: InputFormat,
    },
    /// Print the serialized record form of a playbook
    Encode {
        /// Playbook path, or `-` for stdin
        playbook: String,
    },
    /// Print the execution order without running anything
    Plan {
        /// Playbook path, or `-` for stdin
        playbook: String,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    /// YAML playbook
    Yaml,
    /// Pre-serialized records
    Records,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config_path = Config::locate(cli.config.as_deref());
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    init_tracing(&config.engine.log_level, cli.verbose, cli.log_format);
    match &config_path {
        Some(path) => debug!(path = %path.display(), "loaded configuration"),
        None => warn!("no config file found, using defaults"),
    }

    match cli.command {
        Commands::Apply {
            playbook,
            check,
            timeout,
            jobs,
            json,
            input,
        } => {
            let plan = match build_plan(open_input(&playbook)?, input) {
                Ok(plan) => plan,
                Err(e) => return Ok(invalid(&e)),
            };
            apply(&config, &plan, check, timeout, jobs, json).await
        }
        Commands::Encode { playbook } => {
            let encoded = Playbook::from_reader(open_input(&playbook)?)
                .map_err(ConvergeError::from)
                .and_then(|p| codec::encode(&p.resources).map_err(ConvergeError::from));
            match encoded {
                Ok(records) => {
                    print!("{records}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => Ok(invalid(&e)),
            }
        }
        Commands::Plan { playbook, json } => {
            let plan = match build_plan(open_input(&playbook)?, InputFormat::Yaml) {
                Ok(plan) => plan,
                Err(e) => return Ok(invalid(&e)),
            };
            print_plan(&plan, json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(level: &str, verbose: u8, format: LogFormat) {
    let default = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Open a playbook at a path, or stdin for `-`
fn open_input(source: &str) -> Result<Box<dyn Read>> {
    if source == "-" {
        return Ok(Box::new(std::io::stdin()));
    }
    let path = Path::new(source);
    let file = File::open(path)
        .wrap_err_with(|| format!("failed to open playbook {}", path.display()))?;
    Ok(Box::new(file))
}

/// Parse the input and plan it; nothing runs unless this succeeds
fn build_plan(mut reader: impl Read, input: InputFormat) -> Result<ExecutionPlan, ConvergeError> {
    match input {
        InputFormat::Yaml => ExecutionPlan::from_playbook(&Playbook::from_reader(reader)?),
        InputFormat::Records => {
            let mut text = String::new();
            reader
                .read_to_string(&mut text)
                .map_err(|e| PlaybookError::Io(e.to_string()))?;
            ExecutionPlan::from_records(&text)
        }
    }
}

fn invalid(err: &ConvergeError) -> ExitCode {
    let stage = if err.is_structural() {
        "invalid resource graph"
    } else {
        "invalid input"
    };
    error!(error = %err, "{stage}");
    eprintln!("error: {err}");
    ExitCode::from(EXIT_INVALID)
}

fn print_plan(plan: &ExecutionPlan, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }
    for (pos, step) in plan.steps().iter().enumerate() {
        let requires = &step.declaration.requires;
        if requires.is_empty() {
            println!("{}. {} [{}]", pos + 1, step.id, step.kind());
        } else {
            println!(
                "{}. {} [{}] after {}",
                pos + 1,
                step.id,
                step.kind(),
                requires.join(", ")
            );
        }
    }
    Ok(())
}

async fn apply(
    config: &Config,
    plan: &ExecutionPlan,
    check: bool,
    timeout: Option<u64>,
    jobs: Option<usize>,
    json: bool,
) -> Result<ExitCode> {
    let executor = Arc::new(LocalExecutor::new());
    let registry = ModuleFactory::new(executor).build_registry(config).await;
    let engine = ConvergenceEngine::new(Arc::new(registry), config.engine_options(timeout, jobs));

    let token = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, waiting for running resources to finish");
            token.cancel();
        }
    });

    let progress = tokio::spawn(log_progress(engine.subscribe()));

    info!(resources = plan.len(), check_mode = check, "applying playbook");
    let report = engine.run(plan, check).await;
    drop(engine);
    progress.await.ok();

    print_report(&report, json)?;
    // a cancelled run can skip resources without any failure
    Ok(if report.success() && report.summary().skipped == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Mirror engine events into the log until the run ends
async fn log_progress(mut events: broadcast::Receiver<RunEvent>) {
    let mut total = 0;
    let mut done = 0;
    loop {
        match events.recv().await {
            Ok(RunEvent::RunStarted { total: n, .. }) => total = n,
            Ok(RunEvent::ResourceStarted { id, kind }) => {
                debug!(resource = %id, kind = %kind, "[{}/{total}] running", done + 1);
            }
            Ok(RunEvent::ResourceFinished { id, state, .. }) => {
                done += 1;
                debug!(resource = %id, state = %state, "[{done}/{total}] finished");
            }
            Ok(RunEvent::RunFinished { .. }) | Err(broadcast::error::RecvError::Closed) => break,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "progress events dropped");
            }
        }
    }
}

fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
