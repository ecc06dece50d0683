//! planchain: turn requests into operation plans and run them
//!
//! Usage:
//!   planchain run "analyze the sales data"     → plan with the LLM (or keywords) and execute
//!   planchain exec plan.json --simulate        → dry-run a plan file
//!   planchain validate plan.json               → check a plan against the registry
//!   planchain batch queries.txt                → run one query per line, print totals
//!   planchain status                           → registry and history overview
//!   planchain functions --category text_operations
//!   planchain config init > ~/.planchain/config.toml

use anyhow::Context;
use clap::{Parser, Subcommand};
use planchain::app;
use planchain::report::{self, ReportOptions};
use planchain_core::{ExecutionResult, Plan, PlanchainConfig};
use planchain_engine::{validate, RunMode};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "planchain",
    about = "Plan, validate, and execute chains of operations",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (TOML). Default: ~/.planchain/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root for relative file paths
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a natural-language request and run it
    Run {
        query: String,
        /// Describe the calls without invoking them
        #[arg(long, default_value_t = false)]
        simulate: bool,
        /// Print the execution result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Show the resolved parameters of each call
        #[arg(short, long, default_value_t = false)]
        verbose: bool,
    },
    /// Run a plan from a JSON file
    Exec {
        plan: PathBuf,
        #[arg(long, default_value_t = false)]
        simulate: bool,
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Don't truncate payloads
        #[arg(long, default_value_t = false)]
        raw: bool,
        #[arg(short, long, default_value_t = false)]
        verbose: bool,
    },
    /// Plan and run every non-blank line of a file as a query
    Batch {
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        simulate: bool,
        /// Print the batch report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Also write the JSON batch report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show registered operations and history retention
    Status,
    /// Validate a plan file without running it
    Validate { plan: PathBuf },
    /// List available operations
    Functions {
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default config as TOML
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    if let Commands::Config {
        action: ConfigAction::Init,
    } = cli.command
    {
        print!("{}", PlanchainConfig::default().to_toml());
        return Ok(ExitCode::SUCCESS);
    }

    let _guard = init_tracing(cli.log_file.as_deref())?;
    let config = app::load_config(cli.config.as_deref(), cli.workspace.clone());
    let orchestrator = app::build_orchestrator(&config)?;

    let ok = match cli.command {
        Commands::Run {
            query,
            simulate,
            json,
            verbose,
        } => {
            let planner = app::select_planner(&config);
            let result = orchestrator
                .plan_and_execute(&query, planner.as_ref(), mode(simulate))
                .await;
            let opts = ReportOptions {
                show_params: verbose,
                ..ReportOptions::default()
            };
            print_result(&result, json, &opts)?
        }
        Commands::Exec {
            plan,
            simulate,
            json,
            raw,
            verbose,
        } => {
            let raw_plan = app::read_plan(&plan)?;
            let result = orchestrator.orchestrate_value(raw_plan, mode(simulate)).await;
            let opts = ReportOptions {
                raw,
                show_params: verbose,
            };
            print_result(&result, json, &opts)?
        }
        Commands::Batch {
            file,
            simulate,
            json,
            output,
        } => {
            let queries = app::read_queries(&file)?;
            println!("Processing {} queries from {}", queries.len(), file.display());
            let planner = app::select_planner(&config);
            let batch =
                app::run_batch(&orchestrator, &queries, planner.as_ref(), mode(simulate)).await;
            if let Some(path) = output {
                std::fs::write(&path, serde_json::to_string_pretty(&batch)?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&batch)?);
            } else {
                print!("{}", report::format_batch(&batch));
                print!("\n{}", report::format_history(&orchestrator.history().await));
            }
            batch.failed == 0
        }
        Commands::Status => {
            print!("{}", report::format_status(&orchestrator.status().await));
            true
        }
        Commands::Validate { plan } => {
            let raw_plan = app::read_plan(&plan)?;
            let plan = Plan::from_value(raw_plan)
                .with_context(|| format!("{} is not a plan", plan.display()))?;
            let (valid, errors) = validate(&plan.function_calls, orchestrator.registry());
            print!("{}", report::format_validation(valid, &errors));
            valid
        }
        Commands::Functions { category, search } => {
            let schemas = match (category, search) {
                (Some(c), _) => orchestrator.functions_by_category(&c),
                (None, Some(k)) => orchestrator.search_functions(&k),
                (None, None) => orchestrator.registry().export_schemas(),
            };
            print!("{}", report::format_functions(&schemas));
            true
        }
        Commands::Config { .. } => true,
    };

    // Returning (rather than exiting) lets the log writer guard flush on drop.
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn mode(simulate: bool) -> RunMode {
    if simulate {
        RunMode::Simulate
    } else {
        RunMode::Execute
    }
}

fn print_result(
    result: &ExecutionResult,
    json: bool,
    opts: &ReportOptions,
) -> anyhow::Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print!("{}", report::format_result(result, opts));
    }
    Ok(result.success)
}

fn init_tracing(
    log_file: Option<&std::path::Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "planchain=info".into());
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .context("--log-file must name a file")?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .init();
            Ok(None)
        }
    }
}
