//! flowcheck CLI - unattended end-to-end flow checks
//!
//! Usage:
//!   flowcheck init [path]              Write an example suite
//!   flowcheck check [--config FILE]    Validate a suite without running it
//!   flowcheck run [--flow NAME]...     Run flows in Chrome and print a summary
//!   flowcheck summarize <results>      Summarize a results file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flowcheck_browser::chrome::ChromeSessionFactory;
use flowcheck_browser::DiagnosticsRecorder;
use flowcheck_core::config::{FlowParams, Secret};
use flowcheck_core::{FlowSpec, FlowcheckConfig, SessionMode};
use flowcheck_flow::{FlowEngine, ResultAggregator};
use flowcheck_metrics::{read_records, render_text, summarize, write_records};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_CONFIG: &str = "flowcheck.toml";

#[derive(Parser)]
#[command(name = "flowcheck")]
#[command(author, version, about = "Resilient end-to-end checks for login, navigation and search flows")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example suite file
    Init {
        #[arg(default_value = DEFAULT_CONFIG)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a suite without launching a browser
    Check {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Run flows and print a summary
    Run {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Only run these flows (repeatable)
        #[arg(short, long = "flow", value_name = "NAME")]
        flows: Vec<String>,

        /// Write run records as JSON
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Override the suite's session mode
        #[arg(long, value_enum)]
        session: Option<SessionArg>,
    },

    /// Summarize a results file written by `run --output`
    Summarize { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum SessionArg {
    Shared,
    PerFlow,
}

impl From<SessionArg> for SessionMode {
    fn from(arg: SessionArg) -> Self {
        match arg {
            SessionArg::Shared => SessionMode::Shared,
            SessionArg::PerFlow => SessionMode::PerFlow,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let all_passed = match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force).map(|_| true)?,
        Commands::Check { config } => cmd_check(&config)?,
        Commands::Run {
            config,
            flows,
            output,
            headed,
            session,
        } => cmd_run(&config, &flows, output, headed, session).await?,
        Commands::Summarize { file } => cmd_summarize(&file).await?,
    };

    if !all_passed {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} already exists (use --force to overwrite)", path);
    }
    FlowcheckConfig::write_default(path)
        .with_context(|| format!("Failed to write {:?}", path))?;

    println!("Wrote example suite to {:?}", path);
    println!("Set FLOWCHECK_SECRET before running login flows.");
    Ok(())
}

/// Load the suite and keep only the requested flows, with secrets resolved
fn load_suite(path: &Path, flows: &[String]) -> Result<FlowcheckConfig> {
    let config = FlowcheckConfig::load_or_default(path)
        .with_context(|| format!("Failed to load {:?}", path))?;
    let mut selected = config.select(flows)?;
    resolve_secrets(&mut selected);
    Ok(FlowcheckConfig {
        flows: selected,
        ..config
    })
}

/// Read each login flow's secret from its environment variable
fn resolve_secrets(specs: &mut [FlowSpec]) {
    for spec in specs {
        if let FlowParams::Login(params) = &mut spec.params {
            match std::env::var(&params.secret_env) {
                Ok(value) => params.secret = Secret::new(value),
                Err(_) => warn!("{}: {} is not set", spec.name, params.secret_env),
            }
        }
    }
}

fn report_problems(problems: &[String]) {
    for problem in problems {
        eprintln!("  - {}", problem);
    }
}

fn cmd_check(path: &Path) -> Result<bool> {
    let suite = load_suite(path, &[])?;
    let problems = suite.validate();
    if problems.is_empty() {
        println!("{:?}: {} flow(s), no problems", path, suite.flows.len());
        for flow in &suite.flows {
            println!("  {} ({}) {}", flow.name, flow.kind(), flow.url);
        }
        return Ok(true);
    }
    eprintln!("{:?}: {} problem(s)", path, problems.len());
    report_problems(&problems);
    Ok(false)
}

async fn cmd_run(
    path: &Path,
    flows: &[String],
    output: Option<PathBuf>,
    headed: bool,
    session: Option<SessionArg>,
) -> Result<bool> {
    let mut suite = load_suite(path, flows)?;
    if suite.flows.is_empty() {
        bail!("No flows configured in {:?}; run `flowcheck init` first", path);
    }
    if headed {
        suite.browser.headless = false;
    }
    if let Some(mode) = session {
        suite.run.session_mode = mode.into();
    }

    let problems = suite.validate();
    if !problems.is_empty() {
        eprintln!("Invalid configuration:");
        report_problems(&problems);
        bail!("{} configuration problem(s)", problems.len());
    }

    info!(
        "Running {} flow(s) from {:?} ({:?} session)",
        suite.flows.len(),
        path,
        suite.run.session_mode
    );

    let engine = FlowEngine::new(
        suite.timeouts.clone(),
        DiagnosticsRecorder::new((&suite.diagnostics).into()),
    );
    let factory = ChromeSessionFactory {
        settings: suite.browser.clone(),
        navigation_timeout: Duration::from_millis(suite.timeouts.navigation_ms),
    };
    let aggregator = ResultAggregator::new(engine, suite.run.clone());
    let records = aggregator.run_all(&factory, &suite.flows).await;

    if let Some(output) = output {
        write_records(&output, &records)
            .await
            .with_context(|| format!("Failed to write results to {:?}", output))?;
        println!("Results written to {:?}", output);
    }

    let summary = summarize(&records);
    println!("{}", render_text(&records, &summary));
    Ok(summary.all_passed())
}

async fn cmd_summarize(file: &Path) -> Result<bool> {
    let records = read_records(file)
        .await
        .with_context(|| format!("Failed to read results from {:?}", file))?;
    let summary = summarize(&records);
    println!("{}", render_text(&records, &summary));
    Ok(summary.all_passed())
}
