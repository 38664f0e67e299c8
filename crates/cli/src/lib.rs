use anyhow::{Context as AnyhowContext, Result};
use buildlens_engine::CategoryCounts;
use buildlens_protocol::{BuildStatus, BuildTrigger};
use buildlens_server::{LiveSyncHandle, LiveSyncServer};
use buildlens_store::{
    render_blocking, CycleOutcome, EmbeddedAssets, ReportPipeline, ReportStore,
};
use clap::{Args, Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::task::JoinSet;

mod config;

pub use config::{ErrorConfig, ErrorOptions, ReporterConfig, ServerOptions};

#[derive(Parser)]
#[command(name = "buildlens")]
#[command(about = "Classify build diagnostics and keep a live dashboard in sync", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Reporter config file (JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Open the dashboard in the browser when the live server starts
    #[arg(long, global = true)]
    open: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a report from one completed build
    Report(ReportArgs),

    /// Read build events (one JSON object per line) from stdin
    Run(RunArgs),

    /// Serve an existing output directory
    Serve(ServeArgs),
}

#[derive(Args)]
struct ReportArgs {
    /// Build event JSON: {"errors": [...], "warnings": [...]}
    #[arg(long)]
    input: PathBuf,

    /// Stop with a non-zero status on blocking diagnostics
    #[arg(long)]
    strict: bool,

    /// Keep the live server running after the report is written
    #[arg(long)]
    serve: bool,

    /// Output directory (overrides `outputPath`)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    strict: bool,

    /// Start the live server (same as `autoStartServer`)
    #[arg(long)]
    serve: bool,

    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long)]
    output: Option<PathBuf>,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut config = ReporterConfig::load(cli.config.as_deref())?;
    config.open_browser |= cli.open;
    let node_env = std::env::var("NODE_ENV").ok();

    match cli.command {
        Commands::Report(args) => {
            let strict = config.strict_mode(args.strict, node_env.as_deref());
            run_report(args, config, strict).await?;
        }
        Commands::Run(args) => {
            let strict = config.strict_mode(args.strict, node_env.as_deref());
            run_bridge(args, config, strict).await?;
        }
        Commands::Serve(args) => run_serve(args, config).await?,
    }
    Ok(())
}

fn build_pipeline(config: &ReporterConfig, output: PathBuf, strict: bool) -> ReportPipeline {
    ReportPipeline::new(config.assembler(), ReportStore::new(output))
        .with_policy(config.blocking_policy(strict))
        .with_assets(Arc::new(EmbeddedAssets))
}

async fn start_server(
    config: &ReporterConfig,
    pipeline: &ReportPipeline,
) -> Result<Arc<LiveSyncHandle>> {
    let server_config = config.server_config(pipeline.store().output_dir());
    let handle = LiveSyncServer::start(server_config)
        .await
        .context("Failed to start live report server")?;
    let handle = Arc::new(handle);
    pipeline.set_publisher(handle.clone());
    announce_dashboard(handle.port(), config.open_browser);
    Ok(handle)
}

fn announce_dashboard(port: u16, open_browser: bool) {
    let url = format!("http://localhost:{port}");
    println!("Live report: {}", style(&url).cyan());
    if open_browser {
        if let Err(err) = open::that_detached(&url) {
            log::warn!("Failed to open {url} in a browser: {err}");
        }
    }
}

async fn serve_until_interrupted(handle: &LiveSyncHandle) -> Result<()> {
    println!("Press Ctrl-C to stop");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            handle.shutdown();
        }
        result = handle.wait() => return result.context("Live report server stopped"),
    }
    handle.wait().await.context("Live report server stopped")
}

async fn run_report(args: ReportArgs, config: ReporterConfig, strict: bool) -> Result<()> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let trigger: BuildTrigger = serde_json::from_slice(&bytes)
        .with_context(|| format!("Invalid build event in {}", args.input.display()))?;

    let output = args.output.unwrap_or_else(|| config.output_path.clone());
    let pipeline = build_pipeline(&config, output, strict);

    let server = if args.serve || config.auto_start_server {
        Some(start_server(&config, &pipeline).await?)
    } else {
        None
    };

    let outcome = pipeline
        .on_build_complete(trigger)
        .await
        .context("Report generation failed")?;
    report_outcome(outcome);

    if let Some(handle) = server {
        serve_until_interrupted(&handle).await?;
    }
    Ok(())
}

async fn run_bridge(args: RunArgs, config: ReporterConfig, strict: bool) -> Result<()> {
    let output = args.output.unwrap_or_else(|| config.output_path.clone());
    let pipeline = Arc::new(build_pipeline(&config, output, strict));

    let server = if args.serve || config.auto_start_server {
        Some(start_server(&config, &pipeline).await?)
    } else {
        None
    };

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut cycles = JoinSet::new();
    // A halted cycle must end the process even while stdin stays open.
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let trigger: BuildTrigger = match serde_json::from_str(&line) {
                    Ok(trigger) => trigger,
                    Err(err) => {
                        log::warn!("Ignoring malformed build event: {err}");
                        continue;
                    }
                };
                let pipeline = Arc::clone(&pipeline);
                cycles.spawn(async move { pipeline.on_build_complete(trigger).await });
            }
            Some(joined) = cycles.join_next(), if !cycles.is_empty() => finish_cycle(joined),
        }
    }
    while let Some(joined) = cycles.join_next().await {
        finish_cycle(joined);
    }

    if let Some(handle) = server {
        handle.shutdown();
        handle.wait().await.context("Live report server stopped")?;
    }
    Ok(())
}

fn finish_cycle(
    joined: std::result::Result<buildlens_store::Result<CycleOutcome>, tokio::task::JoinError>,
) {
    match joined {
        Ok(Ok(outcome)) => report_outcome(outcome),
        Ok(Err(err)) => log::error!("Report generation failed: {err}"),
        Err(err) => log::error!("Report task failed: {err}"),
    }
}

async fn run_serve(args: ServeArgs, config: ReporterConfig) -> Result<()> {
    let output = args.output.unwrap_or_else(|| config.output_path.clone());
    let handle = LiveSyncServer::start(config.server_config(&output))
        .await
        .context("Failed to start live report server")?;
    announce_dashboard(handle.port(), config.open_browser);
    serve_until_interrupted(&handle).await
}

/// Prints the cycle summary. A halted cycle terminates the process.
fn report_outcome(outcome: CycleOutcome) {
    match outcome {
        CycleOutcome::Published {
            report_path,
            report,
            error_counts,
            warning_counts,
        } => {
            let status = match report.build_status {
                BuildStatus::Success => style("success").green(),
                BuildStatus::Failed => style("failed").red(),
            };
            println!(
                "Build {status}: {} error(s), {} warning(s)",
                report.error_count(),
                report.warning_count()
            );
            print_counts("errors", &error_counts);
            print_counts("warnings", &warning_counts);
            println!("Report: {}", report_path.display());
        }
        CycleOutcome::Dropped => {}
        CycleOutcome::Halted {
            report_path,
            blocking,
            message,
            ..
        } => {
            eprintln!("{}", style(&message).red().bold());
            for line in render_blocking(&blocking) {
                eprintln!("  {}", style(line).red());
            }
            eprintln!("Report: {}", report_path.display());
            std::process::exit(1);
        }
    }
}

fn print_counts(label: &str, counts: &CategoryCounts) {
    if counts.total() == 0 {
        return;
    }
    println!("  {label} ({}):", counts.total());
    for (category, count) in counts.nonzero() {
        println!("    {category}: {count}");
    }
}
