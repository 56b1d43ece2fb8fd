//! testmatrix CLI - inspect, replay and archive exported test runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use testmatrix::config::{self, Config};
use testmatrix::history::HistoryStore;
use testmatrix::listener::{
    ConsoleListener, MultiListener, ReplayedRun, ResultsTreeBuilder, TestResultListener,
    print_summary,
};
use testmatrix::stats::ResultStats;
use testmatrix::tree::TestResults;
use testmatrix::xml::{ReplaySummary, XmlExporter, XmlImporter};

#[derive(Parser)]
#[command(name = "testmatrix")]
#[command(about = "Export and replay of multi-device test results", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (default: testmatrix.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the results stored in an exported run
    Summary {
        /// Exported run
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Replay an exported run and export it again
    Replay {
        /// Exported run
        file: PathBuf,

        /// Where to write the re-exported run (default: the history directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List saved runs, newest first
    History,

    /// Validate configuration file
    Validate,

    /// Write a configuration file with the default settings
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Summary { file, format } => summarize(&file, &format).await,
        Commands::Replay { file, output } => {
            let config = config::load_config_or_default(config_path)?;
            replay(&config, &file, output, cli.verbose).await
        }
        Commands::History => {
            let config = config::load_config_or_default(config_path)?;
            list_history(&config)
        }
        Commands::Validate => validate_config(config_path),
        Commands::Init => init_config(config_path),
    }
}

/// Replays `file` into `listener`, cancelling on Ctrl-C.
async fn replay_file(file: &Path, listener: Arc<dyn TestResultListener>) -> Result<ReplaySummary> {
    let token = CancellationToken::new();
    let importer = XmlImporter::new(file.to_path_buf()).with_cancellation_token(token.clone());
    let Some(handle) = importer
        .import(listener)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?
    else {
        bail!("{} is not an exported test matrix", file.display());
    };

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping replay");
            token.cancel();
        }
    });
    let summary = handle.join().await;
    interrupt.abort();

    summary.with_context(|| format!("Failed to replay {}", file.display()))
}

#[derive(Serialize)]
struct DeviceSummary {
    id: String,
    name: String,
    device_type: String,
    version: u32,
    result: Option<String>,
    stats: ResultStats,
}

#[derive(Serialize)]
struct RunSummary {
    devices: Vec<DeviceSummary>,
    stats: ResultStats,
    execution_duration_ms: Option<u64>,
}

impl RunSummary {
    fn new(run: &ReplayedRun) -> Self {
        let devices = run
            .devices
            .iter()
            .map(|device| DeviceSummary {
                id: device.id().to_string(),
                name: device.name().to_string(),
                device_type: device.device_type().to_string(),
                version: device.version(),
                result: run.tree.suite_result(device).map(|r| r.to_string()),
                stats: run.tree.result_stats_for(device),
            })
            .collect();
        Self {
            devices,
            stats: run.tree.result_stats(),
            execution_duration_ms: run.execution_duration.map(|d| d.as_millis() as u64),
        }
    }
}

async fn summarize(file: &Path, format: &str) -> Result<()> {
    let builder = Arc::new(ResultsTreeBuilder::new());
    replay_file(file, builder.clone()).await?;
    let run = builder.snapshot().await;
    let summary = RunSummary::new(&run);

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&summary)?;
            println!("{}", json);
        }
        _ => {
            for device in &summary.devices {
                println!(
                    "{} ({}, API {}): {} [{}]",
                    device.name,
                    device.id,
                    device.version,
                    device.stats.summary_text(),
                    device.result.as_deref().unwrap_or("UNKNOWN")
                );
            }
            print_summary(&summary.stats, summary.devices.len(), run.execution_duration);
        }
    }

    Ok(())
}

async fn replay(config: &Config, file: &Path, output: Option<PathBuf>, verbose: bool) -> Result<()> {
    let builder = Arc::new(ResultsTreeBuilder::new());
    let listener = MultiListener::new()
        .with_listener(ConsoleListener::new(verbose))
        .with_listener(builder.clone());
    let summary = replay_file(file, Arc::new(listener)).await?;
    if summary.cancelled {
        warn!("Replay was cancelled, exporting the partial run");
    }

    let run = builder.snapshot().await;
    let execution_duration = run
        .execution_duration
        .unwrap_or_else(|| run.tree.total_duration());
    let exporter = XmlExporter::new(
        &run.tree,
        &run.devices,
        &config.run_configuration,
        execution_duration,
    )
    .with_product_name(&config.export.product_name)
    .with_strict(config.export.strict);

    let path = match output {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            exporter
                .export_to_writer(std::io::BufWriter::new(file), config.export.indent)
                .with_context(|| format!("Failed to export to {}", path.display()))?;
            path
        }
        None => HistoryStore::from_config(&config.history).save(&exporter)?,
    };
    info!("Exported {} test cases to {}", summary.test_cases, path.display());

    Ok(())
}

fn list_history(config: &Config) -> Result<()> {
    let store = HistoryStore::from_config(&config.history);
    let entries = store.entries()?;
    if entries.is_empty() {
        println!("No saved runs in {}", store.dir().display());
        return Ok(());
    }

    println!("Saved runs in {}:", store.dir().display());
    for entry in &entries {
        println!("  {}", entry.name());
    }
    Ok(())
}

fn validate_config(config_path: Option<&Path>) -> Result<()> {
    match config::load_config_or_default(config_path) {
        Ok(config) => {
            println!("Configuration is valid!");
            println!();
            println!("Settings:");
            println!("  Indent: {}", config.export.indent);
            println!("  Strict export: {}", config.export.strict);
            println!("  History: {}", config.history.resolved_dir().display());
            println!("  Max saved runs: {}", config.history.max_entries);
            println!("  Run configuration: {}", config.run_configuration.name);

            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_config(config_path: Option<&Path>) -> Result<()> {
    let path = config_path.unwrap_or(Path::new(config::DEFAULT_CONFIG_FILE));
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created {}", path.display());
    Ok(())
}
