//! fraudex command-line scorer
//!
//! Runs the signal engine over a plain-text document and prints the risk
//! assessment as JSON or as a markdown report.
//!
//! Usage:
//!   fraudex memo.txt
//!   fraudex --format markdown --config fraudex.yaml memo.txt
//!   cat memo.txt | fraudex --amount 4800 --amount 4900 -

mod config;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use fraudex_core::{AnalysisContext, LoggingConfig};
use fraudex_signals::{compute_risk_score_detailed, format_report, SignalEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{FraudexConfig, ReportFormat};

#[derive(Parser, Debug)]
#[command(name = "fraudex", about = "Score a document for fraud and corruption risk signals")]
struct Cli {
    /// Text file to analyze, or `-` for stdin.
    #[arg(default_value = "-")]
    input: String,

    /// YAML configuration file (falls back to `FRAUDEX_CONFIG`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format; overrides `report_format` from the configuration.
    #[arg(long, value_enum)]
    format: Option<ReportFormat>,

    /// Pre-extracted monetary amount. Repeatable.
    #[arg(long = "amount")]
    amounts: Vec<f64>,

    /// Pre-extracted ISO date or timestamp. Repeatable.
    #[arg(long = "date")]
    dates: Vec<String>,

    /// File with narrative commentary appended to markdown reports.
    #[arg(long)]
    narrative: Option<PathBuf>,

    /// Print the configured detectors with their weights and exit.
    #[arg(long)]
    list_detectors: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("FRAUDEX_CONFIG").ok().map(PathBuf::from));
    let config = match &config_path {
        Some(path) => config::load_config(path)?,
        None => FraudexConfig::default(),
    };

    init_logging(&config.logging);
    match &config_path {
        Some(path) => info!(path = %path.display(), "Loaded configuration from file"),
        None => info!("No config file specified, using defaults"),
    }

    let engine = SignalEngine::from_config(&config.engine)
        .map_err(|e| anyhow::anyhow!("Failed to initialize signal engine: {}", e))?;

    if cli.list_detectors {
        print!("{}", detector_listing(&engine));
        return Ok(());
    }

    let text = read_input(&cli.input)?;
    let narrative = cli
        .narrative
        .as_deref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read narrative file {}", path.display()))
        })
        .transpose()?;

    let context = AnalysisContext::new(text)
        .with_amounts(cli.amounts.clone())
        .with_dates(cli.dates.clone());
    let format = cli.format.unwrap_or(config.report_format);

    info!(
        detectors = engine.len(),
        chars = context.text.chars().count(),
        ?format,
        "Analyzing document"
    );
    println!("{}", render(&engine, &context, format, narrative.as_deref())?);
    Ok(())
}

/// Initialise tracing. `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// One line per detector: name, weight and description.
fn detector_listing(engine: &SignalEngine) -> String {
    engine
        .detectors()
        .map(|d| format!("{:<14} {:>4.1}  {}\n", d.name(), d.weight(), d.description()))
        .collect()
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read document from stdin")?;
        Ok(text)
    } else {
        read_file(Path::new(input))
    }
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read input file {}: {}", path.display(), e))
}

/// Analyze `context` and render the result in the requested format.
fn render(
    engine: &SignalEngine,
    context: &AnalysisContext,
    format: ReportFormat,
    narrative: Option<&str>,
) -> anyhow::Result<String> {
    let output = match format {
        ReportFormat::Json => serde_json::to_string_pretty(&engine.analyze(context))?,
        ReportFormat::Detailed => {
            serde_json::to_string_pretty(&compute_risk_score_detailed(engine, context))?
        }
        ReportFormat::Markdown => format_report(&engine.analyze(context).signals, narrative),
    };
    Ok(output)
}
