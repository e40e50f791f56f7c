use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vrec_adapters::{load_column_mapping, parse_dataset, rows_since, ParseOptions};
use vrec_core::{ColumnMapping, Dataset};
use vrec_sync::{DaySession, EngineConfig, Reconciler};

#[derive(Debug, Parser)]
#[command(name = "vrec-cli")]
#[command(about = "Reconcile morning and evening visit reports")]
struct Cli {
    /// Directory holding `rules/` and `config/`; overrides VREC_WORKSPACE_ROOT.
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the matched reports of both feeds as JSON.
    Reconcile(FeedArgs),
    /// Reconcile one day and print its summary as JSON.
    Summary(FeedArgs),
}

#[derive(Debug, Args)]
struct FeedArgs {
    /// JSON array of morning rows.
    #[arg(long)]
    morning: PathBuf,
    /// JSON array of evening rows.
    #[arg(long)]
    evening: PathBuf,
    /// Column mapping; defaults to `<workspace>/config/columns.yaml`.
    #[arg(long)]
    mapping: Option<PathBuf>,
    /// Reporting day (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    day: Option<NaiveDate>,
    /// Only evening rows submitted after this moment (YYYY-MM-DDTHH:MM:SS).
    #[arg(long)]
    since: Option<NaiveDateTime>,
}

struct Inputs {
    mapping: ColumnMapping,
    morning: Dataset,
    evening: Dataset,
    day: NaiveDate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env();
    if let Some(root) = cli.workspace {
        config.workspace_root = root;
    }
    let engine = Reconciler::from_workspace(config)?;

    match cli.command {
        Commands::Reconcile(args) => {
            let inputs = load_inputs(&args, engine.config()).await?;
            let mut session = DaySession::new(inputs.day);
            let outcome = engine.reconcile(&inputs.morning, &inputs.evening, &inputs.mapping, &mut session)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Summary(args) => {
            let inputs = load_inputs(&args, engine.config()).await?;
            let mut session = DaySession::new(inputs.day);
            engine.reconcile(&inputs.morning, &inputs.evening, &inputs.mapping, &mut session)?;
            let summary = engine.summarize_day(&inputs.morning, &inputs.mapping, &session);
            if summary.is_none() {
                info!(day = %inputs.day, "nothing expected for this day");
            }
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

async fn load_inputs(args: &FeedArgs, config: &EngineConfig) -> Result<Inputs> {
    let mapping_path = args
        .mapping
        .clone()
        .unwrap_or_else(|| config.workspace_root.join("config/columns.yaml"));
    let mapping = load_column_mapping(&mapping_path)
        .with_context(|| format!("loading column mapping {}", mapping_path.display()))?;

    let (morning, evening) = tokio::try_join!(read_dataset(&args.morning), read_dataset(&args.evening))?;
    // Only the evening feed is incremental; every morning row stays a candidate.
    let evening = match args.since {
        Some(since) => select_since(&evening, &mapping.evening.timestamp, since, &config.parse),
        None => evening,
    };

    Ok(Inputs {
        mapping,
        morning,
        evening,
        day: args.day.unwrap_or_else(|| Local::now().date_naive()),
    })
}

fn select_since(dataset: &Dataset, column: &str, since: NaiveDateTime, options: &ParseOptions) -> Dataset {
    let fresh = rows_since(dataset, column, since, options);
    info!(column, total = dataset.len(), fresh = fresh.len(), "incremental selection");
    fresh
}

async fn read_dataset(path: &Path) -> Result<Dataset> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_dataset(&text).with_context(|| format!("parsing {}", path.display()))
}
