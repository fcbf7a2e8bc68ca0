//! CLI argument parsing and command dispatch

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use hobbit_bench_core::{
    strategy_by_name, BenchmarkConfig, BenchmarkOutcome, ChannelConfig, Dataset,
    OrchestratorBuilder, Transport,
};
use hobbit_bench_report::{render_summary, CsvExporter, JsonExporter, ResultModel};
use hobbit_bench_system::BaselineSystem;
use hobbit_bench_transport::InMemoryBroker;

/// hobbit-bench - Regression benchmark controller
#[derive(Parser, Debug)]
#[command(name = "hobbit-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a benchmark against the built-in baseline system
    Run(RunArgs),
    /// Split a dataset into training and test files
    Split(SplitArgs),
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Arguments of `hobbit-bench run`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the dataset (header row, separator-delimited, target in last column)
    #[arg(short, long)]
    pub dataset: PathBuf,

    /// Path to a JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Split seed (overrides the configuration file)
    #[arg(short, long)]
    pub seed: Option<i64>,

    /// Training fraction in [0, 1] (overrides the configuration file)
    #[arg(long)]
    pub train_fraction: Option<f64>,

    /// Session id scoping queues and commands
    #[arg(long, env = "HOBBIT_SESSION_ID", default_value = "local-session")]
    pub session_id: String,

    /// Experiment IRI used as subject of the result model
    #[arg(
        long,
        env = "HOBBIT_EXPERIMENT_URI",
        default_value = "http://w3id.org/hobbit/experiments#local"
    )]
    pub experiment_uri: String,

    /// Accuracy scoring strategy (mae, rmse)
    #[arg(long, default_value = "mae")]
    pub scoring: String,

    /// Delay the baseline system waits before each answer, in milliseconds
    #[arg(long)]
    pub response_delay_ms: Option<u64>,

    /// Output directory for results
    #[arg(long, default_value = "results")]
    pub output_dir: PathBuf,

    /// Export full results and a statistics summary to JSON
    #[arg(long)]
    pub json: bool,

    /// Export summary to CSV
    #[arg(long)]
    pub csv: bool,
}

/// Arguments of `hobbit-bench split`
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Path to the dataset
    #[arg(short, long)]
    pub dataset: PathBuf,

    /// Split seed
    #[arg(short, long)]
    pub seed: i64,

    /// Training fraction in [0, 1]
    #[arg(long, default_value = "0.9")]
    pub train_fraction: f64,

    /// Directory receiving train.csv and test.csv
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

impl Cli {
    /// Dispatch the selected subcommand
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Run(args) => run_benchmark(args).await,
            Commands::Split(args) => split_dataset(args),
            Commands::Validate { config } => validate_config(config),
        }
    }
}

fn load_config(path: &Path) -> Result<BenchmarkConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: BenchmarkConfig = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

async fn run_benchmark(args: &RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => BenchmarkConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(fraction) = args.train_fraction {
        config.train_fraction = fraction;
    }
    config.validate().context("invalid configuration")?;

    let dataset = Dataset::from_path(&args.dataset)
        .with_context(|| format!("failed to load dataset {}", args.dataset.display()))?;
    let scoring = strategy_by_name(&args.scoring)
        .with_context(|| format!("unknown scoring strategy `{}`", args.scoring))?;

    tracing::info!(
        dataset = %args.dataset.display(),
        rows = dataset.rows().len(),
        seed = config.seed,
        session_id = %args.session_id,
        "Preparing benchmark"
    );

    let broker = Arc::new(InMemoryBroker::new(ChannelConfig::default()));
    let transport: Arc<dyn Transport> = broker.clone();

    let system = BaselineSystem::connect(
        Arc::clone(&transport),
        args.session_id.as_str(),
        config.message_separator,
    )
    .await
    .context("failed to start baseline system")?
    .with_response_delay(args.response_delay_ms.map(Duration::from_millis));
    let system_handle = tokio::spawn(system.run());

    let orchestrator = OrchestratorBuilder::new()
        .config(config.clone())
        .session_id(args.session_id.as_str())
        .dataset(dataset)
        .transport(transport)
        .scoring(Arc::from(scoring))
        .build()?;

    let outcome = match orchestrator.run_with_signal_handling().await {
        Ok(outcome) => outcome,
        Err(e) => {
            broker.close();
            system_handle.abort();
            return Err(e).context("benchmark run failed");
        }
    };

    let model = ResultModel::from_statistics(
        args.experiment_uri.as_str(),
        config.benchmark_namespace.as_str(),
        &outcome.statistics,
    );
    orchestrator.publish_results(&model.to_bytes()?).await?;

    match system_handle.await {
        Ok(Ok(report)) => tracing::info!(
            prediction = report.prediction,
            answered = report.answered,
            "Baseline system finished"
        ),
        Ok(Err(e)) => tracing::warn!(error = %e, "Baseline system failed"),
        Err(e) => tracing::warn!(error = %e, "Baseline system task failed"),
    }
    broker.close();

    println!("\n{}\n", render_summary(&outcome));
    export_results(args, &outcome, &model)?;

    Ok(())
}

fn export_results(args: &RunArgs, outcome: &BenchmarkOutcome, model: &ResultModel) -> Result<()> {
    if !args.json && !args.csv {
        return Ok(());
    }

    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            args.output_dir.display()
        )
    })?;

    if args.json {
        let path = args.output_dir.join("results.json");
        JsonExporter::export(outcome, model, &path)?;
        println!("Results written to {}", path.display());

        let path = args.output_dir.join("summary.json");
        JsonExporter::export_summary(outcome, &path)?;
        println!("Summary written to {}", path.display());
    }
    if args.csv {
        let path = args.output_dir.join("summary.csv");
        CsvExporter::export_summary(outcome, &path)?;
        println!("Summary written to {}", path.display());
    }

    Ok(())
}

fn split_dataset(args: &SplitArgs) -> Result<()> {
    let config = BenchmarkConfig::new(args.seed).with_train_fraction(args.train_fraction);
    config.validate().context("invalid split parameters")?;

    let dataset = Dataset::from_path(&args.dataset)
        .with_context(|| format!("failed to load dataset {}", args.dataset.display()))?;
    let split = dataset.split(config.seed, config.train_fraction);

    fs::create_dir_all(&args.output_dir)?;
    for (name, rows) in [("train.csv", &split.train_rows), ("test.csv", &split.test_rows)] {
        let path = args.output_dir.join(name);
        let mut content = String::with_capacity(split.header.len() + rows.len() * 32);
        content.push_str(&split.header);
        for row in rows.iter() {
            content.push('\n');
            content.push_str(row);
        }
        content.push('\n');
        fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("{} rows written to {}", rows.len(), path.display());
    }

    Ok(())
}

fn validate_config(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    config.validate().context("invalid configuration")?;

    println!("Configuration is valid:");
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
