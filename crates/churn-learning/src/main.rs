//! CLI entry point for training and querying churn models.

use anyhow::{Context, Result, bail};
use churn_learning::{
    ModelHandle, ParamGrid, RiskPolicy, Trainer, TrainingConfig, TrainingSummary,
};
use churn_processing::{CustomerRecord, DatasetConfig};
use clap::{Args, Parser, Subcommand};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "churn-train",
    version,
    about = "Train and query customer churn models",
    long_about = "Trains a gradient-boosted churn classifier with cross-validated grid \
                  search and answers predictions from the saved artifact.\n\n\
                  EXAMPLES:\n  \
                  # Full grid search, 3 folds\n  \
                  churn-train train --data telco.csv --model churn_model.json\n\n  \
                  # Single combination for a smoke run\n  \
                  churn-train train --data telco.csv --model churn_model.json --quick\n\n  \
                  # Predict one customer from stdin\n  \
                  cat customer.json | churn-train predict --model churn_model.json --record -"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean, split, search and save a model artifact
    Train(TrainArgs),
    /// Predict churn for customer records with a saved artifact
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Path to the training CSV
    #[arg(short, long)]
    data: PathBuf,

    /// Where to write the model artifact
    #[arg(short, long, default_value = "churn_model.json")]
    model: PathBuf,

    /// Name of the Yes/No label column
    #[arg(long, default_value = "Churn")]
    target: String,

    /// Number of stratified cross-validation folds
    #[arg(long, default_value = "3")]
    folds: usize,

    /// Random seed for the split, folds and subsampling
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Fraction of rows held out for the test report
    #[arg(long, default_value = "0.2")]
    test_size: f64,

    /// Worker threads for the search (-1 for all cores)
    #[arg(short, long, default_value = "-1", allow_hyphen_values = true)]
    jobs: i32,

    /// Search a single parameter combination
    #[arg(long)]
    quick: bool,

    /// Stop the search after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the training summary as JSON instead of text
    ///
    /// Disables logging so stdout holds only the JSON document.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Model artifact written by `train`
    #[arg(short, long)]
    model: PathBuf,

    /// JSON file holding one record or an array of records, or `-` for stdin
    #[arg(short, long, default_value = "-")]
    record: String,

    /// JSON file overriding the risk threshold and labels
    #[arg(long)]
    risk_policy: Option<PathBuf>,
}

/// Initialize the tracing subscriber. Logs go to stderr so stdout carries
/// only results.
fn init_logging(level: &str, quiet: bool, disabled: bool) {
    if disabled {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let json_only = matches!(&cli.command, Command::Train(args) if args.json);
    init_logging(&cli.log_level, cli.quiet, json_only);

    match cli.command {
        Command::Train(args) => run_train(&args),
        Command::Predict(args) => run_predict(&args),
    }
}

fn run_train(args: &TrainArgs) -> Result<()> {
    if !args.data.exists() {
        bail!("Input file not found: {}", args.data.display());
    }

    let dataset = DatasetConfig::builder()
        .target_column(&args.target)
        .test_size(args.test_size)
        .random_seed(args.seed)
        .build()?;

    let mut builder = TrainingConfig::builder()
        .cv_folds(args.folds)
        .random_seed(args.seed)
        .n_jobs(args.jobs);
    if args.quick {
        builder = builder.param_grid(ParamGrid::quick());
    }
    if let Some(secs) = args.timeout_secs {
        builder = builder.timeout(std::time::Duration::from_secs(secs));
    }
    let training = builder.build()?;

    info!("Loading dataset from: {}", args.data.display());
    let data = load_csv(&args.data)?;
    info!("Dataset loaded: {} rows x {} columns", data.height(), data.width());

    let outcome = Trainer::new(dataset, training)
        .on_progress(|update| {
            debug!(
                "[{}] {:.0}% {}",
                update.stage.as_str(),
                update.progress * 100.0,
                update.message
            )
        })
        .train(data)?;

    outcome
        .pipeline
        .save(&args.model)
        .with_context(|| format!("writing model artifact to {}", args.model.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
    } else {
        print_summary(&outcome.summary, &args.model);
    }
    Ok(())
}

fn run_predict(args: &PredictArgs) -> Result<()> {
    let policy = match &args.risk_policy {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading risk policy {}", path.display()))?;
            serde_json::from_str(&text).context("parsing risk policy")?
        }
        None => RiskPolicy::default(),
    };

    let handle = ModelHandle::with_policy(policy)?;
    handle.initialize_from_path(&args.model)?;

    let input = read_input(&args.record)?;
    let value: serde_json::Value = serde_json::from_str(&input).context("parsing record JSON")?;

    let output = if value.is_array() {
        let records: Vec<CustomerRecord> =
            serde_json::from_value(value).context("invalid customer record")?;
        let predictions = records
            .iter()
            .map(|record| handle.predict(record))
            .collect::<churn_learning::Result<Vec<_>>>()?;
        serde_json::to_string_pretty(&predictions)?
    } else {
        let record: CustomerRecord =
            serde_json::from_value(value).context("invalid customer record")?;
        serde_json::to_string_pretty(&handle.predict(&record)?)?
    };

    println!("{output}");
    Ok(())
}

fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {source}"))
    }
}

/// Load a CSV, inferring types over the whole file so that a blank total
/// charge far down the file keeps that column textual.
fn load_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(None)
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn print_summary(summary: &TrainingSummary, model: &Path) {
    println!("\n{}", "=".repeat(60));
    println!("TRAINING SUMMARY");
    println!("{}", "=".repeat(60));
    println!(
        "  Rows: {} cleaned ({} dropped), {} train / {} test",
        summary.cleaning.rows_after, summary.cleaning.rows_dropped, summary.train_rows, summary.test_rows
    );
    println!("  Candidates: {}", summary.candidates.len());
    println!("  Best: {}", summary.best_params);
    println!(
        "  Mean CV {}: {:.4}",
        summary.scoring.as_str(),
        summary.cv_score
    );
    println!("  Search time: {:.1}s", summary.search_secs);
    println!();
    println!("TEST SET");
    println!("{}", "-".repeat(60));
    print!("{}", summary.test_report);
    println!();
    println!("TOP FEATURES");
    println!("{}", "-".repeat(60));
    for item in summary.feature_importances.iter().take(10) {
        println!("  {:<40} {:.4}", item.feature, item.importance);
    }
    println!();
    println!("Model saved to {}", model.display());
}
