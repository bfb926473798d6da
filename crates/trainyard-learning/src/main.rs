//! CLI entry point for the training pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use trainyard_learning::{
    Algorithm, HyperparameterOverrides, MetricsReport, ModelReport, Pipeline, PipelineConfig,
    PipelineResult, TrainedModel,
};

#[derive(Parser, Debug)]
#[command(
    name = "trainyard",
    version,
    about = "Train a model from a CSV file",
    long_about = "Validates a CSV upload, searches the chosen algorithm's hyperparameters,\n\
                  evaluates the winner on a held-out split and renders diagnostic charts.\n\n\
                  ALGORITHMS:\n  \
                  classification: decision_tree, knn, random_forest\n  \
                  regression:     linear_regression, polynomial_regression, ridge_regression\n\n\
                  EXAMPLES:\n  \
                  # Train a classifier\n  \
                  trainyard -i iris.csv -t species -a knn -o results/\n\n  \
                  # Ridge with a fixed alpha, JSON summary on stdout\n  \
                  trainyard -i houses.csv -t price -a ridge --alpha 0.5 --json\n\n  \
                  # Predict with a saved model\n  \
                  trainyard predict --model results/model_run.json --record '{\"age\": 3}'",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the CSV file to train on
    #[arg(short, long, required = true)]
    input: Option<PathBuf>,

    /// Target column to predict
    #[arg(short, long, required = true)]
    target: Option<String>,

    /// Algorithm to train (e.g. knn, random_forest, ridge)
    #[arg(short, long, required = true, value_parser = parse_algorithm)]
    algorithm: Option<Algorithm>,

    /// Name recorded on the trained model
    #[arg(short, long, default_value = "model")]
    model_name: String,

    /// Fixed ridge regularization strength (ridge only)
    ///
    /// Without it, alpha is chosen by cross-validation.
    #[arg(long)]
    alpha: Option<String>,

    /// Identifier used in output file names
    ///
    /// Defaults to the model name plus a timestamp and a random suffix.
    #[arg(long)]
    run_id: Option<String>,

    /// Output directory for the model, charts and report
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,

    /// Seed for the split and every seeded estimator
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logs; only the result (or the error) is printed.
    #[arg(long)]
    json: bool,

    /// Write report_<run_id>.json to the output directory
    #[arg(short = 'r', long)]
    emit_report: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict with a saved model
    Predict {
        /// Path to a model_<run_id>.json file
        #[arg(short, long)]
        model: PathBuf,

        /// Encoded feature values in the model's feature order
        #[arg(
            short,
            long,
            value_delimiter = ',',
            allow_hyphen_values = true,
            conflicts_with = "record",
            required_unless_present = "record"
        )]
        features: Vec<f64>,

        /// Raw record as a JSON object keyed by column name
        #[arg(short, long)]
        record: Option<String>,

        /// Print the prediction as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_algorithm(s: &str) -> std::result::Result<Algorithm, String> {
    s.parse::<Algorithm>().map_err(|e| e.to_string())
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(Command::Predict {
        model,
        features,
        record,
        json,
    }) = &args.command
    {
        init_logging(&args.log_level, args.quiet, *json);
        return run_predict(model, features, record.as_deref(), *json);
    }

    init_logging(&args.log_level, args.quiet, args.json);
    run_training(&args)
}

fn build_pipeline(args: &Args) -> Result<Pipeline> {
    let algorithm = args
        .algorithm
        .ok_or_else(|| anyhow!("--algorithm is required"))?;
    let target = args
        .target
        .as_deref()
        .ok_or_else(|| anyhow!("--target is required"))?;

    let mut config_builder = PipelineConfig::builder()
        .algorithm(algorithm)
        .target_column(target)
        .model_name(&args.model_name)
        .seed(args.seed);

    if let Some(alpha) = &args.alpha {
        config_builder = config_builder.overrides(HyperparameterOverrides::with_alpha(alpha.as_str()));
    }
    if let Some(run_id) = &args.run_id {
        config_builder = config_builder.run_id(run_id);
    }

    let config = config_builder.build()?;

    let mut builder = Pipeline::builder().config(config);
    if !args.quiet {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage,
                update.message
            );
        });
    }
    Ok(builder.build()?)
}

fn run_training(args: &Args) -> Result<()> {
    let input = args
        .input
        .as_deref()
        .ok_or_else(|| anyhow!("--input is required"))?;
    if !input.exists() {
        return Err(anyhow!("Input file not found: {}", input.display()));
    }

    let pipeline = build_pipeline(args)?;

    info!("Loading dataset from: {}", input.display());
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;

    let result = match pipeline.run(&bytes) {
        Ok(result) => result,
        Err(e) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e)?);
            } else {
                error!("Pipeline failed: {}", e);
            }
            return Err(anyhow!("Pipeline failed: {}", e));
        }
    };

    write_outputs(&result, args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result, &args.output);
    }
    Ok(())
}

/// Write the model, every chart and optionally the report into the output directory.
fn write_outputs(result: &PipelineResult, args: &Args) -> Result<()> {
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let model_path = args.output.join(format!("model_{}.json", result.run_id));
    std::fs::write(&model_path, &result.model_artifact.serialized_bytes)
        .with_context(|| format!("writing {}", model_path.display()))?;
    info!("Model saved: {}", model_path.display());

    for image in &result.images {
        let path = args.output.join(&image.file_name);
        std::fs::write(&path, &image.bytes)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    info!("{} charts written to {}", result.images.len(), args.output.display());

    if args.emit_report {
        ModelReport::from_result(result).write_json(&args.output)?;
    }
    Ok(())
}

/// Print a human-readable summary.
///
/// Uses `println!` on purpose: this is the command's output, not a log line.
fn print_summary(result: &PipelineResult, output: &Path) {
    let artifact = &result.model_artifact;

    println!("\n{}", "=".repeat(60));
    println!("TRAINING COMPLETE");
    println!("{}", "=".repeat(60));
    println!("  Run: {}", result.run_id);
    println!("  Model: {} ({})", artifact.model_name, artifact.algorithm.display_name());
    println!("  Task: {}", artifact.task.describe());
    println!("  Features: {}", artifact.feature_names.len());
    if !artifact.hyperparameters.is_empty() {
        let params: Vec<String> = artifact
            .hyperparameters
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        println!("  Hyperparameters: {}", params.join(", "));
    }
    println!(
        "  Candidates: {} ({} failed)",
        result.candidates.len(),
        result.candidates.iter().filter(|c| c.error.is_some()).count()
    );

    println!("\nMETRICS");
    println!("{}", "-".repeat(40));
    match &result.metrics {
        Some(MetricsReport::Classification(m)) => {
            println!("  Accuracy:  {:.4}", m.accuracy);
            println!("  Precision: {:.4} ({:?})", m.precision, m.averaging);
            println!("  Recall:    {:.4}", m.recall);
            println!("  F1:        {:.4}", m.f1);
            if let Some(auc) = m.roc_auc {
                println!("  ROC AUC:   {auc:.4}");
            }
        }
        Some(MetricsReport::Regression(m)) => {
            println!("  R²:   {:.4}", m.r2);
            println!("  MSE:  {:.4}", m.mse);
            println!("  RMSE: {:.4}", m.rmse);
            println!("  MAE:  {:.4}", m.mae);
        }
        None => println!("  (not available)"),
    }

    if !result.feature_importances.is_empty() {
        println!("\nTOP FEATURES");
        println!("{}", "-".repeat(40));
        for (name, value) in result.feature_importances.iter().take(10) {
            println!("  {name:<24} {value:.4}");
        }
    }

    if !result.warnings.is_empty() {
        println!("\nWARNINGS");
        println!("{}", "-".repeat(40));
        for w in &result.warnings {
            println!("  - {w}");
        }
    }

    println!("\nOUTPUT FILES");
    println!("{}", "-".repeat(40));
    println!("  - {}/model_{}.json", output.display(), result.run_id);
    for image in &result.images {
        println!("  - {}/{}", output.display(), image.file_name);
    }
    println!("  Completed in {} ms", result.duration_ms);
    println!("{}", "=".repeat(60));
}

fn run_predict(model_path: &Path, features: &[f64], record: Option<&str>, json: bool) -> Result<()> {
    let model = TrainedModel::load(model_path)?;
    info!(
        "Loaded {} ({}) expecting {}",
        model.model_name(),
        model.algorithm().display_name(),
        model.feature_names().join(", ")
    );

    let prediction = match record {
        Some(raw) => {
            let value: serde_json::Value =
                serde_json::from_str(raw).context("--record must be valid JSON")?;
            let object = value
                .as_object()
                .ok_or_else(|| anyhow!("--record must be a JSON object"))?;
            model.predict_record(object)?
        }
        None => model.predict(features)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
        return Ok(());
    }

    match &prediction.label {
        Some(label) => println!("Prediction: {label} (class {})", prediction.value),
        None => println!("Prediction: {}", prediction.value),
    }
    if let Some(confidence) = prediction.confidence {
        println!("Confidence: {:.1}%", confidence * 100.0);
    }
    if let Some(probabilities) = &prediction.probabilities {
        for (class, p) in probabilities {
            println!("  {class:<20} {p:.4}");
        }
    }
    Ok(())
}
