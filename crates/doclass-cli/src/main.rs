mod classify;
mod display;
mod embed;
mod train;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::embed::{ExclusionArgs, ProviderArgs};

#[derive(Parser, Debug)]
#[command(name = "doclass", version, about = "Document classification: embed, train, classify")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed a labeled document tree into a dataset file
    Embed(EmbedArgs),
    /// Search hyperparameters, retrain the best model and save the artifact
    Train(TrainArgs),
    /// Classify a document locally through the inference handler
    Classify(ClassifyArgs),
    /// Send a document to a deployed gateway endpoint
    Invoke(InvokeArgs),
}

#[derive(Args, Debug)]
struct EmbedArgs {
    /// Root directory laid out as <label>/**/*.txt
    #[arg(long)]
    docs: PathBuf,

    /// Dataset file to write
    #[arg(long, env = "DOCLASS_DATASET", default_value = doclass_ai::dataset::DEFAULT_DATASET_FILE)]
    dataset: PathBuf,

    /// Re-embed even if the dataset file already exists
    #[arg(long)]
    force: bool,

    #[command(flatten)]
    exclusions: ExclusionArgs,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Dataset file produced by `embed`
    #[arg(long, env = "DOCLASS_DATASET", default_value = doclass_ai::dataset::DEFAULT_DATASET_FILE)]
    dataset: PathBuf,

    /// Build the dataset from this directory first if the file is missing
    #[arg(long)]
    docs: Option<PathBuf>,

    #[command(flatten)]
    exclusions: ExclusionArgs,

    /// Directory the model artifact is written to
    #[arg(long, env = "DOCLASS_ARTIFACT_DIR", default_value = ".")]
    artifact_dir: PathBuf,

    /// Number of search trials
    #[arg(long, env = "DOCLASS_TRIALS", default_value_t = 100)]
    trials: usize,

    /// Seed for the split and the search
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Fraction of examples held out for validation
    #[arg(long, default_value_t = 0.2)]
    test_fraction: f64,

    /// Shuffle without stratifying by label
    #[arg(long)]
    no_stratify: bool,

    /// Held-out predictions to print
    #[arg(long, default_value_t = 10)]
    report: usize,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct DocumentInput {
    /// Document text
    #[arg(long)]
    text: Option<String>,

    /// Read the document from a file
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    /// Directory holding the model artifact
    #[arg(long, env = "DOCLASS_ARTIFACT_DIR", default_value = ".")]
    artifact_dir: PathBuf,

    /// Document text
    #[arg(long, conflicts_with_all = ["file", "event"])]
    text: Option<String>,

    /// Read the document from a file
    #[arg(long, conflicts_with = "event")]
    file: Option<PathBuf>,

    /// Replay a saved gateway event JSON file
    #[arg(long)]
    event: Option<PathBuf>,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Args, Debug)]
struct InvokeArgs {
    /// Gateway invoke URL
    #[arg(long, env = "API_GATEWAY_URL")]
    url: String,

    /// API key sent as x-api-key
    #[arg(long, env = "LAMBDA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(flatten)]
    input: DocumentInput,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("doclass v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Embed(args) => {
            let provider = args.provider.build()?;
            let exclude = args.exclusions.labels();
            let stats =
                embed::run_embed(provider.as_ref(), &args.docs, &args.dataset, &exclude, args.force)
                    .await?;
            display::print_dataset_summary(&args.dataset, &stats);
        }
        Command::Train(args) => {
            let config = train::train_config(
                args.trials,
                args.seed,
                args.test_fraction,
                !args.no_stratify,
                args.report,
            );
            let dataset = match &args.docs {
                Some(docs) => {
                    let provider = args.provider.build()?;
                    let exclude = args.exclusions.labels();
                    embed::load_or_embed(provider.as_ref(), docs, &args.dataset, &exclude).await?
                }
                None => train::load_dataset(&args.dataset)?,
            };
            let outcome = train::run_train(&dataset, &args.artifact_dir, &config)?;
            display::print_training_report(&outcome, &dataset);
            eprintln!(
                "\nArtifact written to {}",
                args.artifact_dir.display()
            );
        }
        Command::Classify(args) => {
            let provider = args.provider.build()?;
            let response = match (&args.event, &args.text, &args.file) {
                (Some(event), _, _) => {
                    classify::replay_event(&args.artifact_dir, provider, event).await?
                }
                (None, text, file) => {
                    let document = classify::read_document(text.as_deref(), file.as_deref())?;
                    classify::classify_local(&args.artifact_dir, provider, &document).await?
                }
            };
            display::print_gateway_response(&response);
            if !response.is_success() {
                std::process::exit(1);
            }
        }
        Command::Invoke(args) => {
            let document =
                classify::read_document(args.input.text.as_deref(), args.input.file.as_deref())?;
            let result = classify::invoke(&args.url, args.api_key.as_deref(), &document).await?;
            display::print_classification(&result);
        }
    }

    Ok(())
}
