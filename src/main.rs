use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use price_forecast::config::{self, ForecastConfig};
use price_forecast::nn::persistence::ModelSlot;
use price_forecast::{CsvSource, MarketDataSource, Pipeline, PredictionResult, YahooClient};

#[derive(Parser)]
#[command(name = "forecast")]
#[command(about = "Train a windowed LSTM on daily bars and forecast the next close")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline for one symbol and print the result as JSON
    Run(RunArgs),
    /// Show the metadata of the model in the slot
    Inspect(SlotArgs),
}

#[derive(Args)]
struct SlotArgs {
    /// Directory holding the model slot
    #[arg(long, env = config::ENV_MODEL_DIR, default_value = ".")]
    model_dir: PathBuf,

    /// Slot name
    #[arg(long, default_value = config::MODEL_SLOT)]
    slot: String,
}

#[derive(Args)]
struct RunArgs {
    /// Ticker symbol (e.g. AAPL)
    symbol: String,

    /// History window length in trading days
    #[arg(long, default_value_t = config::NN_LOOKBACK_DAYS)]
    window_size: usize,

    /// Forecast horizon in trading days
    #[arg(long, default_value_t = config::NN_FORWARD_DAYS)]
    prediction_days: usize,

    /// First date to request (YYYY-MM-DD)
    #[arg(long, env = config::ENV_START_DATE, default_value = config::DEFAULT_START_DATE)]
    start_date: NaiveDate,

    /// Read bars from a local CSV file instead of Yahoo Finance
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Maximum training epochs
    #[arg(long, default_value_t = config::NN_EPOCHS)]
    epochs: usize,

    /// Early-stopping patience in epochs
    #[arg(long, default_value_t = config::NN_PATIENCE)]
    patience: usize,

    /// Seed for weight init and batch shuffling
    #[arg(long, default_value_t = config::NN_SEED)]
    seed: u64,

    #[command(flatten)]
    slot: SlotArgs,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::Inspect(args) => inspect(args),
    }
}

/// Env overrides are resolved by clap, not by `ForecastConfig::from_env`
fn forecast_config(args: &RunArgs) -> ForecastConfig {
    ForecastConfig {
        model_slot: args.slot.slot.clone(),
        ..ForecastConfig::default()
    }
    .with_start_date(args.start_date)
    .with_epochs(args.epochs)
    .with_patience(args.patience)
    .with_seed(args.seed)
    .with_model_dir(args.slot.model_dir.clone())
}

fn run(args: RunArgs) -> Result<()> {
    let forecast_config = forecast_config(&args);

    let source: Box<dyn MarketDataSource> = match &args.csv {
        Some(path) => Box::new(CsvSource::new(&args.symbol, path)),
        None => Box::new(YahooClient::new()?),
    };

    let symbol = args.symbol.trim().to_uppercase();
    let pipeline = Pipeline::new(source, forecast_config);
    let result = pipeline
        .run(&symbol, args.window_size, args.prediction_days)
        .with_context(|| format!("Error in prediction pipeline for {}", symbol))?;

    print_summary(&symbol, &result);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn inspect(args: SlotArgs) -> Result<()> {
    let slot = ModelSlot::new(&args.model_dir, &args.slot);
    let (_, metadata) = slot.load()?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

fn print_summary(symbol: &str, result: &PredictionResult) {
    eprintln!("Prediction complete for {}", symbol);
    eprintln!("   Predicted: ${:.2}", result.predicted_next_day_close);
    eprintln!("   Actual:    ${:.2}", result.actual_last_close);
    eprintln!("   Margin:    ${:.2}", result.margin_of_error);
}
