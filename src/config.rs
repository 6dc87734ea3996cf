use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// First date requested from the market-data source
pub const DEFAULT_START_DATE: &str = "2020-01-01";

/// Feature windows (trading days)
pub const SMA_SHORT_WINDOW: usize = 10;
pub const SMA_LONG_WINDOW: usize = 50;
pub const RSI_WINDOW: usize = 14;

/// Neural network configuration
pub const NN_LOOKBACK_DAYS: usize = 60;
pub const NN_FORWARD_DAYS: usize = 1;
pub const NN_HIDDEN_SIZE: usize = 50;
pub const NN_LEARNING_RATE: f64 = 1e-3;
pub const NN_EPOCHS: usize = 50;
pub const NN_BATCH_SIZE: usize = 32;
pub const NN_PATIENCE: usize = 10;
pub const NN_SEED: u64 = 42;

/// Share of windowed pairs used for training; the rest is held out
pub const TRAIN_SPLIT: f64 = 0.8;
/// Tail share of the training pairs used for early-stopping validation
pub const VALIDATION_SPLIT: f64 = 0.1;

/// Name of the single model slot
pub const MODEL_SLOT: &str = "stock_model";

/// Environment overrides
pub const ENV_MODEL_DIR: &str = "FORECAST_MODEL_DIR";
pub const ENV_START_DATE: &str = "FORECAST_START_DATE";

/// Run-time settings for one pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub start_date: NaiveDate,
    pub hidden_size: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub patience: usize,
    pub seed: u64,
    pub train_split: f64,
    pub validation_split: f64,
    pub model_dir: PathBuf,
    pub model_slot: String,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            hidden_size: NN_HIDDEN_SIZE,
            learning_rate: NN_LEARNING_RATE,
            epochs: NN_EPOCHS,
            batch_size: NN_BATCH_SIZE,
            patience: NN_PATIENCE,
            seed: NN_SEED,
            train_split: TRAIN_SPLIT,
            validation_split: VALIDATION_SPLIT,
            model_dir: PathBuf::from("."),
            model_slot: MODEL_SLOT.to_string(),
        }
    }
}

impl ForecastConfig {
    /// Defaults with `FORECAST_MODEL_DIR` / `FORECAST_START_DATE` applied when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(ENV_MODEL_DIR) {
            config.model_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var(ENV_START_DATE) {
            match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(date) => config.start_date = date,
                Err(e) => tracing::warn!("Ignoring {}={}: {}", ENV_START_DATE, raw, e),
            }
        }
        config
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = start_date;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_model_dir(mut self, model_dir: impl Into<PathBuf>) -> Self {
        self.model_dir = model_dir.into();
        self
    }
}

fn default_start_date() -> NaiveDate {
    NaiveDate::parse_from_str(DEFAULT_START_DATE, "%Y-%m-%d").unwrap_or(NaiveDate::MIN)
}
