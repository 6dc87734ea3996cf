use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the forecasting pipeline. All of them end the current run.
#[derive(Error, Debug)]
pub enum ForecastError {
    /// The market-data source returned no observations for the symbol.
    #[error("No data found for {symbol}. Please check the symbol.")]
    NoData { symbol: String },

    /// Too few rows remain after feature derivation to form one training pair.
    #[error("Insufficient data for {symbol}: {rows} usable rows, need at least {required}")]
    InsufficientData {
        symbol: String,
        rows: usize,
        required: usize,
    },

    /// A feature column has zero range across the fitting set.
    #[error("Cannot scale column '{column}': min equals max ({value})")]
    DegenerateScale { column: String, value: f64 },

    /// Inference was attempted before any model was saved to the slot.
    #[error("No saved model at {}", .0.display())]
    ArtifactNotFound(PathBuf),

    /// Hyperparameters or dataset shape that cannot be trained on.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport or parse failure inside the market-data source.
    #[error(transparent)]
    MarketData(#[from] anyhow::Error),

    /// Recorder failure while writing or reading model weights.
    #[error("Model persistence error at {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
