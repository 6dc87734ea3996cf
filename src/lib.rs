//! Windowed LSTM forecasting of a daily close price.
//!
//! [`Pipeline::run`] is the single entry point: it fetches daily bars, derives
//! `[close, volume, sma_10, sma_50, rsi_14]` features, min-max scales them,
//! slides fixed windows over the result, trains a fresh two-layer LSTM on the
//! first 80% of windows and reports its predictions on the held-out rest.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod nn;
pub mod pipeline;

pub use config::ForecastConfig;
pub use data::models::{HistoricalPoint, ObservationTable, OhlcvBar, PredictionResult};
pub use data::{CsvSource, MarketDataSource, YahooClient};
pub use error::{ForecastError, Result};
pub use pipeline::Pipeline;
