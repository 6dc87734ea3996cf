use chrono::NaiveDate;

use crate::analysis::indicators::{rolling_rsi, rolling_sma};
use crate::config;
use crate::data::models::ObservationTable;
use crate::error::{ForecastError, Result};

/// Number of features per time step
pub const NUM_FEATURES: usize = 5;

/// Column names, in row order
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = ["close", "volume", "sma_10", "sma_50", "rsi_14"];

/// Index of the close price within a feature row
pub const CLOSE_COLUMN: usize = 0;

/// Rows dropped at the front of every table before all indicators are defined
pub const WARMUP_ROWS: usize = config::SMA_LONG_WINDOW - 1;

/// Per-date feature vectors `[close, volume, sma_10, sma_50, rsi_14]`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<[f64; NUM_FEATURES]>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[index]).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.column(CLOSE_COLUMN)
    }
}

/// Derive the feature matrix from a table, dropping dates with any undefined indicator.
///
/// Fails with `InsufficientData` when fewer than `window_size + prediction_days`
/// rows survive, since no training pair could be built.
pub fn build_feature_matrix(
    table: &ObservationTable,
    window_size: usize,
    prediction_days: usize,
) -> Result<FeatureMatrix> {
    let closes = table.close_prices();
    let sma_short = rolling_sma(&closes, config::SMA_SHORT_WINDOW);
    let sma_long = rolling_sma(&closes, config::SMA_LONG_WINDOW);
    let rsi = rolling_rsi(&closes, config::RSI_WINDOW);

    let mut matrix = FeatureMatrix::default();
    for (i, bar) in table.bars.iter().enumerate() {
        if let (Some(s10), Some(s50), Some(r)) = (sma_short[i], sma_long[i], rsi[i]) {
            matrix.dates.push(bar.date);
            matrix.rows.push([bar.close, bar.volume, s10, s50, r]);
        }
    }

    let required = window_size + prediction_days;
    if matrix.len() < required {
        return Err(ForecastError::InsufficientData {
            symbol: table.symbol.clone(),
            rows: matrix.len(),
            required,
        });
    }

    tracing::info!(
        "Built {} feature rows for {} ({} warm-up rows dropped)",
        matrix.len(),
        table.symbol,
        table.len() - matrix.len()
    );
    Ok(matrix)
}
