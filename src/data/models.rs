use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Single OHLCV bar for a given date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Daily observations for a single symbol, ordered by date
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationTable {
    pub symbol: String,
    pub bars: Vec<OhlcvBar>,
}

impl ObservationTable {
    pub fn new(symbol: impl Into<String>, bars: Vec<OhlcvBar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn close_prices(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }
}

/// One held-out day: realized close next to the model's close, both in price units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    #[serde(with = "iso_date")]
    pub date: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
}

/// Result of one pipeline run, shaped for the request layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_next_day_close: f64,
    pub actual_last_close: f64,
    pub margin_of_error: f64,
    pub historical: Vec<HistoricalPoint>,
}

/// Per-run training summary, logged and kept next to the saved model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub val_mae: Vec<f64>,
    pub stopped_early: bool,
}

/// Round to two decimal places (cents)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

mod iso_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}
