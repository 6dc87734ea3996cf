use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::Read;
use std::path::PathBuf;

use crate::data::models::{ObservationTable, OhlcvBar};
use crate::data::{normalize_bars, MarketDataSource};

/// Observations read from a local `Date,Open,High,Low,Close,Volume` file.
///
/// The file holds one symbol; a request for any other symbol returns an empty table.
#[derive(Debug, Clone)]
pub struct CsvSource {
    symbol: String,
    path: PathBuf,
}

impl CsvSource {
    pub fn new(symbol: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            symbol: symbol.into(),
            path: path.into(),
        }
    }
}

impl MarketDataSource for CsvSource {
    fn get_observations(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ObservationTable> {
        if !symbol.eq_ignore_ascii_case(&self.symbol) {
            return Ok(ObservationTable::new(symbol, vec![]));
        }

        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let bars = parse_ohlcv_csv(file)?
            .into_iter()
            .filter(|b| b.date >= start && b.date < end)
            .collect();
        let bars = normalize_bars(symbol, bars)?;

        tracing::info!(
            "Loaded {} daily bars for {} from {}",
            bars.len(),
            symbol,
            self.path.display()
        );
        Ok(ObservationTable::new(symbol, bars))
    }
}

/// Parse date from YYYY-MM-DD or M/D/YYYY
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s.trim(), "%m/%d/%Y").ok())
}

/// Parse an OHLCV CSV with a header row. Column order is free; extra columns are ignored.
pub fn parse_ohlcv_csv<R: Read>(reader: R) -> Result<Vec<OhlcvBar>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = reader.headers().context("Missing CSV headers")?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .with_context(|| format!("No {} column in CSV", name))
    };
    let date_idx = column("Date")?;
    let open_idx = column("Open")?;
    let high_idx = column("High")?;
    let low_idx = column("Low")?;
    let close_idx = column("Close")?;
    let volume_idx = column("Volume")?;

    let mut bars = Vec::new();
    for result in reader.records() {
        let record = result.context("Invalid CSV row")?;

        let Some(date) = record.get(date_idx).and_then(parse_date) else {
            continue;
        };
        let num = |idx: usize| {
            record
                .get(idx)
                .and_then(|s| s.trim().replace(',', "").parse::<f64>().ok())
        };
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            num(open_idx),
            num(high_idx),
            num(low_idx),
            num(close_idx),
            num(volume_idx),
        ) else {
            tracing::debug!("Skipping unparseable row for {}", date);
            continue;
        };

        bars.push(OhlcvBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    Ok(bars)
}
