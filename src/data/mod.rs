pub mod csv_source;
pub mod models;
pub mod yahoo;

use anyhow::{bail, Result};
use chrono::NaiveDate;

use models::{ObservationTable, OhlcvBar};

pub use csv_source::CsvSource;
pub use yahoo::YahooClient;

/// Source of daily observations for a symbol.
///
/// An unrecognized symbol yields an empty table rather than an error; transport
/// and parse failures are errors.
pub trait MarketDataSource {
    fn get_observations(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ObservationTable>;
}

impl<T: MarketDataSource + ?Sized> MarketDataSource for &T {
    fn get_observations(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ObservationTable> {
        (**self).get_observations(symbol, start, end)
    }
}

impl<T: MarketDataSource + ?Sized> MarketDataSource for Box<T> {
    fn get_observations(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ObservationTable> {
        (**self).get_observations(symbol, start, end)
    }
}

/// Drop non-finite bars, sort by date and reject duplicate dates
pub fn normalize_bars(symbol: &str, mut bars: Vec<OhlcvBar>) -> Result<Vec<OhlcvBar>> {
    let before = bars.len();
    bars.retain(OhlcvBar::is_finite);
    if bars.len() < before {
        tracing::warn!(
            "Skipped {} bars with missing or non-finite values for {}",
            before - bars.len(),
            symbol
        );
    }

    bars.sort_by_key(|b| b.date);
    if let Some(dup) = bars.windows(2).find(|w| w[0].date == w[1].date) {
        bail!("Duplicate observation date {} for {}", dup[0].date, symbol);
    }
    Ok(bars)
}
