use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::data::models::{ObservationTable, OhlcvBar};
use crate::data::{normalize_bars, MarketDataSource};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Daily bars from the Yahoo Finance chart endpoint (blocking)
pub struct YahooClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(CHART_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

impl MarketDataSource for YahooClient {
    fn get_observations(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ObservationTable> {
        let period1 = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let period2 = end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let url = format!(
            "{}/{}?interval=1d&period1={}&period2={}",
            self.base_url, symbol, period1, period2
        );

        tracing::info!("Fetching daily bars for {} ({} to {})", symbol, start, end);
        let text = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Failed to request chart for {}", symbol))?
            .text()
            .context("Failed to read chart response")?;

        let bars = parse_chart(symbol, &text)?;
        let bars = normalize_bars(symbol, bars)?;
        tracing::info!("Fetched {} daily bars for {}", bars.len(), symbol);
        Ok(ObservationTable::new(symbol, bars))
    }
}

/// Parse a chart response body. An unknown symbol produces an empty list.
fn parse_chart(symbol: &str, text: &str) -> Result<Vec<OhlcvBar>> {
    let response: ChartResponse =
        serde_json::from_str(text).context("Failed to parse chart response")?;

    if let Some(error) = response.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            tracing::warn!("Symbol {} not recognized: {}", symbol, error.description);
            return Ok(vec![]);
        }
        bail!("Chart API error: {} - {}", error.code, error.description);
    }

    let Some(data) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(vec![]);
    };
    let Some(quote) = data.indicators.quote.into_iter().next() else {
        return Ok(vec![]);
    };

    let mut bars = Vec::with_capacity(data.timestamp.len());
    for (i, &ts) in data.timestamp.iter().enumerate() {
        let Some(date) = DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()) else {
            continue;
        };
        let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        if let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            field(&quote.open),
            field(&quote.high),
            field(&quote.low),
            field(&quote.close),
            field(&quote.volume),
        ) {
            bars.push(OhlcvBar {
                date,
                open,
                high,
                low,
                close,
                volume,
            });
        }
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chart_skips_null_rows() {
        let body = r#"{"chart":{"result":[{
            "timestamp":[1704205800,1704292200,1704378600],
            "indicators":{"quote":[{
                "open":[10.0,null,12.0],
                "high":[11.0,12.0,13.0],
                "low":[9.0,10.0,11.0],
                "close":[10.5,11.5,12.5],
                "volume":[1000,2000,3000]
            }]}
        }],"error":null}}"#;
        let bars = parse_chart("AAPL", body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].close, 12.5);
        assert_eq!(bars[1].volume, 3000.0);
    }

    #[test]
    fn test_parse_chart_unknown_symbol_is_empty() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let bars = parse_chart("NOPE", body).unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn test_parse_chart_other_error_fails() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        assert!(parse_chart("AAPL", body).is_err());
    }
}
