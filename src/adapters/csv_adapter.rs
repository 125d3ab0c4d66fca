//! CSV file market-data and exchange-rate adapters.

use crate::domain::currency::ExchangeRateTable;
use crate::domain::error::LongbookError;
use crate::domain::ohlcv::{InstrumentBars, OhlcvBar};
use crate::domain::price_context::MIN_BARS;
use crate::ports::market_data_port::{ExchangeRatePort, MarketDataPort};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Currency assumed for price files that carry no currency column.
const FALLBACK_CURRENCY: &str = "USD";

/// Reads `<base_path>/<TICKER>.csv` with columns
/// `date,open,high,low,close,volume,currency`.
pub struct CsvMarketDataAdapter {
    base_path: PathBuf,
}

impl CsvMarketDataAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }
}

fn field<T: FromStr>(record: &csv::StringRecord, idx: usize, name: &str) -> Result<T, LongbookError>
where
    T::Err: std::fmt::Display,
{
    let raw = record.get(idx).ok_or_else(|| LongbookError::MarketData {
        reason: format!("missing {name} column"),
    })?;
    raw.trim().parse().map_err(|e| LongbookError::MarketData {
        reason: format!("invalid {name} value '{raw}': {e}"),
    })
}

impl MarketDataPort for CsvMarketDataAdapter {
    fn fetch_bars(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        lookback: usize,
    ) -> Result<InstrumentBars, LongbookError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Err(LongbookError::InsufficientPriceData {
                ticker: ticker.to_string(),
                bars: 0,
                minimum: MIN_BARS,
            });
        }
        let content = fs::read_to_string(&path)?;

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();
        let mut currency: Option<String> = None;

        for result in rdr.records() {
            let record = result.map_err(|e| LongbookError::MarketData {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;

            let date_str = record.get(0).ok_or_else(|| LongbookError::MarketData {
                reason: "missing date column".into(),
            })?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                LongbookError::MarketData {
                    reason: format!("invalid date format '{date_str}': {e}"),
                }
            })?;
            if date > as_of {
                continue;
            }

            let volume: f64 = field(&record, 5, "volume")?;
            bars.push(OhlcvBar {
                ticker: ticker.to_string(),
                date,
                open: field(&record, 1, "open")?,
                high: field(&record, 2, "high")?,
                low: field(&record, 3, "low")?,
                close: field(&record, 4, "close")?,
                volume: volume as i64,
            });

            if currency.is_none() {
                currency = record
                    .get(6)
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string);
            }
        }

        if bars.is_empty() {
            return Err(LongbookError::InsufficientPriceData {
                ticker: ticker.to_string(),
                bars: 0,
                minimum: MIN_BARS,
            });
        }

        bars.sort_by_key(|b| b.date);
        if bars.len() > lookback {
            bars.drain(..bars.len() - lookback);
        }

        let currency = currency.unwrap_or_else(|| {
            log::warn!("{ticker}: no currency column, assuming {FALLBACK_CURRENCY}");
            FALLBACK_CURRENCY.to_string()
        });
        log::debug!("{ticker}: {} bars in {currency}", bars.len());
        Ok(InstrumentBars { currency, bars })
    }
}

#[derive(Debug, Deserialize)]
struct RateRow {
    from: String,
    to: String,
    rate: f64,
}

/// Reads a `from,to,rate` CSV. With no path configured the table is empty
/// and only same-currency conversions succeed.
pub struct CsvFxAdapter {
    path: Option<PathBuf>,
}

impl CsvFxAdapter {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ExchangeRatePort for CsvFxAdapter {
    fn load_rates(&self, pivot: &str) -> Result<ExchangeRateTable, LongbookError> {
        let mut table = ExchangeRateTable::new(pivot);
        let Some(path) = &self.path else {
            log::warn!("no exchange-rate file configured");
            return Ok(table);
        };
        let content = fs::read_to_string(path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        for row in rdr.deserialize::<RateRow>() {
            let row = row.map_err(|e| LongbookError::MarketData {
                reason: format!("{}: {}", path.display(), e),
            })?;
            table.insert(&row.from, &row.to, row.rate)?;
        }
        log::info!("loaded {} exchange rates (pivot {})", table.len(), table.pivot());
        Ok(table)
    }
}
