#![allow(dead_code)]

use chrono::NaiveDate;
use longbook::domain::currency::ExchangeRateTable;
use longbook::domain::error::LongbookError;
pub use longbook::domain::ohlcv::{InstrumentBars, OhlcvBar};
use longbook::domain::portfolio::Portfolio;
use longbook::domain::price_context::MIN_BARS;
use longbook::domain::rebalance::{RebalanceConfig, RebalanceOutcome};
use longbook::domain::signal::Signal;
use longbook::ports::market_data_port::{ExchangeRatePort, MarketDataPort};
use longbook::ports::portfolio_port::PortfolioPort;
use longbook::ports::report_port::ReportPort;
use longbook::ports::signal_port::SignalPort;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn as_of() -> NaiveDate {
    date(2025, 10, 20)
}

/// A single flat bar, so `last_close == price` and ATR is zero.
pub fn flat_bars(ticker: &str, currency: &str, price: f64) -> InstrumentBars {
    InstrumentBars {
        currency: currency.to_string(),
        bars: vec![make_bar(ticker, as_of(), price, price, price)],
    }
}

pub fn make_bar(ticker: &str, date: NaiveDate, close: f64, high: f64, low: f64) -> OhlcvBar {
    OhlcvBar {
        ticker: ticker.to_string(),
        date,
        open: close,
        high,
        low,
        close,
        volume: 1000,
    }
}

pub fn signal(ticker: &str, evaluator: &str, score: f64, confidence: f64) -> Signal {
    Signal::new(ticker, evaluator, score, confidence, "")
}

pub fn tickers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// SEK home, USD pivot, with the rates used across the integration tests.
pub fn nordic_fx() -> ExchangeRateTable {
    ExchangeRateTable::new("USD")
        .with_rate("USD", "SEK", 10.0)
        .unwrap()
        .with_rate("DKK", "SEK", 1.5)
        .unwrap()
        .with_rate("EUR", "USD", 1.1)
        .unwrap()
}

/// Defaults with the small-trade filter off, so sizing is exact in tests.
pub fn test_config() -> RebalanceConfig {
    RebalanceConfig {
        min_trade_value: 0.0,
        ..RebalanceConfig::default()
    }
}

pub struct MockMarketData {
    pub data: HashMap<String, InstrumentBars>,
    pub errors: HashMap<String, String>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_price(mut self, ticker: &str, currency: &str, price: f64) -> Self {
        self.data
            .insert(ticker.to_string(), flat_bars(ticker, currency, price));
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    pub fn snapshot(&self) -> BTreeMap<String, InstrumentBars> {
        self.data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch_bars(
        &self,
        ticker: &str,
        _as_of: NaiveDate,
        _lookback: usize,
    ) -> Result<InstrumentBars, LongbookError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(LongbookError::MarketData {
                reason: reason.clone(),
            });
        }
        self.data
            .get(ticker)
            .cloned()
            .ok_or_else(|| LongbookError::InsufficientPriceData {
                ticker: ticker.to_string(),
                bars: 0,
                minimum: MIN_BARS,
            })
    }
}

pub struct MockSignals {
    pub signals: Vec<Signal>,
}

impl SignalPort for MockSignals {
    fn fetch_signals(&self, universe: &[String]) -> Result<Vec<Signal>, LongbookError> {
        Ok(self
            .signals
            .iter()
            .filter(|s| universe.contains(&s.ticker))
            .cloned()
            .collect())
    }
}

pub struct MockFx {
    pub table: ExchangeRateTable,
}

impl ExchangeRatePort for MockFx {
    fn load_rates(&self, _pivot: &str) -> Result<ExchangeRateTable, LongbookError> {
        Ok(self.table.clone())
    }
}

pub struct MockPortfolioStore {
    pub portfolio: Portfolio,
    pub saved: RefCell<Vec<(Portfolio, NaiveDate)>>,
}

impl MockPortfolioStore {
    pub fn new(portfolio: Portfolio) -> Self {
        Self {
            portfolio,
            saved: RefCell::new(Vec::new()),
        }
    }
}

impl PortfolioPort for MockPortfolioStore {
    fn load_portfolio(&self, home_currency: &str) -> Result<Portfolio, LongbookError> {
        Ok(self.portfolio.with_home_currency(home_currency))
    }

    fn save_portfolio(
        &self,
        portfolio: &Portfolio,
        as_of: NaiveDate,
    ) -> Result<PathBuf, LongbookError> {
        self.saved.borrow_mut().push((portfolio.clone(), as_of));
        Ok(PathBuf::from(format!("portfolio_{}.csv", as_of.format("%Y%m%d"))))
    }
}

pub struct MockReport {
    pub calls: RefCell<Vec<(usize, usize, Option<String>)>>,
}

impl MockReport {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ReportPort for MockReport {
    fn write(
        &self,
        outcome: &RebalanceOutcome,
        signals: &[Signal],
        output_path: Option<&str>,
    ) -> Result<(), LongbookError> {
        self.calls.borrow_mut().push((
            outcome.trades.len(),
            signals.len(),
            output_path.map(str::to_string),
        ));
        Ok(())
    }
}
