//! Portfolio snapshot (positions plus per-currency cash) and home-currency valuation.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::currency::{normalize, normalize_currency_code, ExchangeRateTable};
use crate::domain::exclusion::Exclusion;
use crate::domain::error::LongbookError;
use crate::domain::position::Position;
use crate::domain::price_context::PriceContext;

/// Balances within this distance of zero are treated as zero.
pub const CASH_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub home_currency: String,
    pub positions: BTreeMap<String, Position>,
    pub cash: BTreeMap<String, f64>,
}

impl Portfolio {
    /// Empty portfolio with a zero home-currency cash bucket.
    pub fn new(home_currency: &str) -> Self {
        let home = normalize_currency_code(home_currency);
        let mut cash = BTreeMap::new();
        cash.insert(home.clone(), 0.0);
        Portfolio {
            home_currency: home,
            positions: BTreeMap::new(),
            cash,
        }
    }

    pub fn from_parts(
        home_currency: &str,
        positions: Vec<Position>,
        cash: BTreeMap<String, f64>,
    ) -> Self {
        let mut portfolio = Portfolio::new(home_currency);
        for (ccy, amount) in cash {
            portfolio.credit(&ccy, amount);
        }
        for position in positions {
            portfolio.add_position(position);
        }
        portfolio
    }

    /// Same holdings reported in another home currency.
    pub fn with_home_currency(&self, home_currency: &str) -> Self {
        let mut portfolio = self.clone();
        portfolio.home_currency = normalize_currency_code(home_currency);
        portfolio
            .cash
            .entry(portfolio.home_currency.clone())
            .or_insert(0.0);
        portfolio
    }

    /// Insert or replace a position; zero-share positions are dropped.
    pub fn add_position(&mut self, position: Position) {
        if position.shares == 0 {
            self.positions.remove(&position.ticker);
            return;
        }
        self.positions.insert(position.ticker.clone(), position);
    }

    pub fn get_position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    pub fn has_position(&self, ticker: &str) -> bool {
        self.positions.contains_key(ticker)
    }

    pub fn remove_position(&mut self, ticker: &str) -> Option<Position> {
        self.positions.remove(ticker)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn held_tickers(&self) -> BTreeSet<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn cash_in(&self, currency: &str) -> f64 {
        self.cash
            .get(&normalize_currency_code(currency))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn credit(&mut self, currency: &str, amount: f64) {
        let bucket = self.cash.entry(normalize_currency_code(currency)).or_insert(0.0);
        *bucket += amount;
        if bucket.abs() < CASH_EPSILON {
            *bucket = 0.0;
        }
    }

    pub fn debit(&mut self, currency: &str, amount: f64) {
        self.credit(currency, -amount);
    }

    /// Every currency with a cash bucket or a held position.
    pub fn currencies(&self) -> BTreeSet<String> {
        self.cash
            .keys()
            .cloned()
            .chain(self.positions.values().map(|p| p.currency.clone()))
            .collect()
    }

    /// Home-currency valuation at `last_close`.
    ///
    /// Positions without a price context, and positions or cash buckets whose
    /// currency cannot be converted, are left out of NAV and reported.
    pub fn valuation(
        &self,
        contexts: &BTreeMap<String, PriceContext>,
        fx: &ExchangeRateTable,
    ) -> Result<Valuation, LongbookError> {
        let home = &self.home_currency;
        let mut valuation = Valuation::default();

        for (ticker, position) in &self.positions {
            let Some(ctx) = contexts.get(ticker) else {
                log::warn!("{ticker}: no price context, left out of NAV");
                valuation.unpriced.push(ticker.clone());
                continue;
            };
            match normalize(position.market_value(ctx.last_close), &ctx.currency, home, fx) {
                Ok(value) => {
                    valuation.positions_value += value;
                    valuation.position_values.insert(ticker.clone(), value);
                }
                Err(err) => valuation.excluded.push(Exclusion::from_error(ticker, err)?),
            }
        }

        for (ccy, &amount) in &self.cash {
            match normalize(amount, ccy, home, fx) {
                Ok(value) => valuation.cash_value += value,
                Err(err) => valuation
                    .excluded
                    .push(Exclusion::from_error(&format!("CASH {ccy}"), err)?),
            }
        }

        valuation.nav = valuation.positions_value + valuation.cash_value;
        Ok(valuation)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Valuation {
    pub nav: f64,
    pub positions_value: f64,
    pub cash_value: f64,
    pub position_values: BTreeMap<String, f64>,
    pub unpriced: Vec<String>,
    pub excluded: Vec<Exclusion>,
}

impl Valuation {
    pub fn weight_of(&self, ticker: &str) -> f64 {
        if self.nav <= 0.0 {
            return 0.0;
        }
        self.position_values.get(ticker).copied().unwrap_or(0.0) / self.nav
    }
}
