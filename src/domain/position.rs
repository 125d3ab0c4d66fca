//! Held positions and cost-basis bookkeeping.

use chrono::NaiveDate;

use crate::domain::currency::normalize_currency_code;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub ticker: String,
    pub shares: u64,
    /// Weighted-average cost per share, in `currency`.
    pub cost_basis: f64,
    pub currency: String,
    pub acquisition_date: Option<NaiveDate>,
}

impl Position {
    pub fn new(
        ticker: &str,
        shares: u64,
        cost_basis: f64,
        currency: &str,
        acquisition_date: Option<NaiveDate>,
    ) -> Self {
        Position {
            ticker: ticker.to_string(),
            shares,
            cost_basis,
            currency: normalize_currency_code(currency),
            acquisition_date,
        }
    }

    /// Market value in the price's currency.
    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.shares as f64 * (price - self.cost_basis)
    }

    /// True when the recorded currency differs from the instrument's quote.
    pub fn currency_mismatch(&self, quote_currency: &str) -> bool {
        normalize_currency_code(&self.currency) != normalize_currency_code(quote_currency)
    }

    /// Weighted-average cost after buying `added` shares at `price`.
    ///
    /// A position recorded in a different currency than the quote is first
    /// revalued at `price`, so the result is always in the quote currency.
    pub fn cost_after_increase(&self, added: u64, price: f64, quote_currency: &str) -> f64 {
        let total = self.shares + added;
        if total == 0 {
            return 0.0;
        }
        let old_cost = if self.currency_mismatch(quote_currency) {
            price
        } else {
            self.cost_basis
        };
        (self.shares as f64 * old_cost + added as f64 * price) / total as f64
    }

    /// Cost basis kept on a hold or partial sale, rebased to `price` when
    /// the recorded currency no longer matches the quote.
    pub fn cost_after_reduce_or_hold(&self, price: f64, quote_currency: &str) -> f64 {
        if self.currency_mismatch(quote_currency) {
            price
        } else {
            self.cost_basis
        }
    }
}
