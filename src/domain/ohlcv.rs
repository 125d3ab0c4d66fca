//! Daily OHLCV bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// high - low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// A bar is usable for valuation when its close is a positive finite
    /// number and its high/low are ordered.
    pub fn is_usable(&self) -> bool {
        self.close.is_finite()
            && self.close > 0.0
            && self.high.is_finite()
            && self.low.is_finite()
            && self.high >= self.low
    }
}

/// Quote currency plus trailing bars for one instrument, as delivered by a
/// market-data collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentBars {
    pub currency: String,
    pub bars: Vec<OhlcvBar>,
}
