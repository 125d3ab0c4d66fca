//! Long-only transform from bidirectional score to conviction.
//!
//! The book never shorts, so a bearish aggregate means "reduce or avoid":
//! -1 maps to 0, neutral to 0.5 and +1 to 1.

use std::collections::BTreeMap;

use crate::domain::signal::AggregatedScore;

pub const NEUTRAL_CONVICTION: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Conviction {
    pub ticker: String,
    pub value: f64,
}

impl Conviction {
    pub fn new(ticker: &str, value: f64) -> Self {
        Conviction {
            ticker: ticker.to_string(),
            value,
        }
    }
}

/// `clamp((score + 1) / 2, 0, 1)`; NaN is treated as neutral.
pub fn to_conviction(score: f64) -> f64 {
    if score.is_nan() {
        return NEUTRAL_CONVICTION;
    }
    ((score + 1.0) / 2.0).clamp(0.0, 1.0)
}

pub fn convictions(scores: &BTreeMap<String, AggregatedScore>) -> Vec<Conviction> {
    scores
        .values()
        .map(|agg| Conviction::new(&agg.ticker, to_conviction(agg.score)))
        .collect()
}
