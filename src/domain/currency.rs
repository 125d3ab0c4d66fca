//! Currency normalization and exchange-rate lookup.
//!
//! Listings quoted in minor units (London pence, Johannesburg cents, Tel Aviv
//! agorot) are folded into their major ISO currency before any FX is applied.
//! Rates are resolved identity → direct → inverse → one hop via the pivot.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::error::LongbookError;

pub const DEFAULT_PIVOT: &str = "USD";

/// (minor code, major code, minor units per major unit)
const MINOR_UNITS: &[(&str, &str, f64)] = &[
    ("GBX", "GBP", 100.0),
    ("GBp", "GBP", 100.0),
    ("ZAc", "ZAR", 100.0),
    ("ILA", "ILS", 100.0),
];

/// Exact match first. The case-insensitive fallback never matches a code
/// whose upper-case form is itself a major code: `GBP` is pounds, not `GBp`.
fn minor_unit(code: &str) -> Option<(&'static str, f64)> {
    let trimmed = code.trim();
    MINOR_UNITS
        .iter()
        .find(|(minor, _, _)| *minor == trimmed)
        .or_else(|| {
            let upper = trimmed.to_uppercase();
            MINOR_UNITS
                .iter()
                .filter(|(_, major, _)| *major != upper)
                .find(|(minor, _, _)| minor.to_uppercase() == upper)
        })
        .map(|(_, major, factor)| (*major, *factor))
}

/// Major upper-case ISO code for a (possibly minor-unit) currency identifier.
pub fn normalize_currency_code(code: &str) -> String {
    match minor_unit(code) {
        Some((major, _)) => major.to_string(),
        None => code.trim().to_uppercase(),
    }
}

/// Convert a price quoted in minor units to its major currency.
pub fn normalize_price_and_currency(price: f64, code: &str) -> (f64, String) {
    match minor_unit(code) {
        Some((major, factor)) => (price / factor, major.to_string()),
        None => (price, code.trim().to_uppercase()),
    }
}

/// Pairwise FX table: `rate(from, to)` units of `to` per unit of `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRateTable {
    rates: HashMap<(String, String), f64>,
    pivot: String,
}

impl Default for ExchangeRateTable {
    fn default() -> Self {
        Self::new(DEFAULT_PIVOT)
    }
}

impl ExchangeRateTable {
    pub fn new(pivot: &str) -> Self {
        ExchangeRateTable {
            rates: HashMap::new(),
            pivot: normalize_currency_code(pivot),
        }
    }

    pub fn pivot(&self) -> &str {
        &self.pivot
    }

    /// Record a rate. Non-positive or non-finite rates are rejected.
    pub fn insert(&mut self, from: &str, to: &str, rate: f64) -> Result<(), LongbookError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(LongbookError::MarketData {
                reason: format!("invalid exchange rate {from}->{to}: {rate}"),
            });
        }
        let from = normalize_currency_code(from);
        let to = normalize_currency_code(to);
        self.rates.insert((from, to), rate);
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert) for tests and fixtures.
    pub fn with_rate(mut self, from: &str, to: &str, rate: f64) -> Result<Self, LongbookError> {
        self.insert(from, to, rate)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Every currency that appears on either side of a stored pair.
    pub fn currencies(&self) -> BTreeSet<String> {
        self.rates
            .keys()
            .flat_map(|(from, to)| [from.clone(), to.clone()])
            .collect()
    }

    fn leg(&self, from: &str, to: &str) -> Option<f64> {
        if from == to {
            return Some(1.0);
        }
        if let Some(&rate) = self.rates.get(&(from.to_string(), to.to_string())) {
            return Some(rate);
        }
        self.rates
            .get(&(to.to_string(), from.to_string()))
            .map(|&rate| 1.0 / rate)
    }

    /// Rate between two major currencies, allowing at most one pivot hop.
    pub fn rate(&self, from: &str, to: &str) -> Result<f64, LongbookError> {
        let from = normalize_currency_code(from);
        let to = normalize_currency_code(to);

        if let Some(rate) = self.leg(&from, &to) {
            return Ok(rate);
        }

        let via_pivot = self
            .leg(&from, &self.pivot)
            .zip(self.leg(&self.pivot, &to))
            .map(|(first, second)| first * second);

        via_pivot.ok_or(LongbookError::ExchangeRateUnavailable { from, to })
    }

    /// Rates into `home` for each currency in `currencies`, skipping unresolved ones.
    pub fn rates_into(&self, currencies: &BTreeSet<String>, home: &str) -> BTreeMap<String, f64> {
        currencies
            .iter()
            .filter_map(|ccy| self.rate(ccy, home).ok().map(|r| (ccy.clone(), r)))
            .collect()
    }
}

/// Convert `amount` quoted in `from` into `to`.
///
/// Minor-unit codes on either side are honored: a GBX amount is divided by
/// 100 before FX, a GBX target is multiplied by 100 after it.
pub fn normalize(
    amount: f64,
    from: &str,
    to: &str,
    table: &ExchangeRateTable,
) -> Result<f64, LongbookError> {
    if from.trim() == to.trim() {
        return Ok(amount);
    }
    let (major_amount, major_from) = normalize_price_and_currency(amount, from);
    let major_to = normalize_currency_code(to);
    let converted = major_amount * table.rate(&major_from, &major_to)?;
    Ok(match minor_unit(to) {
        Some((_, factor)) => converted * factor,
        None => converted,
    })
}
