//! Short-window valuation context built from trailing daily bars.
//!
//! Sizing is based on this multi-bar context rather than a single tick:
//! `last_close` values positions, `short_ma` and `atr` describe the recent
//! window, and the slippage band bounds the execution-price assumption.

use crate::domain::currency::normalize_price_and_currency;
use crate::domain::error::LongbookError;
use crate::domain::ohlcv::OhlcvBar;

pub const SHORT_WINDOW: usize = 3;
pub const MIN_BARS: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceContext {
    pub ticker: String,
    /// Major ISO currency; minor-unit quotes are already converted.
    pub currency: String,
    pub last_close: f64,
    pub short_ma: f64,
    pub atr: f64,
    pub slippage_band_low: f64,
    pub slippage_band_high: f64,
    pub sample_size: usize,
}

impl PriceContext {
    /// Flat context for a known price, with no volatility.
    pub fn flat(ticker: &str, currency: &str, price: f64) -> Self {
        PriceContext {
            ticker: ticker.to_string(),
            currency: currency.to_string(),
            last_close: price,
            short_ma: price,
            atr: 0.0,
            slippage_band_low: price,
            slippage_band_high: price,
            sample_size: 1,
        }
    }

    pub fn band_width(&self) -> f64 {
        self.slippage_band_high - self.slippage_band_low
    }
}

/// Build a [`PriceContext`] from bars in any order.
///
/// Unusable bars (non-positive close, inverted range) are ignored; with none
/// left the ticker cannot be valued and `InsufficientPriceData` is returned.
pub fn build_price_context(
    ticker: &str,
    quote_currency: &str,
    bars: &[OhlcvBar],
    slippage_k: f64,
) -> Result<PriceContext, LongbookError> {
    let mut usable: Vec<&OhlcvBar> = bars.iter().filter(|b| b.is_usable()).collect();
    if usable.len() < MIN_BARS {
        return Err(LongbookError::InsufficientPriceData {
            ticker: ticker.to_string(),
            bars: usable.len(),
            minimum: MIN_BARS,
        });
    }
    usable.sort_by_key(|b| b.date);

    let window = &usable[usable.len().saturating_sub(SHORT_WINDOW)..];
    let n = window.len() as f64;

    let (_, currency) = normalize_price_and_currency(0.0, quote_currency);
    let major = |price: f64| normalize_price_and_currency(price, quote_currency).0;

    let last_close = major(window[window.len() - 1].close);
    let short_ma = window.iter().map(|b| major(b.close)).sum::<f64>() / n;
    let atr = window.iter().map(|b| major(b.range())).sum::<f64>() / n;

    let k = slippage_k.max(0.0);
    let (low, high) = if atr > 0.0 {
        ((last_close - k * atr).max(0.0), last_close + k * atr)
    } else {
        (last_close, last_close)
    };

    Ok(PriceContext {
        ticker: ticker.to_string(),
        currency,
        last_close,
        short_ma,
        atr,
        slippage_band_low: low,
        slippage_band_high: high,
        sample_size: window.len(),
    })
}
