//! Domain error types.

use crate::domain::universe::UniverseError;

/// Top-level error type for longbook.
#[derive(Debug, thiserror::Error)]
pub enum LongbookError {
    #[error("no exchange rate from {from} to {to} (direct or via pivot)")]
    ExchangeRateUnavailable { from: String, to: String },

    #[error("insufficient price data for {ticker}: have {bars} usable bars, need {minimum}")]
    InsufficientPriceData {
        ticker: String,
        bars: usize,
        minimum: usize,
    },

    #[error(
        "infeasible constraints: min_position {min_position} x max_holdings {max_holdings} exceeds 1"
    )]
    ConstraintInfeasible {
        min_position: f64,
        max_holdings: usize,
    },

    #[error("NAV drifted from {before:.2} to {after:.2}, outside tolerance {tolerance}")]
    NavToleranceExceeded {
        before: f64,
        after: f64,
        tolerance: f64,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("portfolio error: {reason}")]
    PortfolioParse { reason: String },

    #[error("market data error: {reason}")]
    MarketData { reason: String },

    #[error("signal error: {reason}")]
    SignalParse { reason: String },

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LongbookError {
    /// True for errors that exclude a single ticker rather than abort the cycle.
    pub fn is_per_ticker(&self) -> bool {
        matches!(
            self,
            LongbookError::ExchangeRateUnavailable { .. }
                | LongbookError::InsufficientPriceData { .. }
        )
    }
}

impl From<&LongbookError> for std::process::ExitCode {
    fn from(err: &LongbookError) -> Self {
        let code: u8 = match err {
            LongbookError::Io(_) => 1,
            LongbookError::ConfigParse { .. }
            | LongbookError::ConfigMissing { .. }
            | LongbookError::ConfigInvalid { .. } => 2,
            LongbookError::PortfolioParse { .. }
            | LongbookError::MarketData { .. }
            | LongbookError::SignalParse { .. }
            | LongbookError::Universe(_) => 3,
            LongbookError::ConstraintInfeasible { .. } => 4,
            LongbookError::ExchangeRateUnavailable { .. }
            | LongbookError::InsufficientPriceData { .. } => 5,
            LongbookError::NavToleranceExceeded { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
