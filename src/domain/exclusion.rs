//! Records of tickers (or cash buckets) left out of a rebalance cycle.

use std::fmt;

use crate::domain::error::LongbookError;

#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionReason {
    InsufficientPriceData { bars: usize, minimum: usize },
    ExchangeRateUnavailable { from: String, to: String },
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::InsufficientPriceData { bars, minimum } => {
                write!(f, "insufficient price data ({bars} of {minimum} bars)")
            }
            ExclusionReason::ExchangeRateUnavailable { from, to } => {
                write!(f, "no exchange rate {from}->{to}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub ticker: String,
    pub reason: ExclusionReason,
}

impl Exclusion {
    /// Convert a per-ticker error into an exclusion; fatal errors are returned as-is.
    pub fn from_error(ticker: &str, err: LongbookError) -> Result<Self, LongbookError> {
        let reason = match err {
            LongbookError::InsufficientPriceData { bars, minimum, .. } => {
                ExclusionReason::InsufficientPriceData { bars, minimum }
            }
            LongbookError::ExchangeRateUnavailable { from, to } => {
                ExclusionReason::ExchangeRateUnavailable { from, to }
            }
            other => return Err(other),
        };
        log::warn!("excluding {ticker}: {reason}");
        Ok(Exclusion {
            ticker: ticker.to_string(),
            reason,
        })
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.ticker, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_per_ticker_errors() {
        let excl = Exclusion::from_error(
            "LUG",
            LongbookError::ExchangeRateUnavailable {
                from: "CAD".into(),
                to: "SEK".into(),
            },
        )
        .unwrap();
        assert_eq!(excl.to_string(), "LUG: no exchange rate CAD->SEK");
    }

    #[test]
    fn fatal_errors_pass_through() {
        let result = Exclusion::from_error(
            "LUG",
            LongbookError::ConstraintInfeasible {
                min_position: 0.3,
                max_holdings: 4,
            },
        );
        assert!(matches!(
            result,
            Err(LongbookError::ConstraintInfeasible { .. })
        ));
    }
}
