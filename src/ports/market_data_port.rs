//! Market data and exchange-rate access ports.

use chrono::NaiveDate;

use crate::domain::currency::ExchangeRateTable;
use crate::domain::error::LongbookError;
use crate::domain::ohlcv::InstrumentBars;

pub trait MarketDataPort {
    /// Up to `lookback` most recent bars dated on or before `as_of`, oldest
    /// first, with the instrument's quote currency.
    ///
    /// An instrument with no data at all yields `InsufficientPriceData`.
    fn fetch_bars(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        lookback: usize,
    ) -> Result<InstrumentBars, LongbookError>;
}

pub trait ExchangeRatePort {
    /// Load every known rate into a table that routes through `pivot`.
    fn load_rates(&self, pivot: &str) -> Result<ExchangeRateTable, LongbookError>;
}
