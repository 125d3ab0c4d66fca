//! Portfolio persistence port.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::domain::error::LongbookError;
use crate::domain::portfolio::Portfolio;

pub trait PortfolioPort {
    fn load_portfolio(&self, home_currency: &str) -> Result<Portfolio, LongbookError>;

    /// Persist the post-trade book as of `as_of`, returning where it was written.
    fn save_portfolio(
        &self,
        portfolio: &Portfolio,
        as_of: NaiveDate,
    ) -> Result<PathBuf, LongbookError>;
}
