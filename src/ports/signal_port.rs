//! Evaluator signal source port.

use crate::domain::error::LongbookError;
use crate::domain::signal::Signal;

pub trait SignalPort {
    /// Signals for the given tickers; tickers nobody evaluated are simply absent.
    fn fetch_signals(&self, universe: &[String]) -> Result<Vec<Signal>, LongbookError>;
}
