//! Report generation port.

use crate::domain::error::LongbookError;
use crate::domain::rebalance::RebalanceOutcome;
use crate::domain::signal::Signal;

/// Port for writing rebalance reports.
pub trait ReportPort {
    /// Write the report to `output_path`, or to stdout when it is `None`.
    /// `signals` backs the per-evaluator detail of verbose reports.
    fn write(
        &self,
        outcome: &RebalanceOutcome,
        signals: &[Signal],
        output_path: Option<&str>,
    ) -> Result<(), LongbookError>;
}
