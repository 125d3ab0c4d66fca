//! Port traits for the collaborators the rebalance engine depends on.

pub mod config_port;
pub mod market_data_port;
pub mod portfolio_port;
pub mod report_port;
pub mod signal_port;
