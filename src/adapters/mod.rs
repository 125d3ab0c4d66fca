//! File-backed implementations of the ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod portfolio_csv;
pub mod signal_csv;
pub mod text_report;
