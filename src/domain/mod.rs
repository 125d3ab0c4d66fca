//! Core domain types and the rebalance pipeline.

pub mod error;
pub mod currency;
pub mod ohlcv;
pub mod price_context;
pub mod signal;
pub mod conviction;
pub mod selection;
pub mod allocation;
pub mod position;
pub mod portfolio;
pub mod exclusion;
pub mod planner;
pub mod rebalance;
pub mod universe;
pub mod config_validation;
